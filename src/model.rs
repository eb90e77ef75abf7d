use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds UTC — the only time type.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 3_600_000;
pub const DAY_MS: Ms = 86_400_000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Normalize a raw `[from, to)` pair. `to < from` means the window
    /// crosses midnight and `to` belongs to the next day. Zero-length
    /// input is rejected, as is anything still inverted after the shift.
    pub fn normalized(from: Ms, to: Ms) -> Option<Self> {
        if from == to {
            return None;
        }
        let end = if to < from { to + DAY_MS } else { to };
        if from < end { Some(Self { start: from, end }) } else { None }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// How a recurring availability request repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatPattern {
    None,
    Daily,
    Weekly,
    BiWeekly,
    TriWeekly,
    TwiceAMonth,
    ThreeTimesAMonth,
    Monthly,
}

impl RepeatPattern {
    pub fn is_repeating(&self) -> bool {
        !matches!(self, RepeatPattern::None)
    }

    /// Day multiple per occurrence step, or None for calendar-based patterns.
    fn step_days(&self) -> Option<i64> {
        match self {
            RepeatPattern::Daily => Some(1),
            RepeatPattern::Weekly => Some(7),
            RepeatPattern::BiWeekly => Some(14),
            RepeatPattern::TriWeekly => Some(21),
            RepeatPattern::TwiceAMonth => Some(15),
            RepeatPattern::ThreeTimesAMonth => Some(10),
            RepeatPattern::None | RepeatPattern::Monthly => None,
        }
    }

    /// Shift `span` to its `index`-th occurrence. Day-multiple patterns move
    /// both endpoints by whole days; `Monthly` moves by calendar months
    /// (end-of-month clamped). `None` is only valid for index 0.
    pub fn occurrence(&self, span: Span, index: u32) -> Option<Span> {
        if index == 0 {
            return Some(span);
        }
        match self {
            RepeatPattern::None => None,
            RepeatPattern::Monthly => {
                let start = add_months(span.start, index)?;
                let end = add_months(span.end, index)?;
                Some(Span::new(start, end))
            }
            _ => {
                let shift = self.step_days()? * index as i64 * DAY_MS;
                Some(Span::new(span.start + shift, span.end + shift))
            }
        }
    }
}

fn add_months(t: Ms, n: u32) -> Option<Ms> {
    let dt = DateTime::<Utc>::from_timestamp_millis(t)?;
    Some(dt.checked_add_months(Months::new(n))?.timestamp_millis())
}

// ── Persisted rows ───────────────────────────────────────────────

/// One persisted availability occurrence for an employee.
/// Rows materialized from the same recurring request share `group_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub id: Ulid,
    pub employee_id: Ulid,
    pub group_id: Option<u64>,
    pub description: Option<String>,
    pub repeat: RepeatPattern,
    pub repeat_count: u32,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Completed,
    DidNotCome,
    CancelledByCustomer,
    CancelledByEmployee,
    CancelledByAdmin,
}

impl ReservationStatus {
    /// Statuses that hold a claim on the employee's time.
    pub const ACTIVE: [ReservationStatus; 2] =
        [ReservationStatus::Pending, ReservationStatus::Confirmed];

    pub fn is_active(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

/// A customer's claim on part of an employee's time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub employee_id: Ulid,
    pub customer_id: Ulid,
    pub service_id: Ulid,
    pub start: Ms,
    /// Set on confirmation; until then the default booking length applies.
    pub end: Option<Ms>,
    pub status: ReservationStatus,
    pub cancel_reason: Option<String>,
    pub created_at: Ms,
}

impl Reservation {
    pub fn effective_end(&self) -> Ms {
        self.end.unwrap_or(self.start + crate::limits::DEFAULT_BOOKING_MS)
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.effective_end())
    }
}

/// A customer barred from booking with a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerBlock {
    pub id: Ulid,
    pub company_id: Ulid,
    pub customer_id: Ulid,
    pub reason: String,
    /// None when the block never expires.
    pub banned_until: Option<Ms>,
    pub forever: bool,
}

// ── Reference rows ───────────────────────────────────────────────
// Flat id-based rows; the engine never walks an object graph.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: Ulid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Ulid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: Ulid,
    pub company_id: Ulid,
    pub name: String,
}

// ── Domain events ────────────────────────────────────────────────

/// The event types — flat, no nesting. Published after each committed
/// transition; one event per successful call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainEvent {
    Booked {
        reservation_id: Ulid,
        customer_id: Ulid,
        employee_id: Ulid,
        occurred_at: Ms,
    },
    Confirmed {
        reservation_id: Ulid,
        customer_id: Ulid,
        employee_id: Ulid,
        occurred_at: Ms,
        end: Ms,
    },
    Completed {
        reservation_id: Ulid,
        customer_id: Ulid,
        employee_id: Ulid,
        occurred_at: Ms,
    },
    CanceledByCustomer {
        reservation_id: Ulid,
        customer_id: Ulid,
        employee_id: Ulid,
        occurred_at: Ms,
        reason: String,
    },
    CanceledByEmployee {
        reservation_id: Ulid,
        customer_id: Ulid,
        employee_id: Ulid,
        occurred_at: Ms,
        reason: String,
    },
    CanceledByAdmin {
        reservation_id: Ulid,
        customer_id: Ulid,
        employee_id: Ulid,
        occurred_at: Ms,
        reason: String,
    },
    DidNotCome {
        reservation_id: Ulid,
        customer_id: Ulid,
        employee_id: Ulid,
        occurred_at: Ms,
    },
    StartingSoon {
        reservation_id: Ulid,
        customer_id: Ulid,
        employee_id: Ulid,
        occurred_at: Ms,
        start: Ms,
    },
}

impl DomainEvent {
    pub fn employee_id(&self) -> Ulid {
        match self {
            DomainEvent::Booked { employee_id, .. }
            | DomainEvent::Confirmed { employee_id, .. }
            | DomainEvent::Completed { employee_id, .. }
            | DomainEvent::CanceledByCustomer { employee_id, .. }
            | DomainEvent::CanceledByEmployee { employee_id, .. }
            | DomainEvent::CanceledByAdmin { employee_id, .. }
            | DomainEvent::DidNotCome { employee_id, .. }
            | DomainEvent::StartingSoon { employee_id, .. } => *employee_id,
        }
    }

    pub fn reservation_id(&self) -> Ulid {
        match self {
            DomainEvent::Booked { reservation_id, .. }
            | DomainEvent::Confirmed { reservation_id, .. }
            | DomainEvent::Completed { reservation_id, .. }
            | DomainEvent::CanceledByCustomer { reservation_id, .. }
            | DomainEvent::CanceledByEmployee { reservation_id, .. }
            | DomainEvent::CanceledByAdmin { reservation_id, .. }
            | DomainEvent::DidNotCome { reservation_id, .. }
            | DomainEvent::StartingSoon { reservation_id, .. } => *reservation_id,
        }
    }
}
