use ulid::Ulid;

use crate::model::{Ms, ReservationStatus, Span};
use crate::store::StoreError;

#[derive(Debug)]
pub enum Error {
    NotFound(Ulid),
    Validation(&'static str),
    ScheduleConflict { slot: Span, existing: Span },
    SlotUnavailable,
    SlotAlreadyBooked,
    CustomerBlocked { customer_id: Ulid, company_id: Ulid },
    InvalidTransition { from: ReservationStatus, action: &'static str },
    AlreadyFinalized(ReservationStatus),
    CancellationWindowClosed { remaining_ms: Ms },
    LimitExceeded(&'static str),
    Store(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotFound(id) => write!(f, "not found: {id}"),
            Error::Validation(msg) => write!(f, "invalid input: {msg}"),
            Error::ScheduleConflict { slot, existing } => {
                write!(
                    f,
                    "slot [{}, {}) overlaps existing availability [{}, {})",
                    slot.start, slot.end, existing.start, existing.end
                )
            }
            Error::SlotUnavailable => write!(f, "requested time is outside availability"),
            Error::SlotAlreadyBooked => write!(f, "requested time is already booked"),
            Error::CustomerBlocked { customer_id, company_id } => {
                write!(f, "customer {customer_id} is blocked by company {company_id}")
            }
            Error::InvalidTransition { from, action } => {
                write!(f, "cannot {action} a reservation in state {from:?}")
            }
            Error::AlreadyFinalized(status) => {
                write!(f, "reservation already finalized as {status:?}")
            }
            Error::CancellationWindowClosed { remaining_ms } => {
                write!(f, "cancellation window closed: {remaining_ms}ms to start")
            }
            Error::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            Error::Store(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Store(e.to_string())
    }
}
