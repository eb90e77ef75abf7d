use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::policy;
use super::{Engine, Error};

/// What a committed no-show transition did beyond finalizing the
/// reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoShowOutcome {
    Recorded,
    /// The no-show policy fired and the customer is now blocked.
    CustomerBlocked,
}

// ── Pure transitions ─────────────────────────────────────────────
// Each transition is a pure function from the current reservation (plus
// whatever context the rule needs) to the updated reservation and the one
// event it emits. The engine owns persisting the state and publishing the
// event; nothing here touches I/O or mutates in place.

fn ensure(
    reservation: &Reservation,
    action: &'static str,
    allowed: &[ReservationStatus],
) -> Result<(), Error> {
    if reservation.status.is_terminal() {
        return Err(Error::AlreadyFinalized(reservation.status));
    }
    if !allowed.contains(&reservation.status) {
        return Err(Error::InvalidTransition { from: reservation.status, action });
    }
    Ok(())
}

/// Create the initial pending reservation for an admitted booking.
pub(super) fn book(
    employee_id: Ulid,
    customer_id: Ulid,
    service_id: Ulid,
    start: Ms,
    now: Ms,
) -> (Reservation, DomainEvent) {
    let reservation = Reservation {
        id: Ulid::new(),
        employee_id,
        customer_id,
        service_id,
        start,
        end: None,
        status: ReservationStatus::Pending,
        cancel_reason: None,
        created_at: now,
    };
    let event = DomainEvent::Booked {
        reservation_id: reservation.id,
        customer_id,
        employee_id,
        occurred_at: now,
    };
    (reservation, event)
}

/// Confirm a pending reservation. An explicit `end` must lie after the
/// start, fit inside one availability slot, and not collide with any other
/// active reservation of the employee; without one the default booking
/// length is locked in.
pub(super) fn confirm(
    reservation: &Reservation,
    end: Option<Ms>,
    slots: &[ScheduleSlot],
    active: &[Reservation],
    now: Ms,
) -> Result<(Reservation, DomainEvent), Error> {
    ensure(reservation, "confirm", &[ReservationStatus::Pending])?;

    let end = match end {
        Some(end) => {
            if end <= reservation.start {
                return Err(Error::Validation("end time must be after start time"));
            }
            let span = Span::new(reservation.start, end);
            if !slots.iter().any(|slot| slot.span.contains_span(&span)) {
                return Err(Error::SlotUnavailable);
            }
            for other in active {
                if other.id != reservation.id && other.span().overlaps(&span) {
                    return Err(Error::SlotAlreadyBooked);
                }
            }
            end
        }
        None => reservation.start + DEFAULT_BOOKING_MS,
    };

    let updated = Reservation {
        end: Some(end),
        status: ReservationStatus::Confirmed,
        ..reservation.clone()
    };
    let event = DomainEvent::Confirmed {
        reservation_id: updated.id,
        customer_id: updated.customer_id,
        employee_id: updated.employee_id,
        occurred_at: now,
        end,
    };
    Ok((updated, event))
}

pub(super) fn complete(
    reservation: &Reservation,
    now: Ms,
) -> Result<(Reservation, DomainEvent), Error> {
    ensure(reservation, "complete", &[ReservationStatus::Confirmed])?;
    let updated = Reservation {
        status: ReservationStatus::Completed,
        ..reservation.clone()
    };
    let event = DomainEvent::Completed {
        reservation_id: updated.id,
        customer_id: updated.customer_id,
        employee_id: updated.employee_id,
        occurred_at: now,
    };
    Ok((updated, event))
}

pub(super) fn mark_did_not_come(
    reservation: &Reservation,
    now: Ms,
) -> Result<(Reservation, DomainEvent), Error> {
    ensure(reservation, "mark as no-show", &[ReservationStatus::Confirmed])?;
    let updated = Reservation {
        status: ReservationStatus::DidNotCome,
        ..reservation.clone()
    };
    let event = DomainEvent::DidNotCome {
        reservation_id: updated.id,
        customer_id: updated.customer_id,
        employee_id: updated.employee_id,
        occurred_at: now,
    };
    Ok((updated, event))
}

/// Customers can only back out while the cancellation window is open.
pub(super) fn cancel_by_customer(
    reservation: &Reservation,
    reason: String,
    now: Ms,
) -> Result<(Reservation, DomainEvent), Error> {
    ensure(reservation, "cancel", &ReservationStatus::ACTIVE)?;
    let remaining_ms = reservation.start - now;
    if remaining_ms < CANCEL_CUTOFF_MS {
        return Err(Error::CancellationWindowClosed { remaining_ms });
    }
    let updated = Reservation {
        status: ReservationStatus::CancelledByCustomer,
        cancel_reason: Some(reason.clone()),
        ..reservation.clone()
    };
    let event = DomainEvent::CanceledByCustomer {
        reservation_id: updated.id,
        customer_id: updated.customer_id,
        employee_id: updated.employee_id,
        occurred_at: now,
        reason,
    };
    Ok((updated, event))
}

pub(super) fn cancel_by_employee(
    reservation: &Reservation,
    reason: String,
    now: Ms,
) -> Result<(Reservation, DomainEvent), Error> {
    ensure(reservation, "cancel", &ReservationStatus::ACTIVE)?;
    let updated = Reservation {
        status: ReservationStatus::CancelledByEmployee,
        cancel_reason: Some(reason.clone()),
        ..reservation.clone()
    };
    let event = DomainEvent::CanceledByEmployee {
        reservation_id: updated.id,
        customer_id: updated.customer_id,
        employee_id: updated.employee_id,
        occurred_at: now,
        reason,
    };
    Ok((updated, event))
}

/// Administrative override: any non-terminal state, no timing rule.
pub(super) fn cancel_by_admin(
    reservation: &Reservation,
    reason: String,
    now: Ms,
) -> Result<(Reservation, DomainEvent), Error> {
    ensure(reservation, "cancel", &ReservationStatus::ACTIVE)?;
    let updated = Reservation {
        status: ReservationStatus::CancelledByAdmin,
        cancel_reason: Some(reason.clone()),
        ..reservation.clone()
    };
    let event = DomainEvent::CanceledByAdmin {
        reservation_id: updated.id,
        customer_id: updated.customer_id,
        employee_id: updated.employee_id,
        occurred_at: now,
        reason,
    };
    Ok((updated, event))
}

fn check_reason(reason: &str) -> Result<(), Error> {
    if reason.len() > MAX_REASON_LEN {
        return Err(Error::LimitExceeded("cancel reason too long"));
    }
    Ok(())
}

// ── Engine transition methods ────────────────────────────────────

impl Engine {
    pub async fn confirm(
        &self,
        reservation_id: Ulid,
        end: Option<Ms>,
    ) -> Result<Reservation, Error> {
        let reservation = self.require_reservation(reservation_id).await?;
        let slots = self.store.schedules_by_employee(reservation.employee_id).await?;
        let active = self
            .store
            .reservations_by_employee(reservation.employee_id, &ReservationStatus::ACTIVE)
            .await?;

        let (updated, event) = confirm(&reservation, end, &slots, &active, self.now())?;
        self.commit_transition(updated, event, "confirm").await
    }

    pub async fn complete(&self, reservation_id: Ulid) -> Result<Reservation, Error> {
        let reservation = self.require_reservation(reservation_id).await?;
        let (updated, event) = complete(&reservation, self.now())?;
        self.commit_transition(updated, event, "complete").await
    }

    /// Finalize a reservation as a no-show. The auto-block policy is
    /// evaluated against the resulting no-show total before the write; a
    /// fired policy still finalizes the reservation and additionally
    /// persists the block row, surfaced through the returned outcome.
    pub async fn mark_did_not_come(
        &self,
        reservation_id: Ulid,
    ) -> Result<(Reservation, NoShowOutcome), Error> {
        let reservation = self.require_reservation(reservation_id).await?;
        let (updated, event) = mark_did_not_come(&reservation, self.now())?;

        let service = self.require_service(updated.service_id).await?;
        let prior = self.store.did_not_come_count(updated.customer_id).await?;
        let existing = self
            .store
            .find_block(updated.customer_id, service.company_id)
            .await?;
        let fire = policy::should_block(prior + 1, existing.as_ref());

        self.store.update_reservation(updated.clone()).await?;
        if fire {
            let block = policy::block_row(updated.customer_id, service.company_id);
            self.store.insert_block(block).await?;
            metrics::counter!(crate::observability::AUTO_BLOCKS_TOTAL).increment(1);
            tracing::info!(
                customer = %updated.customer_id,
                company = %service.company_id,
                "customer auto-blocked after repeated no-shows"
            );
        }

        metrics::counter!(
            crate::observability::TRANSITIONS_TOTAL,
            "transition" => "did_not_come"
        )
        .increment(1);
        self.finish_commit(&updated, event);

        let outcome = if fire { NoShowOutcome::CustomerBlocked } else { NoShowOutcome::Recorded };
        Ok((updated, outcome))
    }

    pub async fn cancel_by_customer(
        &self,
        reservation_id: Ulid,
        reason: &str,
    ) -> Result<Reservation, Error> {
        check_reason(reason)?;
        let reservation = self.require_reservation(reservation_id).await?;
        let (updated, event) = cancel_by_customer(&reservation, reason.to_string(), self.now())?;
        self.commit_transition(updated, event, "cancel_by_customer").await
    }

    pub async fn cancel_by_employee(
        &self,
        reservation_id: Ulid,
        reason: &str,
    ) -> Result<Reservation, Error> {
        check_reason(reason)?;
        let reservation = self.require_reservation(reservation_id).await?;
        let (updated, event) = cancel_by_employee(&reservation, reason.to_string(), self.now())?;
        self.commit_transition(updated, event, "cancel_by_employee").await
    }

    pub async fn cancel_by_admin(
        &self,
        reservation_id: Ulid,
        reason: &str,
    ) -> Result<Reservation, Error> {
        check_reason(reason)?;
        let reservation = self.require_reservation(reservation_id).await?;
        let (updated, event) = cancel_by_admin(&reservation, reason.to_string(), self.now())?;
        self.commit_transition(updated, event, "cancel_by_admin").await
    }

    async fn commit_transition(
        &self,
        updated: Reservation,
        event: DomainEvent,
        label: &'static str,
    ) -> Result<Reservation, Error> {
        self.store.update_reservation(updated.clone()).await?;
        metrics::counter!(crate::observability::TRANSITIONS_TOTAL, "transition" => label)
            .increment(1);
        tracing::info!(reservation = %updated.id, status = ?updated.status, "reservation {label}");
        self.finish_commit(&updated, event);
        Ok(updated)
    }
}
