use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::store::StoreError;

use super::{lifecycle, Engine, Error};

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub employee_id: Ulid,
    pub customer_id: Ulid,
    pub service_id: Ulid,
    pub start: Ms,
}

/// Admission control over already-loaded state: the default-length window
/// must fit inside one availability slot, collide with no active
/// reservation, and the customer must not carry a forever-block for the
/// service's company. Returns the pending reservation and its event.
pub(super) fn admit(
    request: &BookingRequest,
    slots: &[ScheduleSlot],
    active: &[Reservation],
    block: Option<&CustomerBlock>,
    company_id: Ulid,
    now: Ms,
) -> Result<(Reservation, DomainEvent), Error> {
    let span = Span::new(request.start, request.start + DEFAULT_BOOKING_MS);

    if !slots.iter().any(|slot| slot.span.contains_span(&span)) {
        return Err(Error::SlotUnavailable);
    }
    for existing in active {
        if existing.span().overlaps(&span) {
            return Err(Error::SlotAlreadyBooked);
        }
    }
    if block.is_some_and(|b| b.forever) {
        return Err(Error::CustomerBlocked {
            customer_id: request.customer_id,
            company_id,
        });
    }

    Ok(lifecycle::book(
        request.employee_id,
        request.customer_id,
        request.service_id,
        request.start,
        now,
    ))
}

impl Engine {
    /// Turn a booking request into a committed pending reservation. The
    /// read-check-insert sequence races with itself across callers; the
    /// store's start exclusion decides the winner and the loser re-reads
    /// and re-checks, a bounded number of times.
    pub async fn book(&self, request: BookingRequest) -> Result<Reservation, Error> {
        if request.start < MIN_VALID_TIMESTAMP_MS
            || request.start + DEFAULT_BOOKING_MS > MAX_VALID_TIMESTAMP_MS
        {
            return Err(Error::LimitExceeded("timestamp out of range"));
        }

        let mut attempt = 0u32;
        loop {
            self.require_employee(request.employee_id).await?;
            let slots = self.store.schedules_by_employee(request.employee_id).await?;
            if slots.is_empty() {
                return Err(Error::NotFound(request.employee_id));
            }
            let customer = self.require_customer(request.customer_id).await?;
            let service = self.require_service(request.service_id).await?;
            let active = self
                .store
                .reservations_by_employee(request.employee_id, &ReservationStatus::ACTIVE)
                .await?;
            let block = self.store.find_block(customer.id, service.company_id).await?;

            let (reservation, event) = match admit(
                &request,
                &slots,
                &active,
                block.as_ref(),
                service.company_id,
                self.now(),
            ) {
                Ok(admitted) => admitted,
                Err(e) => {
                    metrics::counter!(
                        crate::observability::BOOKINGS_TOTAL,
                        "outcome" => "rejected"
                    )
                    .increment(1);
                    tracing::debug!(employee = %request.employee_id, "booking rejected: {e}");
                    return Err(e);
                }
            };

            match self.store.insert_reservation(reservation.clone()).await {
                Ok(()) => {
                    metrics::counter!(
                        crate::observability::BOOKINGS_TOTAL,
                        "outcome" => "booked"
                    )
                    .increment(1);
                    tracing::info!(
                        reservation = %reservation.id,
                        employee = %reservation.employee_id,
                        customer = %reservation.customer_id,
                        "reservation booked"
                    );
                    self.finish_commit(&reservation, event);
                    return Ok(reservation);
                }
                Err(StoreError::Conflict(_)) => {
                    if attempt >= MAX_BOOKING_RETRIES {
                        metrics::counter!(
                            crate::observability::BOOKINGS_TOTAL,
                            "outcome" => "conflict"
                        )
                        .increment(1);
                        return Err(Error::SlotAlreadyBooked);
                    }
                    attempt += 1;
                    metrics::counter!(crate::observability::BOOKING_RETRIES_TOTAL).increment(1);
                    tracing::debug!(
                        employee = %request.employee_id,
                        attempt,
                        "booking insert lost a race, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
