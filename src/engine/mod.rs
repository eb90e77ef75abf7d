mod admission;
mod availability;
mod error;
mod lifecycle;
mod planner;
mod policy;
mod queries;

pub use admission::BookingRequest;
pub use availability::{free_windows, merge_overlapping, subtract_intervals};
pub use error::Error;
pub use lifecycle::NoShowOutcome;
pub use planner::{CreateScheduleRequest, UpdateScheduleRequest};

use std::collections::HashMap;
use std::sync::Arc;

use ulid::Ulid;

use crate::cache::{Cache, CacheKey};
use crate::clock::Clock;
use crate::limits::REMINDER_HORIZON_MS;
use crate::model::*;
use crate::notify::EventSink;
use crate::store::Store;

/// The scheduling gateway: wires the booking/lifecycle logic to its
/// storage, event, cache, and clock collaborators. Every mutation follows
/// the same ordering — validate, write, publish, invalidate — so a reader
/// can never observe a stale cache entry paired with a fresh write, and
/// events exist only as the return value of one successful transition.
pub struct Engine {
    store: Arc<dyn Store>,
    events: Arc<dyn EventSink>,
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        events: Arc<dyn EventSink>,
        cache: Arc<dyn Cache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, events, cache, clock }
    }

    pub(super) fn now(&self) -> Ms {
        self.clock.now_ms()
    }

    // ── Lookup helpers ───────────────────────────────────────────

    pub(super) async fn require_employee(&self, id: Ulid) -> Result<Employee, Error> {
        self.store.find_employee(id).await?.ok_or(Error::NotFound(id))
    }

    pub(super) async fn require_customer(&self, id: Ulid) -> Result<Customer, Error> {
        self.store.find_customer(id).await?.ok_or(Error::NotFound(id))
    }

    pub(super) async fn require_service(&self, id: Ulid) -> Result<Service, Error> {
        self.store.find_service(id).await?.ok_or(Error::NotFound(id))
    }

    pub(super) async fn require_reservation(&self, id: Ulid) -> Result<Reservation, Error> {
        self.store.find_reservation(id).await?.ok_or(Error::NotFound(id))
    }

    // ── Post-commit plumbing ─────────────────────────────────────

    /// Publish the transition's event and drop the listing caches touched
    /// by the reservation. Only called after the store write succeeded.
    pub(super) fn finish_commit(&self, reservation: &Reservation, event: DomainEvent) {
        self.events.publish(&event);
        self.invalidate(&CacheKey::Employee(reservation.employee_id));
        self.invalidate(&CacheKey::Customer(reservation.customer_id));
        self.invalidate(&CacheKey::Listings);
    }

    pub(super) fn invalidate_schedule_views(&self, employee_id: Ulid) {
        self.invalidate(&CacheKey::Employee(employee_id));
        self.invalidate(&CacheKey::Listings);
    }

    fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key);
        metrics::counter!(crate::observability::CACHE_INVALIDATIONS_TOTAL).increment(1);
    }

    // ── Starting-soon sweep ──────────────────────────────────────

    /// Publish `StartingSoon` for active reservations starting within the
    /// reminder horizon. `notified` maps reservation id → start and is the
    /// caller-held de-dup state; entries whose start has passed are pruned.
    pub async fn publish_starting_soon(
        &self,
        notified: &mut HashMap<Ulid, Ms>,
    ) -> Result<usize, Error> {
        let now = self.now();
        notified.retain(|_, start| *start >= now);

        let upcoming = self
            .store
            .reservations_starting_between(now, now + REMINDER_HORIZON_MS)
            .await?;

        let mut sent = 0;
        for reservation in upcoming {
            if notified.contains_key(&reservation.id) {
                continue;
            }
            self.events.publish(&DomainEvent::StartingSoon {
                reservation_id: reservation.id,
                customer_id: reservation.customer_id,
                employee_id: reservation.employee_id,
                occurred_at: now,
                start: reservation.start,
            });
            metrics::counter!(crate::observability::REMINDERS_SENT_TOTAL).increment(1);
            notified.insert(reservation.id, reservation.start);
            sent += 1;
        }
        Ok(sent)
    }
}
