use ulid::Ulid;

use crate::model::*;

use super::{availability, Engine, Error};

impl Engine {
    pub async fn get_reservation(&self, id: Ulid) -> Result<Reservation, Error> {
        self.require_reservation(id).await
    }

    pub async fn schedules_for_employee(
        &self,
        employee_id: Ulid,
    ) -> Result<Vec<ScheduleSlot>, Error> {
        Ok(self.store.schedules_by_employee(employee_id).await?)
    }

    pub async fn reservations_for_employee(
        &self,
        employee_id: Ulid,
        statuses: &[ReservationStatus],
    ) -> Result<Vec<Reservation>, Error> {
        Ok(self.store.reservations_by_employee(employee_id, statuses).await?)
    }

    /// Bookable windows for an employee inside `query`: availability slots
    /// minus the spans of active reservations.
    pub async fn free_windows(&self, employee_id: Ulid, query: Span) -> Result<Vec<Span>, Error> {
        let slots = self.store.schedules_by_employee(employee_id).await?;
        let active = self
            .store
            .reservations_by_employee(employee_id, &ReservationStatus::ACTIVE)
            .await?;

        let open: Vec<Span> = slots.iter().map(|s| s.span).collect();
        let busy: Vec<Span> = active.iter().map(|r| r.span()).collect();
        Ok(availability::free_windows(&open, &busy, &query))
    }
}
