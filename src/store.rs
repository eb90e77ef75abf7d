use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use ulid::Ulid;

use crate::model::*;

/// Failures surfaced by a storage backend. `Conflict` covers uniqueness and
/// serialization violations — the booking race — and is retried by the
/// engine; everything else is passed through.
#[derive(Debug)]
pub enum StoreError {
    Conflict(&'static str),
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Conflict(what) => write!(f, "storage conflict: {what}"),
            StoreError::Unavailable(e) => write!(f, "storage unavailable: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Storage contract consumed by the engine. Implementations own the
/// transactional unit-of-work boundary; the engine only sequences calls.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_employee(&self, id: Ulid) -> Result<Option<Employee>, StoreError>;
    async fn find_customer(&self, id: Ulid) -> Result<Option<Customer>, StoreError>;
    async fn find_service(&self, id: Ulid) -> Result<Option<Service>, StoreError>;

    async fn schedules_by_employee(&self, employee_id: Ulid)
        -> Result<Vec<ScheduleSlot>, StoreError>;
    async fn find_schedule_slot(&self, id: Ulid) -> Result<Option<ScheduleSlot>, StoreError>;
    /// Allocate the next recurrence group id. Must be atomic — never a
    /// read-max-plus-one.
    async fn next_group_id(&self) -> Result<u64, StoreError>;
    async fn insert_schedule_slots(&self, slots: Vec<ScheduleSlot>) -> Result<(), StoreError>;
    async fn update_schedule_slot(&self, slot: ScheduleSlot) -> Result<(), StoreError>;
    async fn delete_schedule_slot(&self, id: Ulid) -> Result<(), StoreError>;
    /// Delete every row in a group, optionally keeping one row.
    async fn delete_schedule_group(&self, group_id: u64, keep: Option<Ulid>)
        -> Result<(), StoreError>;

    async fn find_reservation(&self, id: Ulid) -> Result<Option<Reservation>, StoreError>;
    async fn reservations_by_employee(
        &self,
        employee_id: Ulid,
        statuses: &[ReservationStatus],
    ) -> Result<Vec<Reservation>, StoreError>;
    /// Insert a new reservation. Enforces the `(employee_id, start)`
    /// exclusion; a racing insert loses with `StoreError::Conflict`.
    async fn insert_reservation(&self, reservation: Reservation) -> Result<(), StoreError>;
    async fn update_reservation(&self, reservation: Reservation) -> Result<(), StoreError>;
    async fn reservations_starting_between(&self, from: Ms, to: Ms)
        -> Result<Vec<Reservation>, StoreError>;
    /// All-time no-show count for a customer, across employees.
    async fn did_not_come_count(&self, customer_id: Ulid) -> Result<u64, StoreError>;

    async fn find_block(&self, customer_id: Ulid, company_id: Ulid)
        -> Result<Option<CustomerBlock>, StoreError>;
    async fn insert_block(&self, block: CustomerBlock) -> Result<(), StoreError>;
}

/// In-process store over DashMap. The `start_index` map doubles as the
/// uniqueness constraint closing the check-then-act booking race: the entry
/// claim is atomic per shard, so exactly one of two racing inserts wins.
pub struct MemoryStore {
    employees: DashMap<Ulid, Employee>,
    customers: DashMap<Ulid, Customer>,
    services: DashMap<Ulid, Service>,
    schedules: DashMap<Ulid, ScheduleSlot>,
    reservations: DashMap<Ulid, Reservation>,
    blocks: DashMap<(Ulid, Ulid), CustomerBlock>,
    /// `(employee_id, start)` → reservation id, claimed while active.
    start_index: DashMap<(Ulid, Ms), Ulid>,
    group_seq: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            employees: DashMap::new(),
            customers: DashMap::new(),
            services: DashMap::new(),
            schedules: DashMap::new(),
            reservations: DashMap::new(),
            blocks: DashMap::new(),
            start_index: DashMap::new(),
            group_seq: AtomicU64::new(0),
        }
    }

    // ── Reference-row seeding (outside the engine contract) ──────

    pub fn put_employee(&self, employee: Employee) {
        self.employees.insert(employee.id, employee);
    }

    pub fn put_customer(&self, customer: Customer) {
        self.customers.insert(customer.id, customer);
    }

    pub fn put_service(&self, service: Service) {
        self.services.insert(service.id, service);
    }

    pub fn schedule_count(&self) -> usize {
        self.schedules.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_employee(&self, id: Ulid) -> Result<Option<Employee>, StoreError> {
        Ok(self.employees.get(&id).map(|e| e.value().clone()))
    }

    async fn find_customer(&self, id: Ulid) -> Result<Option<Customer>, StoreError> {
        Ok(self.customers.get(&id).map(|e| e.value().clone()))
    }

    async fn find_service(&self, id: Ulid) -> Result<Option<Service>, StoreError> {
        Ok(self.services.get(&id).map(|e| e.value().clone()))
    }

    async fn schedules_by_employee(
        &self,
        employee_id: Ulid,
    ) -> Result<Vec<ScheduleSlot>, StoreError> {
        let mut rows: Vec<ScheduleSlot> = self
            .schedules
            .iter()
            .filter(|e| e.value().employee_id == employee_id)
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|s| s.span.start);
        Ok(rows)
    }

    async fn find_schedule_slot(&self, id: Ulid) -> Result<Option<ScheduleSlot>, StoreError> {
        Ok(self.schedules.get(&id).map(|e| e.value().clone()))
    }

    async fn next_group_id(&self) -> Result<u64, StoreError> {
        Ok(self.group_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn insert_schedule_slots(&self, slots: Vec<ScheduleSlot>) -> Result<(), StoreError> {
        for slot in slots {
            self.schedules.insert(slot.id, slot);
        }
        Ok(())
    }

    async fn update_schedule_slot(&self, slot: ScheduleSlot) -> Result<(), StoreError> {
        self.schedules.insert(slot.id, slot);
        Ok(())
    }

    async fn delete_schedule_slot(&self, id: Ulid) -> Result<(), StoreError> {
        self.schedules.remove(&id);
        Ok(())
    }

    async fn delete_schedule_group(
        &self,
        group_id: u64,
        keep: Option<Ulid>,
    ) -> Result<(), StoreError> {
        self.schedules
            .retain(|id, slot| slot.group_id != Some(group_id) || keep == Some(*id));
        Ok(())
    }

    async fn find_reservation(&self, id: Ulid) -> Result<Option<Reservation>, StoreError> {
        Ok(self.reservations.get(&id).map(|e| e.value().clone()))
    }

    async fn reservations_by_employee(
        &self,
        employee_id: Ulid,
        statuses: &[ReservationStatus],
    ) -> Result<Vec<Reservation>, StoreError> {
        let mut rows: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|e| {
                e.value().employee_id == employee_id && statuses.contains(&e.value().status)
            })
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|r| r.start);
        Ok(rows)
    }

    async fn insert_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        match self.start_index.entry((reservation.employee_id, reservation.start)) {
            Entry::Occupied(existing) => {
                if *existing.get() != reservation.id {
                    return Err(StoreError::Conflict("reservation start already claimed"));
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(reservation.id);
            }
        }
        self.reservations.insert(reservation.id, reservation);
        Ok(())
    }

    async fn update_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        if reservation.status.is_terminal() {
            // Free the start claim so the slot becomes bookable again.
            let key = (reservation.employee_id, reservation.start);
            if self.start_index.get(&key).is_some_and(|e| *e.value() == reservation.id) {
                self.start_index.remove(&key);
            }
        }
        self.reservations.insert(reservation.id, reservation);
        Ok(())
    }

    async fn reservations_starting_between(
        &self,
        from: Ms,
        to: Ms,
    ) -> Result<Vec<Reservation>, StoreError> {
        let mut rows: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|e| {
                let r = e.value();
                r.status.is_active() && r.start >= from && r.start < to
            })
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|r| r.start);
        Ok(rows)
    }

    async fn did_not_come_count(&self, customer_id: Ulid) -> Result<u64, StoreError> {
        Ok(self
            .reservations
            .iter()
            .filter(|e| {
                e.value().customer_id == customer_id
                    && e.value().status == ReservationStatus::DidNotCome
            })
            .count() as u64)
    }

    async fn find_block(
        &self,
        customer_id: Ulid,
        company_id: Ulid,
    ) -> Result<Option<CustomerBlock>, StoreError> {
        Ok(self
            .blocks
            .get(&(customer_id, company_id))
            .map(|e| e.value().clone()))
    }

    async fn insert_block(&self, block: CustomerBlock) -> Result<(), StoreError> {
        // First effective block for the pair wins; a duplicate insert is a no-op.
        self.blocks
            .entry((block.customer_id, block.company_id))
            .or_insert(block);
        Ok(())
    }
}
