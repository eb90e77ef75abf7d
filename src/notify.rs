use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::DomainEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Event collaborator. Publishing is fire-and-forget and happens only after
/// the owning transition has committed.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &DomainEvent);
}

/// Broadcast hub fanning events out per employee.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<DomainEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to events for an employee. Creates the channel if needed.
    pub fn subscribe(&self, employee_id: Ulid) -> broadcast::Receiver<DomainEvent> {
        let sender = self
            .channels
            .entry(employee_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Remove a channel (e.g. when an employee is retired).
    pub fn remove(&self, employee_id: &Ulid) {
        self.channels.remove(employee_id);
    }
}

impl EventSink for NotifyHub {
    /// No-op if nobody is listening.
    fn publish(&self, event: &DomainEvent) {
        if let Some(sender) = self.channels.get(&event.employee_id()) {
            let _ = sender.send(event.clone());
        }
    }
}
