use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dose_time::DoseTime;

/// Listeners implement this to follow dose-time boundaries.
pub trait DoseTimeListener: Send + Sync {
    fn on_dose_time_begin(&self, date: NaiveDate, slot: DoseTime);
    fn on_dose_time_end(&self, date: NaiveDate, slot: DoseTime);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoseTimeEvent {
    Begin { date: NaiveDate, slot: DoseTime },
    End { date: NaiveDate, slot: DoseTime },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(ListenerId, Arc<dyn DoseTimeListener>)>,
}

/// Observer list for dose-time events. Dispatch is synchronous and follows
/// registration order.
#[derive(Default)]
pub struct DoseTimeEvents {
    registry: RwLock<Registry>,
}

impl DoseTimeEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn DoseTimeListener>) -> ListenerId {
        let mut registry = self.registry.write();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.push((id, listener));
        id
    }

    /// Returns `false` if `id` was not registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.write();
        let before = registry.listeners.len();
        registry.listeners.retain(|(existing, _)| *existing != id);
        registry.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.registry.read().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dispatch(&self, event: DoseTimeEvent) {
        // Listeners may (un)register while being notified.
        let listeners: Vec<Arc<dyn DoseTimeListener>> = self
            .registry
            .read()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        debug!(?event, listeners = listeners.len(), "dispatching dose-time event");
        for listener in listeners {
            match event {
                DoseTimeEvent::Begin { date, slot } => listener.on_dose_time_begin(date, slot),
                DoseTimeEvent::End { date, slot } => listener.on_dose_time_end(date, slot),
            }
        }
    }
}
