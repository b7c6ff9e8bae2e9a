//! Fan-out of supervisor events to subscribers (logging, metrics).
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use tracing::error;
use warden_model::RunEvent;

/// Receiver of supervisor events.
///
/// Called inline on the publishing task, so implementations must be quick and non-blocking.
pub trait Subscribe: Send + Sync + 'static {
    fn on_event(&self, event: &RunEvent);

    fn name(&self) -> &'static str;
}

/// Cheap-to-clone broadcaster over a fixed subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Vec<Arc<dyn Subscribe>>>,
}

impl EventBus {
    pub fn new(subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        Self {
            subscribers: Arc::new(subscribers),
        }
    }

    /// Deliver `event` to every subscriber. A panicking subscriber is logged and skipped.
    pub fn publish(&self, event: RunEvent) {
        for sub in self.subscribers.iter() {
            if catch_unwind(AssertUnwindSafe(|| sub.on_event(&event))).is_err() {
                error!(
                    subscriber = sub.name(),
                    kind = ?event.kind,
                    "subscriber panicked while processing an event"
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
