use serde::{Deserialize, Serialize};

/// Lifecycle of the shutdown coordinator.
///
/// Phases only move forward: `Running → ShuttingDown → Drained → Exited`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShutdownPhase {
    /// Serving requests, timers armed.
    Running,
    /// Trigger received; listener closed, timers cancelled, waiting for in-flight requests.
    ShuttingDown,
    /// In-flight requests finished or the drain timeout elapsed.
    Drained,
    /// Shared resources released; the process may exit.
    Exited,
}

impl ShutdownPhase {
    /// Returns `true` once shutdown has been triggered.
    pub fn is_shutting_down(&self) -> bool {
        *self != ShutdownPhase::Running
    }
}
