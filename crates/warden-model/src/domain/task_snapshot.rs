use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::DurationMs;

/// Point-in-time view of one scheduled task.
///
/// Produced by the state store for the health endpoint. Timer handles never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    /// An invocation of the unit of work is in flight.
    pub running: bool,
    /// When the last successful invocation finished.
    #[serde(default, with = "super::time_serde")]
    pub last_run: Option<SystemTime>,
    /// Message of the most recent failure, cleared by the next success.
    pub last_error: Option<String>,
    /// Invocations that actually started.
    #[serde(default)]
    pub runs: u64,
    /// Invocations that ended in a failure.
    #[serde(default)]
    pub failures: u64,
    /// Ticks dropped by the overlap guard.
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub interval_ms: DurationMs,
    #[serde(default)]
    pub initial_delay_ms: DurationMs,
}

impl TaskSnapshot {
    /// Returns `true` if the latest completed invocation failed.
    pub fn is_failing(&self) -> bool {
        self.last_error.is_some()
    }
}
