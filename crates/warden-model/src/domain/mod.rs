mod time_serde;

mod task_snapshot;
pub use task_snapshot::TaskSnapshot;

mod health;
pub use health::{CacheHealth, HealthReport, HealthStatus, ProcessMetrics};

mod event;
pub use event::{EventKind, RunEvent};

mod shutdown_phase;
pub use shutdown_phase::ShutdownPhase;

/// Unique task key inside a registry.
pub type TaskName = String;

/// Duration value in milliseconds.
///
/// Used for task intervals and startup stagger delays.
pub type DurationMs = u64;
