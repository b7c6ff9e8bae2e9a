use thiserror::Error;

/// Configuration and lifecycle errors of the supervisor.
///
/// Everything here is fatal at startup; per-task failures are [`WorkError`]s and never surface as `CoreError`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("task name must not be empty")]
    EmptyName,
    #[error("duplicate task name: {0}")]
    DuplicateName(String),
    #[error("task '{task}': interval must be greater than zero")]
    InvalidInterval { task: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("scheduler already started")]
    AlreadyStarted,
    #[error("scheduler has been stopped")]
    Stopped,
    #[error("http client: {0}")]
    Http(String),
    #[error("failed to release '{resource}': {reason}")]
    Release { resource: String, reason: String },
}

/// Failure of a single unit-of-work invocation.
///
/// The display string is what ends up in the task's `lastError`.
#[derive(Debug, Error)]
pub enum WorkError {
    #[error("{0}")]
    Fail(String),
    #[error("panicked: {0}")]
    Panicked(String),
}

impl WorkError {
    pub fn fail(reason: impl Into<String>) -> Self {
        WorkError::Fail(reason.into())
    }
}
