use thiserror::Error;

/// Failure to build or install the global tracing subscriber.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("invalid log format '{0}' (expected: text|json|journald)")]
    InvalidFormat(String),
    #[error("journald output requires Linux and the `journald` feature")]
    JournaldNotSupported,
    #[error("a global logger is already installed")]
    AlreadyInitialized,
    #[error("logger initialization failed: {0}")]
    InitializationFailed(String),
    #[error("invalid log filter '{0}'")]
    InvalidLogLevel(String),
}
