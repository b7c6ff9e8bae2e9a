use std::io::IsTerminal;

use crate::logger::{error::LoggerError, format::LoggerFormat};

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `warden_core=debug,info`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color: cfg!(test) || std::io::stdout().is_terminal(),
        }
    }
}

impl LoggerConfig {
    /// Build from raw format and filter strings, validating both.
    pub fn from_parts(format: &str, level: &str) -> Result<Self, LoggerError> {
        let format = format.parse()?;
        super::log::mk_filter(level)?;
        Ok(Self {
            format,
            level: level.to_string(),
            ..Self::default()
        })
    }
}
