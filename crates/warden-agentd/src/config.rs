use std::{path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use warden_core::{CoreError, SupervisorConfig};
use warden_observe::{LoggerConfig, LoggerError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("cannot read task file {path}: {source}")]
    TaskFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed task file: {0}")]
    TaskFormat(#[from] serde_json::Error),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Logger(#[from] LoggerError),
}

/// Agent configuration loaded from environment variables with defaults.
///
/// | Env Var                     | Default                     |
/// |-----------------------------|-----------------------------|
/// | `WARDEN_HOST`               | `0.0.0.0`                   |
/// | `WARDEN_PORT`               | `8080`                      |
/// | `WARDEN_TASKS_FILE`         | `tasks.json`                |
/// | `WARDEN_PROBE_URL`          | `https://www.wikidata.org`  |
/// | `WARDEN_PROBE_TIMEOUT_MS`   | `5000`                      |
/// | `WARDEN_PROBE_RETRY_MS`     | `60000`                     |
/// | `WARDEN_DRAIN_TIMEOUT_MS`   | `15000`                     |
/// | `WARDEN_DRAIN_POLL_MS`      | `500`                       |
/// | `WARDEN_RELEASE_TIMEOUT_MS` | `5000`                      |
/// | `WARDEN_ANCHOR`             | `start`                     |
/// | `WARDEN_LOG_FORMAT`         | `text`                      |
/// | `WARDEN_LOG_LEVEL`          | `info`                      |
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub host: String,
    pub port: u16,
    pub tasks_file: PathBuf,
    pub supervisor: SupervisorConfig,
    pub logger: LoggerConfig,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut supervisor = SupervisorConfig::default();

        if let Some(url) = get("WARDEN_PROBE_URL") {
            supervisor.probe.url = url;
        }
        if let Some(ms) = parse_opt::<u64>(&get, "WARDEN_PROBE_TIMEOUT_MS")? {
            supervisor.probe.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_opt::<u64>(&get, "WARDEN_PROBE_RETRY_MS")? {
            supervisor.probe.retry_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_opt::<u64>(&get, "WARDEN_DRAIN_TIMEOUT_MS")? {
            supervisor.drain.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_opt::<u64>(&get, "WARDEN_DRAIN_POLL_MS")? {
            supervisor.drain.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_opt::<u64>(&get, "WARDEN_RELEASE_TIMEOUT_MS")? {
            supervisor.drain.release_timeout = Duration::from_millis(ms);
        }
        if let Some(anchor) = parse_opt(&get, "WARDEN_ANCHOR")? {
            supervisor.anchor = anchor;
        }
        supervisor.validate()?;

        let logger = LoggerConfig::from_parts(
            get("WARDEN_LOG_FORMAT").as_deref().unwrap_or("text"),
            get("WARDEN_LOG_LEVEL").as_deref().unwrap_or("info"),
        )?;

        Ok(Self {
            host: get("WARDEN_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_opt(&get, "WARDEN_PORT")?.unwrap_or(8080),
            tasks_file: get("WARDEN_TASKS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("tasks.json")),
            supervisor,
            logger,
        })
    }
}

fn parse_opt<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}
