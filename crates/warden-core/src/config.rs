use std::time::Duration;

use crate::{error::CoreError, scheduler::PeriodicAnchor};

/// Upper bound for a single connectivity probe.
pub const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connectivity prober settings.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Endpoint used by the HTTP probe.
    pub url: String,
    /// Bound on one probe; at most [`MAX_PROBE_TIMEOUT`].
    pub timeout: Duration,
    /// Delay between probes while offline.
    pub retry_interval: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            url: "https://www.wikidata.org".to_string(),
            timeout: MAX_PROBE_TIMEOUT,
            retry_interval: Duration::from_secs(60),
        }
    }
}

/// Shutdown drain settings.
#[derive(Debug, Clone)]
pub struct DrainConfig {
    /// Longest wait for in-flight requests before forcing shutdown.
    pub timeout: Duration,
    /// How often the in-flight count is re-checked.
    pub poll_interval: Duration,
    /// Bound on releasing one shared resource after the drain.
    pub release_timeout: Duration,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(500),
            release_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SupervisorConfig {
    pub probe: ProbeConfig,
    pub drain: DrainConfig,
    pub anchor: PeriodicAnchor,
}

impl SupervisorConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.probe.url.trim().is_empty() {
            return Err(CoreError::InvalidConfig("probe url is empty".into()));
        }
        if self.probe.timeout.is_zero() || self.probe.timeout > MAX_PROBE_TIMEOUT {
            return Err(CoreError::InvalidConfig(format!(
                "probe timeout must be within (0, {}ms]",
                MAX_PROBE_TIMEOUT.as_millis()
            )));
        }
        if self.probe.retry_interval.is_zero() {
            return Err(CoreError::InvalidConfig(
                "probe retry interval must be greater than zero".into(),
            ));
        }
        if self.drain.timeout.is_zero() || self.drain.poll_interval.is_zero() {
            return Err(CoreError::InvalidConfig(
                "drain timeout and poll interval must be greater than zero".into(),
            ));
        }
        if self.drain.release_timeout.is_zero() {
            return Err(CoreError::InvalidConfig(
                "release timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
