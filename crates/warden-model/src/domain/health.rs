use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{TaskName, TaskSnapshot};

/// Overall verdict of a health report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthStatus {
    /// Every task's latest run succeeded (or has not run yet) and the cache is reachable.
    Ok,
    /// At least one task is failing or the cache is unavailable.
    Degraded,
}

/// Cache subsystem health as reported by the cache collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheHealth {
    pub available: bool,
    pub entries: usize,
}

/// Process-level figures attached to every health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMetrics {
    pub uptime_seconds: u64,
    /// Resident set size; `None` where the platform does not expose it.
    pub memory_rss_bytes: Option<u64>,
    pub in_flight_requests: usize,
    pub platform: String,
    pub hostname: String,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub online: bool,
    pub shutting_down: bool,
    pub process: ProcessMetrics,
    pub cache: CacheHealth,
    pub tasks: BTreeMap<TaskName, TaskSnapshot>,
}

impl HealthReport {
    /// Assemble a report, deriving `status` from the task snapshots and cache health.
    pub fn new(
        online: bool,
        shutting_down: bool,
        process: ProcessMetrics,
        cache: CacheHealth,
        tasks: BTreeMap<TaskName, TaskSnapshot>,
    ) -> Self {
        let degraded = !cache.available || tasks.values().any(TaskSnapshot::is_failing);
        let status = if degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ok
        };

        Self {
            status,
            online,
            shutting_down,
            process,
            cache,
            tasks,
        }
    }
}
