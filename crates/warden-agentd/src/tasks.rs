//! Task file loading and the HTTP refresh unit of work.
use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use warden_core::{SharedCache, TaskDefinition, TaskRegistry, UnitOfWork, WorkError};

use crate::config::ConfigError;

const DEFAULT_TTL_SECONDS: u64 = 300;

/// One entry of the JSON task file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskEntry {
    pub name: String,
    pub url: String,
    pub interval_ms: u64,
    #[serde(default)]
    pub initial_delay_ms: u64,
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECONDS
}

pub fn parse_tasks(json: &str) -> Result<Vec<TaskEntry>, ConfigError> {
    Ok(serde_json::from_str(json)?)
}

/// Read the task file and build a validated registry of HTTP refresh tasks.
pub fn load_registry(
    path: &Path,
    client: reqwest::Client,
    cache: SharedCache,
) -> Result<TaskRegistry, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::TaskFile {
        path: path.to_path_buf(),
        source,
    })?;
    build_registry(parse_tasks(&raw)?, client, cache)
}

pub fn build_registry(
    entries: Vec<TaskEntry>,
    client: reqwest::Client,
    cache: SharedCache,
) -> Result<TaskRegistry, ConfigError> {
    let definitions = entries
        .into_iter()
        .map(|entry| {
            let work = Arc::new(HttpRefresh {
                key: entry.name.clone(),
                url: entry.url,
                ttl_seconds: entry.ttl_seconds,
                client: client.clone(),
                cache: cache.clone(),
            });
            TaskDefinition::new(entry.name, work, entry.interval_ms)
                .with_initial_delay_ms(entry.initial_delay_ms)
        })
        .collect();
    Ok(TaskRegistry::new(definitions)?)
}

/// Fetches one URL and stores the payload in the cache under the task's name.
///
/// JSON bodies are cached as parsed values; anything else (RSS, plain text) as a string.
pub struct HttpRefresh {
    key: String,
    url: String,
    ttl_seconds: u64,
    client: reqwest::Client,
    cache: SharedCache,
}

#[async_trait]
impl UnitOfWork for HttpRefresh {
    async fn run(&self) -> Result<(), WorkError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| WorkError::fail(format!("request to {} failed: {e}", self.url)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WorkError::fail(format!(
                "{} returned {status}",
                self.url
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| WorkError::fail(format!("reading body from {} failed: {e}", self.url)))?;
        let value = serde_json::from_str(&body).unwrap_or(Value::String(body));

        let stored = self.cache.set(&self.key, value, self.ttl_seconds).await;
        debug!(key = %self.key, stored, "refresh payload fetched");
        Ok(())
    }
}
