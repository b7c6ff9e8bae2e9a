//! Cache collaborator used by units of work.
//!
//! The cache is advisory: [`SharedCache`] logs and swallows every backend error, so an
//! unavailable cache degrades health but never fails a task.
mod memory;
pub use memory::MemoryCache;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{trace, warn};
use warden_model::CacheHealth;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cache serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key/value store with per-entry TTL. Implementations must be safe under concurrent calls.
#[async_trait]
pub trait Cache: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    fn health(&self) -> CacheHealth;
}

/// Cloneable, error-swallowing front for a [`Cache`] backend.
#[derive(Clone)]
pub struct SharedCache {
    inner: Arc<dyn Cache>,
}

impl SharedCache {
    pub fn new(inner: Arc<dyn Cache>) -> Self {
        Self { inner }
    }

    /// Cached value for `key`; a backend error reads as a miss.
    pub async fn get(&self, key: &str) -> Option<Value> {
        match self.inner.get(key).await {
            Ok(hit) => {
                trace!(key, hit = hit.is_some(), "cache lookup");
                hit
            }
            Err(e) => {
                warn!(key, error = %e, "cache read skipped");
                None
            }
        }
    }

    /// Store `value` for `ttl_seconds`. Returns whether the write landed.
    pub async fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> bool {
        match self
            .inner
            .set(key, value, Duration::from_secs(ttl_seconds))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "cache write skipped");
                false
            }
        }
    }

    pub fn health(&self) -> CacheHealth {
        self.inner.health()
    }
}
