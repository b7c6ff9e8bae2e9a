use std::{
    collections::HashMap,
    sync::{
        PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;
use warden_model::CacheHealth;

use crate::{
    cache::{Cache, CacheError},
    error::CoreError,
    shutdown::Release,
};

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-process TTL cache.
///
/// Expired entries are dropped lazily on read and on write. After [`Release::release`] the cache
/// is empty and reports itself unavailable.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    open: AtomicBool,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            open: AtomicBool::new(true),
        }
    }

    fn ensure_open(&self) -> Result<(), CacheError> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(CacheError::Unavailable("cache released".into()))
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        self.ensure_open()?;
        let now = Instant::now();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                None => return Ok(None),
                Some(e) if e.expires_at > now => return Ok(Some(e.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    fn health(&self) -> CacheHealth {
        let now = Instant::now();
        let entries = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|e| e.expires_at > now)
            .count();
        CacheHealth {
            available: self.open.load(Ordering::Acquire),
            entries,
        }
    }
}

#[async_trait]
impl Release for MemoryCache {
    fn name(&self) -> &str {
        "memory-cache"
    }

    async fn release(&self) -> Result<(), CoreError> {
        self.open.store(false, Ordering::Release);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "memory cache released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("events", json!(["launch"]), Duration::from_secs(30))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(cache.get("events").await.unwrap(), Some(json!(["launch"])));
        assert_eq!(cache.health().entries, 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(cache.get("events").await.unwrap(), None);
        assert_eq!(cache.health().entries, 0);
    }

    #[tokio::test]
    async fn overwrite_replaces_value() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("k", json!(1), ttl).await.unwrap();
        cache.set("k", json!(2), ttl).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), Some(json!(2)));
        assert_eq!(cache.health().entries, 1);
    }

    #[tokio::test]
    async fn released_cache_is_unavailable() {
        let cache = MemoryCache::new();
        cache
            .set("k", json!("v"), Duration::from_secs(60))
            .await
            .unwrap();

        cache.release().await.unwrap();

        let health = cache.health();
        assert!(!health.available);
        assert_eq!(health.entries, 0);
        assert!(matches!(
            cache.get("k").await,
            Err(CacheError::Unavailable(_))
        ));
        assert!(cache.set("k", json!("v"), Duration::from_secs(1)).await.is_err());
    }
}
