use std::sync::Arc;

use tokio::sync::watch;
use warden_model::{CacheHealth, HealthReport, ProcessMetrics, ShutdownPhase};

use crate::{
    cache::SharedCache, probe::ConnectivityProber, shutdown::RequestTracker, state::StateStore,
    system,
};

/// Assembles [`HealthReport`]s from live supervisor state.
///
/// Without a prober the process counts as online; without a cache the cache counts as available.
#[derive(Clone)]
pub struct HealthReporter {
    store: StateStore,
    tracker: RequestTracker,
    prober: Option<Arc<ConnectivityProber>>,
    cache: Option<SharedCache>,
    phase: watch::Receiver<ShutdownPhase>,
}

impl HealthReporter {
    pub fn new(store: StateStore, tracker: RequestTracker) -> Self {
        let (_, phase) = watch::channel(ShutdownPhase::Running);
        Self {
            store,
            tracker,
            prober: None,
            cache: None,
            phase,
        }
    }

    pub fn with_prober(mut self, prober: Arc<ConnectivityProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn with_cache(mut self, cache: SharedCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Follow the shutdown phase published by a coordinator.
    pub fn with_phase(mut self, phase: watch::Receiver<ShutdownPhase>) -> Self {
        self.phase = phase;
        self
    }

    pub fn report(&self) -> HealthReport {
        let process = ProcessMetrics {
            uptime_seconds: system::uptime_seconds(),
            memory_rss_bytes: system::memory_rss_bytes(),
            in_flight_requests: self.tracker.in_flight(),
            platform: system::platform().to_string(),
            hostname: system::hostname().to_string(),
        };
        let cache = self.cache.as_ref().map_or(
            CacheHealth {
                available: true,
                entries: 0,
            },
            SharedCache::health,
        );
        let online = self.prober.as_ref().is_none_or(|p| p.is_online());
        let shutting_down = self.phase.borrow().is_shutting_down();

        HealthReport::new(online, shutting_down, process, cache, self.store.snapshot())
    }
}
