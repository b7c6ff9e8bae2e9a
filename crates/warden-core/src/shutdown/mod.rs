//! Coordinated, bounded-time shutdown.
//!
//! `Running → ShuttingDown → Drained → Exited`. A trigger closes the listener, cancels every
//! timer, waits for in-flight requests (bounded by the drain timeout), then releases shared
//! resources. Release failures are logged and never stop the sequence.
mod tracker;
pub use tracker::{RequestGuard, RequestTracker};

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::watch, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use warden_model::{EventKind, RunEvent, ShutdownPhase};

use crate::{
    bus::EventBus, config::DrainConfig, error::CoreError, probe::ConnectivityProber,
    scheduler::Scheduler,
};

/// A shared resource released at the end of shutdown.
#[async_trait]
pub trait Release: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn release(&self) -> Result<(), CoreError>;
}

/// Summary of a completed shutdown sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every in-flight request finished before the drain timeout.
    pub drained: bool,
    /// Requests still in flight when draining stopped.
    pub remaining: usize,
    /// Time from trigger to `Exited`.
    pub elapsed: Duration,
}

pub struct ShutdownCoordinator {
    scheduler: Arc<Scheduler>,
    tracker: RequestTracker,
    config: DrainConfig,
    bus: EventBus,
    prober: Option<Arc<ConnectivityProber>>,
    resources: Vec<Arc<dyn Release>>,
    accept: CancellationToken,
    in_progress: AtomicBool,
    phase: watch::Sender<ShutdownPhase>,
}

impl ShutdownCoordinator {
    pub fn new(
        scheduler: Arc<Scheduler>,
        tracker: RequestTracker,
        config: DrainConfig,
        bus: EventBus,
    ) -> Self {
        let (phase, _) = watch::channel(ShutdownPhase::Running);
        Self {
            scheduler,
            tracker,
            config,
            bus,
            prober: None,
            resources: Vec::new(),
            accept: CancellationToken::new(),
            in_progress: AtomicBool::new(false),
            phase,
        }
    }

    pub fn with_prober(mut self, prober: Arc<ConnectivityProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn with_resource(mut self, resource: Arc<dyn Release>) -> Self {
        self.resources.push(resource);
        self
    }

    /// Cancelled when the HTTP layer must stop accepting connections.
    pub fn accept_token(&self) -> CancellationToken {
        self.accept.clone()
    }

    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase.subscribe()
    }

    /// Run the shutdown sequence.
    ///
    /// Only the first call does anything; later or concurrent calls return `None` immediately.
    pub async fn trigger(&self) -> Option<ShutdownReport> {
        if self.in_progress.swap(true, Ordering::AcqRel) {
            debug!("shutdown already in progress");
            return None;
        }
        let started = Instant::now();

        self.advance(ShutdownPhase::ShuttingDown);
        info!(
            in_flight = self.tracker.in_flight(),
            "shutdown requested; closing listener and cancelling timers"
        );
        self.bus.publish(RunEvent::new(EventKind::ShutdownRequested));

        self.accept.cancel();
        self.scheduler.stop();
        if let Some(prober) = &self.prober {
            prober.cancel();
        }

        let remaining = self.drain().await;
        let drained = remaining == 0;
        if drained {
            info!("in-flight requests drained");
            self.bus.publish(RunEvent::new(EventKind::DrainCompleted));
        } else {
            warn!(
                remaining,
                timeout_ms = self.config.timeout.as_millis() as u64,
                "drain timeout elapsed; forcing shutdown"
            );
            self.bus.publish(
                RunEvent::new(EventKind::GraceExceeded)
                    .with_reason(format!("{remaining} request(s) still in flight")),
            );
        }
        self.advance(ShutdownPhase::Drained);

        self.release_all().await;

        self.advance(ShutdownPhase::Exited);
        let elapsed = started.elapsed();
        info!(elapsed_ms = elapsed.as_millis() as u64, drained, "shutdown complete");
        self.bus.publish(
            RunEvent::new(EventKind::Exited)
                .with_duration_ms(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)),
        );

        Some(ShutdownReport {
            drained,
            remaining,
            elapsed,
        })
    }

    /// Wait until nothing is in flight or the drain timeout elapses.
    ///
    /// Re-checks every poll interval and also wakes as soon as the last request finishes.
    /// Returns the number of requests still in flight.
    async fn drain(&self) -> usize {
        let deadline = Instant::now() + self.config.timeout;
        loop {
            let in_flight = self.tracker.in_flight();
            if in_flight == 0 {
                return 0;
            }
            let now = Instant::now();
            if now >= deadline {
                return in_flight;
            }

            debug!(in_flight, "waiting for in-flight requests");
            let wait = self.config.poll_interval.min(deadline - now);
            tokio::select! {
                _ = self.tracker.idle() => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Release every resource in registration order.
    ///
    /// Each release runs on its own task bounded by the release timeout, so an error, a panic
    /// or a hang is reported and the sequence moves on.
    async fn release_all(&self) {
        for resource in &self.resources {
            let name = resource.name().to_string();
            let owned = Arc::clone(resource);
            let mut handle = tokio::spawn(async move { owned.release().await });

            let reason = match tokio::time::timeout(self.config.release_timeout, &mut handle).await
            {
                Ok(Ok(Ok(()))) => {
                    debug!(resource = %name, "resource released");
                    continue;
                }
                Ok(Ok(Err(e))) => e.to_string(),
                Ok(Err(e)) if e.is_panic() => "release panicked".to_string(),
                Ok(Err(e)) => e.to_string(),
                Err(_) => {
                    handle.abort();
                    format!(
                        "release timed out after {}ms",
                        self.config.release_timeout.as_millis()
                    )
                }
            };
            warn!(resource = %name, %reason, "failed to release resource");
            self.bus
                .publish(RunEvent::new(EventKind::ResourceReleaseFailed).with_reason(reason));
        }
    }

    fn advance(&self, phase: ShutdownPhase) {
        self.phase.send_replace(phase);
    }
}
