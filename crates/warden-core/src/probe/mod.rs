//! Connectivity gate in front of the scheduler.
//!
//! The prober checks external reachability once; while offline it retries on a fixed interval
//! and, on the first success, cancels its own timer and fires the online callback exactly once.
#[cfg(feature = "http-probe")]
mod http;
#[cfg(feature = "http-probe")]
pub use http::HttpProbe;

use std::{
    sync::{
        Arc, Mutex, PoisonError, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use warden_model::{EventKind, RunEvent};

use crate::{
    bus::EventBus,
    config::ProbeConfig,
    timer::{Timer, TimerCallback, TimerHandle},
};

/// A reachability check. Returns `false` on any error; never fails otherwise.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    async fn check(&self) -> bool;
}

type OnOnline = Box<dyn FnOnce() + Send>;

/// Retries a [`Probe`] until it succeeds, then signals exactly once.
pub struct ConnectivityProber {
    probe: Arc<dyn Probe>,
    timer: Arc<dyn Timer>,
    timeout: Duration,
    retry_interval: Duration,
    bus: EventBus,
    online: AtomicBool,
    cancelled: AtomicBool,
    probing: AtomicBool,
    retry_timer: Mutex<Option<TimerHandle>>,
    on_online: Mutex<Option<OnOnline>>,
}

impl ConnectivityProber {
    pub fn new(
        probe: Arc<dyn Probe>,
        timer: Arc<dyn Timer>,
        config: &ProbeConfig,
        bus: EventBus,
    ) -> Arc<Self> {
        Arc::new(Self {
            probe,
            timer,
            timeout: config.timeout,
            retry_interval: config.retry_interval,
            bus,
            online: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            probing: AtomicBool::new(false),
            retry_timer: Mutex::new(None),
            on_online: Mutex::new(None),
        })
    }

    #[inline]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// One bounded-time reachability check. A timeout or a panic counts as unreachable.
    pub async fn probe(&self) -> bool {
        let probe = Arc::clone(&self.probe);
        let mut check = tokio::spawn(async move { probe.check().await });
        match tokio::time::timeout(self.timeout, &mut check).await {
            Ok(Ok(reachable)) => reachable,
            Ok(Err(e)) => {
                warn!(error = %e, "connectivity probe aborted");
                false
            }
            Err(_) => {
                check.abort();
                false
            }
        }
    }

    /// Probe now; if offline, keep probing every retry interval until reachable.
    ///
    /// `on_online` runs once, at the first successful probe. Returns whether the first probe
    /// already succeeded; a `false` return means the retry timer is armed.
    pub async fn wait_until_online<F>(self: &Arc<Self>, on_online: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        *self.on_online.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(on_online));

        if self.attempt().await {
            return true;
        }
        if self.cancelled.load(Ordering::Acquire) {
            return false;
        }

        warn!(
            retry_ms = self.retry_interval.as_millis() as u64,
            "external endpoints unreachable; retrying connectivity probe"
        );

        let weak: Weak<Self> = Arc::downgrade(self);
        let retry: TimerCallback = Arc::new(move || {
            if let Some(prober) = weak.upgrade() {
                tokio::spawn(async move {
                    prober.attempt().await;
                });
            }
        });
        let handle = self
            .timer
            .schedule_every(self.retry_interval, self.retry_interval, retry);

        let mut slot = self.retry_timer.lock().unwrap_or_else(PoisonError::into_inner);
        if self.cancelled.load(Ordering::Acquire) || self.is_online() {
            handle.cancel();
        } else {
            *slot = Some(handle);
        }
        false
    }

    /// Cancel the retry timer. A cancelled prober never signals.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(handle) = self
            .retry_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.cancel();
            debug!("connectivity retry timer cancelled");
        }
    }

    async fn attempt(&self) -> bool {
        if self.is_online() {
            return true;
        }
        if self.cancelled.load(Ordering::Acquire) {
            return false;
        }
        if self.probing.swap(true, Ordering::AcqRel) {
            debug!("connectivity probe already in flight");
            return false;
        }

        let reachable = {
            let _probing = ProbingGuard(&self.probing);
            self.probe().await
        };

        if reachable {
            self.mark_online();
        } else {
            debug!("connectivity probe failed");
            self.bus.publish(RunEvent::new(EventKind::ProbeFailed));
        }
        reachable
    }

    fn mark_online(&self) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        if self
            .online
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        if let Some(handle) = self
            .retry_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.cancel();
        }

        info!("connectivity established");
        self.bus.publish(RunEvent::new(EventKind::Online));

        let callback = self
            .on_online
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// Clears the in-flight flag however the probe ends, including when the attempt is dropped.
struct ProbingGuard<'a>(&'a AtomicBool);

impl Drop for ProbingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bus::testing::Recorder, timer::TokioTimer};
    use std::sync::atomic::AtomicUsize;
    use tokio::time::Instant;

    /// Fails the first `failures` checks, then succeeds.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    impl Flaky {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Probe for Flaky {
        async fn check(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst) >= self.failures
        }
    }

    struct Hanging;

    #[async_trait]
    impl Probe for Hanging {
        async fn check(&self) -> bool {
            std::future::pending::<()>().await;
            true
        }
    }

    /// Panics on the first check, then succeeds.
    #[derive(Default)]
    struct PanicsOnce {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Probe for PanicsOnce {
        async fn check(&self) -> bool {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("resolver crashed");
            }
            true
        }
    }

    fn config() -> ProbeConfig {
        ProbeConfig {
            retry_interval: Duration::from_secs(60),
            ..ProbeConfig::default()
        }
    }

    fn prober(probe: Arc<dyn Probe>, recorder: &Arc<Recorder>) -> Arc<ConnectivityProber> {
        ConnectivityProber::new(
            probe,
            TokioTimer::shared(),
            &config(),
            EventBus::new(vec![recorder.clone()]),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn online_immediately_signals_once() {
        let recorder = Arc::new(Recorder::default());
        let p = prober(Flaky::new(0), &recorder);
        let starts = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&starts);

        assert!(p.wait_until_online(move || {
            s.fetch_add(1, Ordering::SeqCst);
        })
        .await);

        assert!(p.is_online());
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.count(EventKind::Online), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn three_failures_then_online_at_fourth_probe() {
        let recorder = Arc::new(Recorder::default());
        let flaky = Flaky::new(3);
        let p = prober(flaky.clone(), &recorder);

        let origin = Instant::now();
        let signalled_at = Arc::new(Mutex::new(Vec::new()));
        let at = Arc::clone(&signalled_at);

        assert!(!p.wait_until_online(move || {
            at.lock().unwrap().push(origin.elapsed());
        })
        .await);

        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(
            signalled_at.lock().unwrap().clone(),
            [Duration::from_secs(180)]
        );
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 4, "retry timer cancelled once online");
        assert_eq!(recorder.count(EventKind::ProbeFailed), 3);
        assert_eq!(recorder.count(EventKind::Online), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn redundant_success_does_not_resignal() {
        let recorder = Arc::new(Recorder::default());
        let p = prober(Flaky::new(0), &recorder);
        let starts = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&starts);

        p.wait_until_online(move || {
            s.fetch_add(1, Ordering::SeqCst);
        })
        .await;
        p.mark_online();
        assert!(p.attempt().await);

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.count(EventKind::Online), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_probe_times_out_as_unreachable() {
        let recorder = Arc::new(Recorder::default());
        let p = prober(Arc::new(Hanging), &recorder);

        let origin = Instant::now();
        assert!(!p.probe().await);
        assert_eq!(origin.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_check_counts_as_unreachable_and_retries() {
        let recorder = Arc::new(Recorder::default());
        let probe = Arc::new(PanicsOnce::default());
        let p = prober(probe.clone(), &recorder);
        let starts = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&starts);

        assert!(!p.wait_until_online(move || {
            s.fetch_add(1, Ordering::SeqCst);
        })
        .await);
        assert!(!p.probing.load(Ordering::Acquire));
        assert_eq!(recorder.count(EventKind::ProbeFailed), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(p.is_online());
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_attempt_releases_in_flight_flag() {
        let recorder = Arc::new(Recorder::default());
        let p = prober(Arc::new(Hanging), &recorder);

        let attempt = tokio::time::timeout(Duration::from_secs(1), p.attempt()).await;
        assert!(attempt.is_err());
        assert!(!p.probing.load(Ordering::Acquire));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_prober_never_signals() {
        let recorder = Arc::new(Recorder::default());
        let flaky = Flaky::new(1);
        let p = prober(flaky.clone(), &recorder);
        let starts = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&starts);

        assert!(!p.wait_until_online(move || {
            s.fetch_add(1, Ordering::SeqCst);
        })
        .await);
        p.cancel();

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(starts.load(Ordering::SeqCst), 0);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
        assert!(!p.is_online());
    }
}
