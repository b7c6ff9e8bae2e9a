//! Timer seam used by the scheduler and the connectivity prober.
//!
//! All timed control flow goes through [`Timer`], so callers never touch `tokio::time` directly.
//! The default [`TokioTimer`] runs every timer on its own tokio task; tests drive it with
//! tokio's paused clock (`#[tokio::test(start_paused = true)]`).
use std::{sync::Arc, time::Duration};

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Callback fired by a timer. Must not block: spawn anything long-running.
pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

/// Source of one-shot and periodic timers.
pub trait Timer: Send + Sync + 'static {
    /// Fire `cb` once after `delay`.
    fn schedule_once(&self, delay: Duration, cb: TimerCallback) -> TimerHandle;

    /// Fire `cb` at `now + first`, then every `period`.
    ///
    /// Ticks are anchored to the schedule, not to callback completion.
    /// A tick that cannot be delivered on time is dropped, never buffered.
    fn schedule_every(&self, first: Duration, period: Duration, cb: TimerCallback) -> TimerHandle;
}

/// Cancellation handle of a scheduled timer.
///
/// Cancelling is idempotent and safe on timers that already fired.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    #[inline]
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Timer backed by `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl TokioTimer {
    pub fn shared() -> Arc<dyn Timer> {
        Arc::new(Self)
    }
}

impl Timer for TokioTimer {
    fn schedule_once(&self, delay: Duration, cb: TimerCallback) -> TimerHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => trace!("one-shot timer cancelled"),
                _ = tokio::time::sleep(delay) => cb(),
            }
        });
        TimerHandle::new(token)
    }

    fn schedule_every(&self, first: Duration, period: Duration, cb: TimerCallback) -> TimerHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let mut ticker = tokio::time::interval_at(Instant::now() + first, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => {
                        trace!("periodic timer cancelled");
                        break;
                    }
                    _ = ticker.tick() => cb(),
                }
            }
        });
        TimerHandle::new(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, TimerCallback) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        (
            hits,
            Arc::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn once_fires_after_delay() {
        let (hits, cb) = counter();
        let _h = TokioTimer.schedule_once(Duration::from_millis(300), cb);

        tokio::time::sleep(Duration::from_millis(299)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_once_never_fires() {
        let (hits, cb) = counter();
        let h = TokioTimer.schedule_once(Duration::from_millis(300), cb);
        h.cancel();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(h.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn every_ticks_on_schedule_until_cancelled() {
        let (hits, cb) = counter();
        let h = TokioTimer.schedule_every(Duration::from_millis(100), Duration::from_millis(100), cb);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        h.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_fire_is_harmless() {
        let (hits, cb) = counter();
        let h = TokioTimer.schedule_once(Duration::from_millis(10), cb);

        tokio::time::sleep(Duration::from_millis(20)).await;
        h.cancel();
        h.cancel();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
