use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Counter of requests currently being served, maintained by the HTTP layer.
#[derive(Clone, Default)]
pub struct RequestTracker {
    inner: Arc<Inner>,
}

/// Marks one request as in flight until dropped.
pub struct RequestGuard {
    inner: Arc<Inner>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> RequestGuard {
        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        RequestGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    #[inline]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Resolves once no request is in flight.
    pub async fn idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
