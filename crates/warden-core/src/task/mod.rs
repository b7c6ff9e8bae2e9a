//! Unit-of-work abstraction.
//!
//! A unit of work is the opaque async operation a task performs per tick: fetch one data domain,
//! normalize it, write it to the cache. The supervisor only awaits it and records the outcome.
use std::{future::Future, sync::Arc};

use async_trait::async_trait;

use crate::error::WorkError;

/// Zero-argument async operation executed by the runner.
#[async_trait]
pub trait UnitOfWork: Send + Sync + 'static {
    async fn run(&self) -> Result<(), WorkError>;
}

/// Shared handle to a unit of work.
pub type WorkRef = Arc<dyn UnitOfWork>;

/// Closure-backed [`UnitOfWork`].
///
/// ```
/// use warden_core::{WorkFn, WorkRef};
///
/// let work: WorkRef = WorkFn::arc(|| async { Ok(()) });
/// # let _ = work;
/// ```
pub struct WorkFn<F> {
    f: F,
}

impl<F, Fut> WorkFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }

    pub fn arc(f: F) -> WorkRef {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> UnitOfWork for WorkFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkError>> + Send + 'static,
{
    async fn run(&self) -> Result<(), WorkError> {
        (self.f)().await
    }
}
