//! Supervised execution of a single task invocation.
use std::{
    any::Any,
    sync::Arc,
    time::{Instant, SystemTime},
};

use tracing::{debug, instrument, trace, warn};
use warden_model::{EventKind, RunEvent};

use crate::{bus::EventBus, error::WorkError, registry::TaskDefinition, state::TaskRuntime};

/// What happened to one runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another invocation was still in flight; nothing ran.
    Skipped,
    Succeeded,
    Failed(String),
}

/// Runs units of work behind the overlap guard and records their outcome.
///
/// Failures are captured into the task's state and never propagated.
#[derive(Clone, Default)]
pub struct TaskRunner {
    bus: EventBus,
}

impl TaskRunner {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// Execute `task` once unless it is already running.
    ///
    /// The unit of work runs on its own tokio task, so a panic inside it is reported as a
    /// failure instead of unwinding through the scheduler. The `running` flag is cleared by
    /// the overlap guard on every path.
    #[instrument(level = "trace", skip_all, fields(task = %task.name()))]
    pub async fn run(&self, task: &TaskDefinition, state: &TaskRuntime) -> RunOutcome {
        let Some(_guard) = state.try_begin() else {
            state.record_skip();
            trace!("previous run still in flight; tick skipped");
            self.bus
                .publish(RunEvent::new(EventKind::TaskSkipped).with_task(task.name()));
            return RunOutcome::Skipped;
        };

        self.bus
            .publish(RunEvent::new(EventKind::TaskStarting).with_task(task.name()));
        let started = Instant::now();

        let work = Arc::clone(task.work());
        let result = match tokio::spawn(async move { work.run().await }).await {
            Ok(result) => result,
            Err(join) if join.is_panic() => Err(WorkError::Panicked(panic_message(join.into_panic()))),
            Err(join) => Err(WorkError::fail(join.to_string())),
        };
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(()) => {
                state.record_success(SystemTime::now());
                debug!(duration_ms, "run succeeded");
                self.bus.publish(
                    RunEvent::new(EventKind::TaskSucceeded)
                        .with_task(task.name())
                        .with_duration_ms(duration_ms),
                );
                RunOutcome::Succeeded
            }
            Err(err) => {
                let message = err.to_string();
                state.record_failure(message.clone());
                warn!(duration_ms, error = %message, "run failed");
                self.bus.publish(
                    RunEvent::new(EventKind::TaskFailed)
                        .with_task(task.name())
                        .with_reason(message.clone())
                        .with_duration_ms(duration_ms),
                );
                RunOutcome::Failed(message)
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
