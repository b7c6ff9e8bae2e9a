use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::TaskName;

/// Classification of a supervisor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    // scheduler
    SchedulerStarted,
    SchedulerStopped,
    TaskScheduled,

    // runner
    TaskStarting,
    TaskSucceeded,
    TaskFailed,
    TaskSkipped,

    // connectivity
    ProbeFailed,
    Online,

    // shutdown
    ShutdownRequested,
    DrainCompleted,
    GraceExceeded,
    ResourceReleaseFailed,
    Exited,
}

/// A single observation published by the supervisor to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEvent {
    pub kind: EventKind,
    pub task: Option<TaskName>,
    pub reason: Option<String>,
    pub duration_ms: Option<u64>,
    pub delay_ms: Option<u64>,
    pub at: SystemTime,
}

impl RunEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            task: None,
            reason: None,
            duration_ms: None,
            delay_ms: None,
            at: SystemTime::now(),
        }
    }

    pub fn with_task(mut self, task: impl Into<TaskName>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }
}
