use tracing::{debug, error, info, trace, warn};
use warden_model::{EventKind, RunEvent};

#[inline]
pub fn message_for(kind: EventKind) -> &'static str {
    match kind {
        // scheduler
        EventKind::SchedulerStarted => "scheduler started; all task timers armed",
        EventKind::SchedulerStopped => "scheduler stopped; all task timers cancelled",
        EventKind::TaskScheduled => "task scheduled",

        // runner
        EventKind::TaskStarting => "task run starting",
        EventKind::TaskSucceeded => "task run succeeded",
        EventKind::TaskFailed => "task run failed (will retry at next tick)",
        EventKind::TaskSkipped => "tick skipped; previous run still in flight",

        // connectivity
        EventKind::ProbeFailed => "connectivity probe failed",
        EventKind::Online => "connectivity established",

        // shutdown
        EventKind::ShutdownRequested => "shutdown requested",
        EventKind::DrainCompleted => "all in-flight requests drained",
        EventKind::GraceExceeded => "drain timeout exceeded; requests abandoned",
        EventKind::ResourceReleaseFailed => "failed to release a shared resource",
        EventKind::Exited => "shutdown sequence complete",
    }
}

#[inline]
pub fn log_event(e: &RunEvent) {
    let msg = message_for(e.kind);
    let task = e.task.as_deref().unwrap_or("-");
    let reason = e.reason.as_deref().unwrap_or("unknown");

    match e.kind {
        EventKind::SchedulerStarted | EventKind::SchedulerStopped => debug!("{msg}"),
        EventKind::TaskScheduled => {
            debug!(task, initial_delay_ms = e.delay_ms.unwrap_or(0), "{msg}")
        }

        EventKind::TaskStarting => trace!(task, "{msg}"),
        EventKind::TaskSucceeded => {
            debug!(task, duration_ms = e.duration_ms.unwrap_or(0), "{msg}")
        }
        EventKind::TaskFailed => error!(
            task,
            duration_ms = e.duration_ms.unwrap_or(0),
            reason,
            "{msg}"
        ),
        EventKind::TaskSkipped => debug!(task, "{msg}"),

        EventKind::ProbeFailed => debug!("{msg}"),
        EventKind::Online => info!("{msg}"),

        EventKind::ShutdownRequested => info!("{msg}"),
        EventKind::DrainCompleted => info!("{msg}"),
        EventKind::GraceExceeded => warn!(reason, "{msg}"),
        EventKind::ResourceReleaseFailed => error!(reason, "{msg}"),
        EventKind::Exited => info!(elapsed_ms = e.duration_ms.unwrap_or(0), "{msg}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io,
        sync::{Arc, Mutex},
    };
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(event: &RunEvent) -> String {
        let buf = Buffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buf.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        tracing::subscriber::with_default(subscriber, || log_event(event));
        String::from_utf8(buf.0.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn failed_run_logs_task_and_reason_at_error() {
        let line = capture(
            &RunEvent::new(EventKind::TaskFailed)
                .with_task("weather")
                .with_reason("upstream 503")
                .with_duration_ms(84),
        );

        assert!(line.contains("ERROR"));
        assert!(line.contains("task=\"weather\""));
        assert!(line.contains("reason=\"upstream 503\""));
        assert!(line.contains("duration_ms=84"));
    }

    #[test]
    fn skipped_tick_is_logged_at_debug() {
        let line = capture(&RunEvent::new(EventKind::TaskSkipped).with_task("news"));
        assert!(line.contains("DEBUG"));
        assert!(!line.contains("WARN"));
        assert!(line.contains(message_for(EventKind::TaskSkipped)));
    }
}
