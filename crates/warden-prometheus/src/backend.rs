use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};
use warden_core::Subscribe;
use warden_model::{EventKind, RunEvent};

use crate::error::MetricsError;

const OUTCOME_SUCCESS: &str = "success";
const OUTCOME_FAILURE: &str = "failure";

/// Prometheus-backed run metrics. Clones share one registry.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    started: IntCounterVec,
    completed: IntCounterVec,
    skipped: IntCounterVec,
    duration: HistogramVec,
}

impl PrometheusMetrics {
    /// Create metrics on a fresh registry.
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_registry(Registry::new())
    }

    /// Register the run metrics on an existing registry.
    pub fn with_registry(registry: Registry) -> Result<Self, MetricsError> {
        let started = IntCounterVec::new(
            Opts::new("warden_task_runs_started_total", "Task runs started"),
            &["task"],
        )?;
        let completed = IntCounterVec::new(
            Opts::new("warden_task_runs_completed_total", "Task runs completed by outcome"),
            &["task", "outcome"],
        )?;
        let skipped = IntCounterVec::new(
            Opts::new(
                "warden_task_runs_skipped_total",
                "Ticks skipped because the previous run was still in flight",
            ),
            &["task"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new("warden_task_run_duration_seconds", "Task run duration")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["task"],
        )?;

        registry.register(Box::new(started.clone()))?;
        registry.register(Box::new(completed.clone()))?;
        registry.register(Box::new(skipped.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            started,
            completed,
            skipped,
            duration,
        })
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Media type of [`encode_text`](Self::encode_text) output.
    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }

    fn complete(&self, task: &str, outcome: &str, duration_ms: Option<u64>) {
        self.completed.with_label_values(&[task, outcome]).inc();
        if let Some(ms) = duration_ms {
            self.duration
                .with_label_values(&[task])
                .observe(ms as f64 / 1000.0);
        }
    }
}

impl Subscribe for PrometheusMetrics {
    fn on_event(&self, event: &RunEvent) {
        let Some(task) = event.task.as_deref() else {
            return;
        };
        match event.kind {
            EventKind::TaskStarting => self.started.with_label_values(&[task]).inc(),
            EventKind::TaskSucceeded => self.complete(task, OUTCOME_SUCCESS, event.duration_ms),
            EventKind::TaskFailed => self.complete(task, OUTCOME_FAILURE, event.duration_ms),
            EventKind::TaskSkipped => self.skipped.with_label_values(&[task]).inc(),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "prometheus"
    }
}
