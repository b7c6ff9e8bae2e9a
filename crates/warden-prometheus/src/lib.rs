//! Prometheus metrics for the warden task supervisor.
//!
//! [`PrometheusMetrics`] is an event subscriber: register it on the core
//! [`EventBus`](warden_core::EventBus) and it keeps per-task counters and run durations.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use warden_core::{EventBus, Subscribe};
//! use warden_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let bus = EventBus::new(vec![Arc::new(metrics.clone()) as Arc<dyn Subscribe>]);
//! # let _ = bus;
//!
//! // Serve `metrics.encode_text()?` from your `/metrics` handler.
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `warden_task_runs_started_total{task}` - Counter
//! - `warden_task_runs_completed_total{task, outcome}` - Counter, `outcome` is `success` or `failure`
//! - `warden_task_runs_skipped_total{task}` - Counter
//! - `warden_task_run_duration_seconds{task}` - Histogram

mod backend;
pub use backend::PrometheusMetrics;

mod error;
pub use error::MetricsError;

pub use prometheus::{Encoder, Registry, TextEncoder};
