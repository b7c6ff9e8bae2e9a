use async_trait::async_trait;
use warden_core::HealthReporter;
use warden_model::HealthReport;

use crate::{
    error::ApiError,
    handler::{HealthHandler, MetricsPage},
};

/// Serves health straight from a [`HealthReporter`], and metrics from Prometheus when attached.
pub struct SupervisorHealthAdapter {
    reporter: HealthReporter,
    #[cfg(feature = "prometheus")]
    metrics: Option<warden_prometheus::PrometheusMetrics>,
}

impl SupervisorHealthAdapter {
    pub fn new(reporter: HealthReporter) -> Self {
        Self {
            reporter,
            #[cfg(feature = "prometheus")]
            metrics: None,
        }
    }

    #[cfg(feature = "prometheus")]
    pub fn with_metrics(mut self, metrics: warden_prometheus::PrometheusMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[async_trait]
impl HealthHandler for SupervisorHealthAdapter {
    async fn health(&self) -> Result<HealthReport, ApiError> {
        Ok(self.reporter.report())
    }

    #[cfg(feature = "prometheus")]
    async fn metrics(&self) -> Result<Option<MetricsPage>, ApiError> {
        let Some(metrics) = &self.metrics else {
            return Ok(None);
        };
        let body = metrics
            .encode_text()
            .map_err(|e| ApiError::Metrics(e.to_string()))?;
        Ok(Some(MetricsPage {
            content_type: metrics.content_type(),
            body,
        }))
    }
}
