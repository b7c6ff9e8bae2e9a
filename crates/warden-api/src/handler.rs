use async_trait::async_trait;
use warden_model::HealthReport;

use crate::error::ApiError;

/// Backend behind the HTTP surface.
///
/// [`SupervisorHealthAdapter`](crate::SupervisorHealthAdapter) is the stock implementation; a
/// custom one can wrap it to add checks of its own.
#[async_trait]
pub trait HealthHandler: Send + Sync + 'static {
    /// Current health of the process and every task.
    async fn health(&self) -> Result<HealthReport, ApiError>;

    /// Rendered metrics, or `None` when metrics are not collected.
    async fn metrics(&self) -> Result<Option<MetricsPage>, ApiError> {
        Ok(None)
    }
}

/// A rendered metrics page and the media type its encoder produced.
#[derive(Debug, Clone)]
pub struct MetricsPage {
    pub content_type: &'static str,
    pub body: String,
}
