use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::header,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use warden_core::RequestTracker;

use crate::{error::ApiError, handler::HealthHandler};

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
    tracker: RequestTracker,
}

impl<H> HttpApi<H>
where
    H: HealthHandler,
{
    /// Every request served by the router is counted on `tracker` while it runs.
    pub fn new(handler: Arc<H>, tracker: RequestTracker) -> Self {
        Self { handler, tracker }
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - GET /health - Process and task health
    /// - GET /metrics - Prometheus text exposition
    pub fn router(self) -> Router {
        Router::new()
            .route("/health", get(health::<H>))
            .route("/metrics", get(metrics::<H>))
            .with_state(self.handler)
            .layer(middleware::from_fn_with_state(self.tracker, track_in_flight))
    }
}

/// Serve `router` until `accept` is cancelled.
///
/// Cancellation only stops accepting new connections; requests already in flight run to
/// completion (or until the process exits).
pub async fn serve(
    listener: TcpListener,
    router: Router,
    accept: CancellationToken,
) -> Result<(), ApiError> {
    let addr = listener.local_addr()?;
    info!(%addr, "http server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(accept.cancelled_owned())
        .await?;

    info!(%addr, "http server stopped");
    Ok(())
}

// ============================================================================
// Middleware
// ============================================================================

async fn track_in_flight(
    State(tracker): State<RequestTracker>,
    req: Request,
    next: Next,
) -> Response {
    let _guard = tracker.enter();
    next.run(req).await
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
async fn health<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: HealthHandler,
{
    let report = handler.health().await?;
    Ok(Json(report))
}

/// GET /metrics
async fn metrics<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: HealthHandler,
{
    let page = handler
        .metrics()
        .await?
        .ok_or_else(|| ApiError::NotFound("metrics are not collected".into()))?;
    Ok(([(header::CONTENT_TYPE, page.content_type)], page.body))
}
