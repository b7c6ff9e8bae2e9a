mod error;
pub use error::ApiError;

mod handler;
pub use handler::{HealthHandler, MetricsPage};

mod adapter;
pub use adapter::SupervisorHealthAdapter;

mod http;
pub use http::{HttpApi, serve};

pub use axum;
