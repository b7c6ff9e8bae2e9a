use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metric registration failed: {0}")]
    Register(#[from] prometheus::Error),
    #[error("metrics output is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}
