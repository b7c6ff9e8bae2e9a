use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use crate::{error::CoreError, probe::Probe};

/// Reachability check by HTTP GET.
///
/// Any response below 500 counts as reachable; transport errors, timeouts and 5xx do not.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Http(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(resp) => {
                let status = resp.status();
                trace!(url = %self.url, %status, "connectivity probe answered");
                !status.is_server_error()
            }
            Err(e) => {
                trace!(url = %self.url, error = %e, "connectivity probe failed");
                false
            }
        }
    }
}
