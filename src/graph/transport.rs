//! HTTP transport
//!
//! The Graph API reports failures with a JSON body (and a 4xx status), so a
//! transport hands back the parsed body whatever the status; the caller
//! decides whether it is an error. Retries, if any, belong in a `Transport`
//! implementation, not in the callers.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::error::TransportError;

/// Outbound JSON transport
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// GET `url` and parse the JSON body
    async fn get(&self, url: Url, timeout: Duration) -> Result<Value, TransportError>;

    /// POST `body` as JSON to `url` and parse the JSON response
    async fn post(
        &self,
        url: Url,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value, TransportError>;
}

/// [`Transport`] backed by `reqwest`
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a fresh connection pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_error(e, timeout))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_error(e, timeout))?;
        debug!(status = status.as_u16(), bytes = bytes.len(), "Response received");

        serde_json::from_slice(&bytes).map_err(|e| TransportError::InvalidBody {
            status: status.as_u16(),
            message: e.to_string(),
        })
    }
}

fn classify_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout.as_millis() as u64)
    } else {
        TransportError::from(err)
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, url), fields(path = url.path()))]
    async fn get(&self, url: Url, timeout: Duration) -> Result<Value, TransportError> {
        self.send(self.client.get(url), timeout).await
    }

    #[instrument(skip(self, url, body), fields(path = url.path()))]
    async fn post(
        &self,
        url: Url,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        self.send(self.client.post(url).json(body), timeout).await
    }
}
