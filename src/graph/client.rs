//! Graph API client
//!
//! Thin request/response glue over a [`Transport`]: every response body is
//! checked for the vendor error shape before it reaches the caller.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use crate::error::{GraphApiError, Result};
use crate::graph::config::{GraphConfig, OperationClass};
use crate::graph::pagination::{self, resolve, with_access_token};
use crate::graph::transport::{ReqwestTransport, Transport};

/// A custom label as returned by the label list endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomLabel {
    /// Label id
    pub id: String,
    /// Label name, present when requested through `fields=name`
    #[serde(default)]
    pub name: Option<String>,
}

/// Client for the Messenger Graph API endpoints
#[derive(Clone)]
pub struct GraphClient {
    transport: Arc<dyn Transport>,
    config: GraphConfig,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GraphClient {
    /// Create a client using `reqwest`
    pub fn new(config: GraphConfig) -> Result<Self> {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()))
    }

    /// Create a client over a custom transport
    pub fn with_transport(config: GraphConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        Ok(Self { transport, config })
    }

    /// The active configuration
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Fetch every page of a list endpoint. See [`pagination::fetch_all`].
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<Vec<T>> {
        pagination::fetch_all(self.transport.as_ref(), &self.config, path, access_token).await
    }

    /// Deliver a message through the Send API.
    ///
    /// `message` is the full request body (`recipient`, `message`,
    /// `messaging_type`, ...). Uses the send timeout. Returns the response
    /// body, which carries `recipient_id` and `message_id`.
    #[instrument(skip(self, message, access_token))]
    pub async fn deliver(&self, message: &Value, access_token: &str) -> Result<Value> {
        let body = self
            .post("/me/messages", message, access_token, OperationClass::Send)
            .await?;
        info!(message_id = ?body.get("message_id"), "Message delivered");
        Ok(body)
    }

    /// Upload an attachment for reuse through the Attachment Upload API.
    ///
    /// `message` carries the attachment (`{"message": {"attachment": ...}}`).
    /// Uses the send timeout. The response body carries `attachment_id`.
    #[instrument(skip(self, message, access_token))]
    pub async fn upload(&self, message: &Value, access_token: &str) -> Result<Value> {
        let body = self
            .post("/me/message_attachments", message, access_token, OperationClass::Send)
            .await?;
        info!(attachment_id = ?body.get("attachment_id"), "Attachment uploaded");
        Ok(body)
    }

    /// List the page's custom labels
    pub async fn list_labels(&self, access_token: &str) -> Result<Vec<CustomLabel>> {
        self.fetch_all("/me/custom_labels?fields=name", access_token).await
    }

    /// List the custom labels attached to a user
    pub async fn list_user_labels(
        &self,
        user_psid: &str,
        access_token: &str,
    ) -> Result<Vec<CustomLabel>> {
        self.fetch_all(&format!("/{user_psid}/custom_labels?fields=name"), access_token)
            .await
    }

    async fn post(
        &self,
        path: &str,
        body: &Value,
        access_token: &str,
        class: OperationClass,
    ) -> Result<Value> {
        let url = with_access_token(resolve(&self.config, path)?, access_token);
        let response = self
            .transport
            .post(url, body, self.config.timeout_for(class))
            .await?;
        match GraphApiError::from_body(&response) {
            Some(err) => Err(err.into()),
            None => Ok(response),
        }
    }
}
