//! Webhook receiver configuration

use crate::error::{Error, Result};

/// Environment variable holding the subscription verify token
pub const VERIFY_TOKEN_ENV_VAR: &str = "MESSENGER_VERIFY_TOKEN";

/// Configuration of the HTTP webhook receiver
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Token the platform echoes during the subscription handshake.
    /// When `None`, every handshake is refused.
    pub verify_token: Option<String>,
    /// Route the receiver is mounted on
    pub path: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            verify_token: None,
            path: "/webhook".to_string(),
        }
    }
}

impl WebhookConfig {
    /// Load from the environment.
    ///
    /// Fails when `MESSENGER_VERIFY_TOKEN` is set but empty.
    pub fn from_env() -> Result<Self> {
        let verify_token = match std::env::var(VERIFY_TOKEN_ENV_VAR) {
            Ok(token) if token.is_empty() => {
                return Err(Error::config(format!("{VERIFY_TOKEN_ENV_VAR} is empty")))
            }
            Ok(token) => Some(token),
            Err(_) => None,
        };

        Ok(Self {
            verify_token,
            ..Self::default()
        })
    }

    /// Set the verify token
    pub fn with_verify_token(mut self, token: impl Into<String>) -> Self {
        self.verify_token = Some(token.into());
        self
    }

    /// Mount the receiver on a different route
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}
