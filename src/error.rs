//! Error types for messenger-hooks
//!
//! This module provides the error type hierarchy using `thiserror`. The
//! vendor error shape (`{"error": {...}}`) returned by the Graph API is
//! recognised here as well, so every outbound call shares one conversion.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The main error type for messenger-hooks operations
#[derive(Error, Debug)]
pub enum Error {
    /// Webhook classification and registration errors
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Pagination invariant violations
    #[error("Pagination error: {0}")]
    Pagination(#[from] PaginationError),

    /// Transport-level failures (timeouts, connection errors, bad bodies)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The Graph API answered with an `error` object
    #[error("Graph API error: {0}")]
    Graph(#[from] GraphApiError),

    /// Error raised by a registered hook, passed through untouched
    #[error("Hook failed: {0}")]
    Hook(#[source] anyhow::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Webhook ingestion errors
#[derive(Error, Debug)]
pub enum WebhookError {
    /// No known discriminator key was present in the messaging entry
    #[error("Unrecognized event; entry keys: [{}]", keys.join(", "))]
    UnrecognizedEvent {
        /// Top-level keys found in the entry
        keys: Vec<String>,
    },

    /// Hook registration named an event kind outside the supported set
    #[error("{name} is not a valid event; available events are {available}")]
    InvalidEventKind {
        /// The rejected name
        name: String,
        /// Comma separated list of valid names
        available: String,
    },

    /// The payload matched a discriminator but its fields are malformed
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Pagination errors. Any of these aborts the walk and discards partial data.
#[derive(Error, Debug)]
pub enum PaginationError {
    /// A page did not carry the expected `data` array
    #[error("Malformed page {page}: {reason}")]
    MalformedPage {
        /// 1-based index of the offending page
        page: usize,
        /// What was wrong with it
        reason: String,
    },

    /// A continuation cursor pointed at a page already fetched
    #[error("Pagination loop: cursor {cursor} was already visited")]
    PaginationLoop {
        /// The repeated cursor
        cursor: String,
    },

    /// The walk exceeded the configured page ceiling
    #[error("Pagination exceeded the limit of {limit} pages")]
    PageLimitExceeded {
        /// Configured ceiling
        limit: usize,
    },
}

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request did not complete in time
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Connection or protocol failure
    #[error("Request failed: {0}")]
    Request(String),

    /// The response body was not JSON
    #[error("Invalid response body (HTTP {status}): {message}")]
    InvalidBody {
        /// HTTP status code
        status: u16,
        /// Parse failure
        message: String,
    },
}

impl From<reqwest::Error> for TransportError {
    /// The request URL carries the access token, so it never reaches the message.
    fn from(err: reqwest::Error) -> Self {
        TransportError::Request(err.without_url().to_string())
    }
}

/// Result type alias for messenger-hooks operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for classification and registration
pub type WebhookResult<T> = std::result::Result<T, WebhookError>;

impl Error {
    /// Wrap an error raised by a hook
    pub fn hook(err: anyhow::Error) -> Self {
        Error::Hook(err)
    }

    /// Create a configuration error from a string
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// True for both loop-guard failures of a pagination walk
    pub fn is_pagination_loop(&self) -> bool {
        matches!(
            self,
            Error::Pagination(
                PaginationError::PaginationLoop { .. } | PaginationError::PageLimitExceeded { .. }
            )
        )
    }

    /// The vendor error, if this is one
    pub fn as_graph(&self) -> Option<&GraphApiError> {
        match self {
            Error::Graph(err) => Some(err),
            _ => None,
        }
    }
}

// =============================================================================
// Vendor error shape
// =============================================================================

/// The `error` object the Graph API returns in place of a result.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message} (type: {error_type}, code: {code}, subcode: {error_subcode:?})")]
pub struct GraphApiError {
    /// Human readable message
    pub message: String,
    /// Error type, e.g. `OAuthException`
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Numeric error code
    pub code: i64,
    /// Optional finer-grained code
    #[serde(default)]
    pub error_subcode: Option<i64>,
    /// Trace id for vendor support
    #[serde(default)]
    pub fbtrace_id: Option<String>,
}

/// Coarse classification of vendor error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Platform-side failure, usually transient
    Internal,
    /// Invalid or expired access token
    AccessToken,
    /// Account linking failure
    AccountLinking,
    /// Rate or policy limit reached
    Limit,
    /// A request parameter was rejected
    BadParameter,
    /// The app or page lacks a permission
    Permission,
    /// Anything else
    Other,
}

impl GraphApiError {
    /// Extract the vendor error from a response body, if there is one.
    ///
    /// A body with an `error` key that does not match the expected shape is
    /// still reported, with the raw value as the message.
    pub fn from_body(body: &Value) -> Option<Self> {
        let raw = body.get("error")?;
        Some(serde_json::from_value(raw.clone()).unwrap_or_else(|_| GraphApiError {
            message: raw.to_string(),
            error_type: String::new(),
            code: 0,
            error_subcode: None,
            fbtrace_id: None,
        }))
    }

    /// Map code and subcode onto an [`ErrorCategory`]
    pub fn category(&self) -> ErrorCategory {
        match (self.code, self.error_subcode) {
            (1200, _) => ErrorCategory::Internal,
            (190, _) => ErrorCategory::AccessToken,
            (10303, _) => ErrorCategory::AccountLinking,
            (4, Some(2_018_022)) | (100, Some(2_018_109)) | (613, None) => ErrorCategory::Limit,
            (100, None) | (100, Some(2_018_001)) => ErrorCategory::BadParameter,
            (10, Some(2_018_065 | 2_018_108))
            | (200, Some(1_545_041 | 2_018_028 | 2_018_027 | 2_018_021))
            | (230, None) => ErrorCategory::Permission,
            _ => ErrorCategory::Other,
        }
    }
}
