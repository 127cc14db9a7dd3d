//! HTTP receiver for Messenger webhooks.
//!
//! ```text
//! GET  /webhook  -> subscription handshake (hub.challenge echo)
//! POST /webhook  -> Dispatcher::receive_bytes
//!                     ok                      -> 200 EVENT_RECEIVED
//!                     invalid / unrecognized  -> 400
//!                     hook failure            -> 500
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::webhook::config::WebhookConfig;
use crate::webhook::dispatcher::Dispatcher;
use crate::webhook::hooks::HookRegistry;

/// Body returned for every accepted delivery
pub const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

/// Shared state of the webhook routes
#[derive(Debug, Clone)]
pub struct WebhookState {
    config: WebhookConfig,
    dispatcher: Dispatcher,
}

impl WebhookState {
    /// Build the state from a config and a shared registry
    pub fn new(config: WebhookConfig, registry: Arc<HookRegistry>) -> Self {
        Self {
            config,
            dispatcher: Dispatcher::new(registry),
        }
    }

    /// The dispatcher behind the POST route
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

/// Build the webhook router, mounted on `config.path`
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    let path = state.config.path.clone();
    Router::new()
        .route(&path, get(verify_subscription).post(receive_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Subscription handshake: echo `hub.challenge` when the verify token matches
pub async fn verify_subscription(
    State(state): State<Arc<WebhookState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge").cloned().unwrap_or_default();

    match (mode, token, state.config.verify_token.as_deref()) {
        (Some("subscribe"), Some(given), Some(expected))
            if constant_time_eq(given.as_bytes(), expected.as_bytes()) =>
        {
            info!("Webhook subscription verified");
            (StatusCode::OK, challenge)
        }
        _ => {
            warn!(mode = ?mode, "Rejected webhook subscription handshake");
            (StatusCode::FORBIDDEN, String::new())
        }
    }
}

/// Compare tokens without short-circuiting on the first differing byte
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Receive one delivery and dispatch its entries
pub async fn receive_webhook(
    State(state): State<Arc<WebhookState>>,
    body: Bytes,
) -> impl IntoResponse {
    match state.dispatcher.receive_bytes(&body).await {
        Ok(_) => (StatusCode::OK, EVENT_RECEIVED.to_string()),
        Err(Error::Webhook(e)) => {
            warn!(error = %e, "Rejected webhook delivery");
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            error!(error = %e, "Webhook delivery failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "hook failed".to_string())
        }
    }
}
