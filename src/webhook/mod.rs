//! Messenger Webhook Module
//!
//! Ingestion side of the Messenger Platform:
//!
//! - **Classification**: every messaging entry maps onto exactly one
//!   [`EventKind`] and a typed [`IncomingEvent`], or fails loudly
//! - **Hooks**: a [`HookRegistry`] owned by the host maps each kind to one handler
//! - **Dispatch**: entries of a delivery run in arrival order, fail-fast
//! - **HTTP**: an axum router for the subscription handshake and deliveries
//!
//! # Architecture
//!
//! ```text
//! POST /webhook -> WebhookEnvelope -> classify -> (EventKind, IncomingEvent)
//!                                                        |
//!                                                        v
//!                                          HookRegistry lookup -> Hook::call
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use messenger_hooks::webhook::{
//!     webhook_router, EventKind, HookRegistry, WebhookConfig, WebhookState,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Arc::new(HookRegistry::new());
//!     registry.on(EventKind::Message, |event| {
//!         tracing::info!(sender = ?event.sender_id(), "Message received");
//!         Ok(())
//!     });
//!
//!     let state = WebhookState::new(WebhookConfig::from_env()?, registry);
//!     let app = webhook_router(Arc::new(state));
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod events;
pub mod handler;
pub mod hooks;

pub use classifier::{classify, detect_kind};
pub use config::WebhookConfig;
pub use dispatcher::{DispatchOutcome, Dispatcher, ReceiveSummary};
pub use events::{
    Event, EventKind, IncomingEvent, MessagingEntry, Participant, ReactionAction, WebhookEnvelope,
};
pub use handler::{webhook_router, WebhookState, EVENT_RECEIVED};
pub use hooks::{Hook, HookRegistry};
