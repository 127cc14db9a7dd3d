//! messenger-hooks - Messenger Platform webhooks and Graph API pagination
//!
//! This crate implements the two stateful pieces of a Messenger Platform
//! binding:
//!
//! # Features
//!
//! - **Webhook ingestion**: classify each messaging entry into one typed event
//!   and dispatch it to the hook registered for its kind
//! - **HTTP receiver**: axum routes for the subscription handshake and deliveries
//! - **Pagination**: drain cursor-paged list endpoints into one ordered `Vec`
//! - **Vendor errors**: typed `GraphApiError` for every `{"error": {...}}` body
//!
//! # Architecture
//!
//! ```text
//! Platform ──▶ POST /webhook ──▶ classify ──▶ HookRegistry ──▶ Hook
//!
//! Caller ──▶ GraphClient::fetch_all ──▶ Transport (GET page 1..n)
//!                                          │
//!                                          ▼
//!                               error check + cursor walk
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use messenger_hooks::graph::{GraphClient, GraphConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GraphClient::new(GraphConfig::from_env()?)?;
//!     let labels = client.list_labels("PAGE_ACCESS_TOKEN").await?;
//!
//!     println!("{} labels", labels.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod graph;
pub mod webhook;

// Re-exports for convenience
pub use error::{Error, ErrorCategory, GraphApiError, Result};
pub use graph::{GraphClient, GraphConfig};
pub use webhook::{Dispatcher, EventKind, HookRegistry, IncomingEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
