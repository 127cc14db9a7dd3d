//! Graph API module
//!
//! Outbound side of the binding: a [`GraphClient`] over a pluggable
//! [`Transport`], with per-operation-class timeouts, vendor error detection
//! and cursor-following pagination.

pub mod client;
pub mod config;
pub mod pagination;
pub mod transport;

pub use client::{CustomLabel, GraphClient};
pub use config::{GraphConfig, OperationClass, DEFAULT_API_ROOT};
pub use pagination::fetch_all;
pub use transport::{ReqwestTransport, Transport};
