//! Echo bot
//!
//! Serves the webhook receiver and replies to every text message with the
//! same text. Configure with:
//!
//! - `MESSENGER_VERIFY_TOKEN`: token entered in the app dashboard
//! - `MESSENGER_PAGE_TOKEN`: page access token used for replies
//! - `MESSENGER_API_ROOT` (optional): Graph API root
//!
//! ```text
//! cargo run --example echo-bot
//! ```

use std::sync::Arc;

use messenger_hooks::graph::{GraphClient, GraphConfig};
use messenger_hooks::webhook::{
    webhook_router, EventKind, HookRegistry, WebhookConfig, WebhookState,
};
use messenger_hooks::IncomingEvent;
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let page_token = std::env::var("MESSENGER_PAGE_TOKEN")?;
    let client = GraphClient::new(GraphConfig::from_env()?)?;

    let labels = client.list_labels(&page_token).await?;
    tracing::info!(labels = labels.len(), "Page labels loaded");

    let registry = Arc::new(HookRegistry::new());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<(String, String)>();
    registry.on(EventKind::Message, move |event| {
        if let IncomingEvent::Message(message) = event {
            if let (Some(sender), Some(text)) = (message.sender_id(), message.text()) {
                tx.send((sender.to_string(), text.to_string()))?;
            }
        }
        Ok(())
    });

    tokio::spawn(async move {
        while let Some((recipient, text)) = rx.recv().await {
            let reply = json!({
                "recipient": {"id": recipient},
                "messaging_type": "RESPONSE",
                "message": {"text": text},
            });
            if let Err(e) = client.deliver(&reply, &page_token).await {
                tracing::warn!(error = %e, "Reply failed");
            }
        }
    });

    let state = WebhookState::new(WebhookConfig::from_env()?, registry);
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("Echo bot listening on {}", listener.local_addr()?);
    axum::serve(listener, webhook_router(Arc::new(state))).await?;
    Ok(())
}
