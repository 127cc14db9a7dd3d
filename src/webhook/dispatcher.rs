//! Event dispatch
//!
//! Classifies every messaging entry of a webhook delivery and hands it to
//! the hook registered for its kind.
//!
//! # Architecture
//!
//! ```text
//! Webhook body
//!       |
//!       v
//! [Parse envelope] --> invalid JSON --> InvalidPayload
//!       |
//!       v
//! for each messaging entry, in arrival order:
//!       |
//!       v
//! [Classify] --> no discriminator --> UnrecognizedEvent (stop)
//!       |
//!       v
//! [Lookup hook] --> none --> warn + ignore
//!       |
//!       v
//! [Run hook] --> error --> Error::Hook (stop)
//! ```
//!
//! Delivery is fail-fast: the first classification or hook error ends the
//! walk and entries after it are not dispatched.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::webhook::classifier::classify;
use crate::webhook::events::{EventKind, IncomingEvent, WebhookEnvelope};
use crate::webhook::hooks::HookRegistry;

/// What happened to a dispatched event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A hook ran and succeeded
    Handled,
    /// No hook was registered for the kind
    Ignored,
}

/// Counts for one webhook delivery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveSummary {
    /// Entries a hook handled
    pub handled: usize,
    /// Entries with no registered hook
    pub ignored: usize,
}

impl ReceiveSummary {
    /// Entries processed in total
    pub fn total(&self) -> usize {
        self.handled + self.ignored
    }
}

/// Routes classified events to the hooks of a shared registry
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<HookRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this dispatcher reads from
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// Run the hook registered for `kind`, if any.
    ///
    /// A missing hook is not an error: deployments routinely ignore kinds
    /// they never subscribed to. A hook error is returned as [`Error::Hook`]
    /// carrying the original `anyhow::Error`.
    pub async fn dispatch(
        &self,
        kind: EventKind,
        event: &IncomingEvent,
    ) -> Result<DispatchOutcome> {
        let Some(hook) = self.registry.get(kind) else {
            warn!(kind = %kind, "Ignoring event (no hook registered)");
            return Ok(DispatchOutcome::Ignored);
        };

        hook.call(event).await.map_err(Error::hook)?;
        debug!(kind = %kind, sender = ?event.sender_id(), "Event handled");
        Ok(DispatchOutcome::Handled)
    }

    /// Classify and dispatch every messaging entry of `envelope`, front to back.
    #[instrument(
        skip_all,
        fields(delivery_id = %Uuid::new_v4(), entries = envelope.messaging_len())
    )]
    pub async fn receive(&self, envelope: WebhookEnvelope) -> Result<ReceiveSummary> {
        let mut summary = ReceiveSummary::default();

        for (index, entry) in envelope.into_messaging().enumerate() {
            let (kind, event) = classify(entry).map_err(|e| {
                warn!(index, error = %e, "Failed to classify messaging entry");
                e
            })?;

            match self.dispatch(kind, &event).await {
                Ok(DispatchOutcome::Handled) => summary.handled += 1,
                Ok(DispatchOutcome::Ignored) => summary.ignored += 1,
                Err(e) => {
                    warn!(index, kind = %kind, error = %e, "Hook failed");
                    return Err(e);
                }
            }
        }

        info!(
            handled = summary.handled,
            ignored = summary.ignored,
            "Webhook delivery processed"
        );
        Ok(summary)
    }

    /// Parse a raw webhook body and [`receive`](Self::receive) it
    pub async fn receive_bytes(&self, body: &[u8]) -> Result<ReceiveSummary> {
        let envelope = WebhookEnvelope::from_bytes(body)?;
        self.receive(envelope).await
    }
}
