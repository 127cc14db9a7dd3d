//! Hook registry
//!
//! Maps each [`EventKind`] to at most one handler. The registry is an
//! ordinary value owned by whoever hosts the webhook and shared through an
//! `Arc`; registrations and lookups go through a read-mostly lock that is
//! never held while a hook runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::WebhookResult;
use crate::webhook::events::{EventKind, IncomingEvent};

/// Handler invoked for a classified event
#[async_trait::async_trait]
pub trait Hook: Send + Sync + 'static {
    /// Handle one event. Errors are returned to the dispatch caller unchanged.
    async fn call(&self, event: &IncomingEvent) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
impl<F> Hook for F
where
    F: Fn(&IncomingEvent) -> anyhow::Result<()> + Send + Sync + 'static,
{
    async fn call(&self, event: &IncomingEvent) -> anyhow::Result<()> {
        (self)(event)
    }
}

/// Table of registered hooks
#[derive(Default)]
pub struct HookRegistry {
    hooks: RwLock<HashMap<EventKind, Arc<dyn Hook>>>,
}

impl HookRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook` for `kind`, replacing any previous registration
    pub fn register<H: Hook>(&self, kind: EventKind, hook: H) {
        self.register_arc(kind, Arc::new(hook));
    }

    /// Register a synchronous closure for `kind`.
    ///
    /// ```rust,ignore
    /// registry.on(EventKind::Message, |event| {
    ///     tracing::info!(sender = ?event.sender_id(), "got a message");
    ///     Ok(())
    /// });
    /// ```
    pub fn on<F>(&self, kind: EventKind, f: F)
    where
        F: Fn(&IncomingEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(kind, f);
    }

    /// Register an already shared hook
    pub fn register_arc(&self, kind: EventKind, hook: Arc<dyn Hook>) {
        let replaced = self.hooks.write().insert(kind, hook).is_some();
        debug!(kind = %kind, replaced, "Hook registered");
    }

    /// Register by event name, e.g. `"message"` or `"account_linking"`.
    ///
    /// Unknown names are rejected with `InvalidEventKind` and leave the
    /// registry untouched.
    pub fn register_named<H: Hook>(&self, name: &str, hook: H) -> WebhookResult<()> {
        let kind = name.parse::<EventKind>()?;
        self.register(kind, hook);
        Ok(())
    }

    /// Look up the hook for `kind`. The returned handle outlives a later `clear`.
    pub fn get(&self, kind: EventKind) -> Option<Arc<dyn Hook>> {
        self.hooks.read().get(&kind).cloned()
    }

    /// Whether a hook is registered for `kind`
    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.hooks.read().contains_key(&kind)
    }

    /// Registered kinds, in [`EventKind::ALL`] order
    pub fn hooks_registered(&self) -> Vec<EventKind> {
        let hooks = self.hooks.read();
        EventKind::ALL
            .into_iter()
            .filter(|kind| hooks.contains_key(kind))
            .collect()
    }

    /// Number of registered hooks
    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    /// Whether no hook is registered
    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    /// Deregister all hooks
    pub fn clear(&self) {
        let mut hooks = self.hooks.write();
        let removed = hooks.len();
        hooks.clear();
        debug!(removed, "Hooks cleared");
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("kinds", &self.hooks_registered())
            .finish()
    }
}
