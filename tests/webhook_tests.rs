//! Webhook ingestion integration tests
//!
//! These tests drive full deliveries through the public API: envelope
//! parsing, classification, hook registration and dispatch.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use messenger_hooks::error::{Error, WebhookError};
use messenger_hooks::webhook::{
    classify, DispatchOutcome, Dispatcher, EventKind, Hook, HookRegistry, IncomingEvent,
    MessagingEntry, ReceiveSummary, WebhookEnvelope,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

/// Hook that records the kind and sender of every event it sees
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(EventKind, Option<String>)>>,
}

#[async_trait::async_trait]
impl Hook for Recorder {
    async fn call(&self, event: &IncomingEvent) -> anyhow::Result<()> {
        self.seen
            .lock()
            .push((event.kind(), event.sender_id().map(str::to_string)));
        Ok(())
    }
}

fn messaging(sender: &str, body: Value) -> Value {
    let mut entry = json!({
        "sender": {"id": sender},
        "recipient": {"id": "PAGE_ID"},
        "timestamp": 1458692752478_i64
    });
    if let (Some(entry), Value::Object(body)) = (entry.as_object_mut(), body) {
        entry.extend(body);
    }
    entry
}

fn envelope(entries: Vec<Vec<Value>>) -> WebhookEnvelope {
    let entry: Vec<Value> = entries
        .into_iter()
        .map(|messaging| {
            json!({"id": "PAGE_ID", "time": 1458692752478_i64, "messaging": messaging})
        })
        .collect();
    serde_json::from_value(json!({"object": "page", "entry": entry})).unwrap()
}

fn recording_dispatcher(kinds: &[EventKind]) -> (Dispatcher, Arc<Recorder>) {
    let registry = Arc::new(HookRegistry::new());
    let recorder = Arc::new(Recorder::default());
    for kind in kinds {
        registry.register_arc(*kind, recorder.clone());
    }
    (Dispatcher::new(registry), recorder)
}

#[tokio::test]
async fn test_register_then_dispatch_invokes_once() {
    let registry = Arc::new(HookRegistry::new());
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    registry.on(EventKind::Read, move |event| {
        assert_eq!(event.kind(), EventKind::Read);
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let dispatcher = Dispatcher::new(registry);

    let entry =
        MessagingEntry::from_value(messaging("USER", json!({"read": {"watermark": 7}}))).unwrap();
    let (kind, event) = classify(entry).unwrap();

    let outcome = dispatcher.dispatch(kind, &event).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::Handled);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dispatch_without_hook_is_noop() {
    let dispatcher = Dispatcher::new(Arc::new(HookRegistry::new()));
    let entry =
        MessagingEntry::from_value(messaging("USER", json!({"read": {"watermark": 7}}))).unwrap();
    let (kind, event) = classify(entry).unwrap();

    let outcome = dispatcher.dispatch(kind, &event).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::Ignored);
}

#[tokio::test]
async fn test_clear_makes_dispatch_noop() {
    let (dispatcher, recorder) = recording_dispatcher(&[EventKind::Message, EventKind::Postback]);
    dispatcher.registry().clear();

    let summary = dispatcher
        .receive(envelope(vec![vec![
            messaging("USER", json!({"message": {"mid": "m_1", "text": "hi"}})),
            messaging("USER", json!({"postback": {"payload": "START"}})),
        ]]))
        .await
        .unwrap();

    assert_eq!(
        summary,
        ReceiveSummary {
            handled: 0,
            ignored: 2
        }
    );
    assert!(recorder.seen.lock().is_empty());
}

#[tokio::test]
async fn test_entries_dispatched_in_arrival_order_across_page_entries() {
    let (dispatcher, recorder) = recording_dispatcher(&EventKind::ALL);

    let summary = dispatcher
        .receive(envelope(vec![
            vec![
                messaging("A", json!({"message": {"mid": "m_1", "text": "one"}})),
                messaging("B", json!({"delivery": {"mids": ["m_1"], "watermark": 1}})),
            ],
            vec![
                messaging(
                    "C",
                    json!({
                        "reaction": {
                            "reaction": "love",
                            "emoji": "\u{2764}",
                            "action": "react",
                            "mid": "m_1"
                        }
                    }),
                ),
                messaging("D", json!({"message": {"mid": "m_echo", "is_echo": true, "app_id": 1}})),
            ],
        ]))
        .await
        .unwrap();

    assert_eq!(summary.handled, 4);
    assert_eq!(
        *recorder.seen.lock(),
        vec![
            (EventKind::Message, Some("A".to_string())),
            (EventKind::Delivery, Some("B".to_string())),
            (EventKind::MessageReaction, Some("C".to_string())),
            (EventKind::MessageEcho, Some("D".to_string())),
        ]
    );
}

#[tokio::test]
async fn test_unrecognized_entry_stops_before_next() {
    let (dispatcher, recorder) = recording_dispatcher(&EventKind::ALL);

    let err = dispatcher
        .receive(envelope(vec![vec![
            messaging("USER", json!({"standby": [{"message": {"mid": "m_x"}}]})),
            messaging("USER", json!({"message": {"mid": "m_1", "text": "hi"}})),
        ]]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Webhook(WebhookError::UnrecognizedEvent { .. })
    ));
    assert!(recorder.seen.lock().is_empty());
}

#[tokio::test]
async fn test_handler_error_propagates_unmodified() {
    #[derive(Debug, thiserror::Error)]
    #[error("quota exceeded for {0}")]
    struct QuotaExceeded(String);

    let registry = Arc::new(HookRegistry::new());
    registry.on(EventKind::Message, |event| {
        Err(QuotaExceeded(event.sender_id().unwrap_or_default().to_string()).into())
    });
    let dispatcher = Dispatcher::new(registry);

    let err = dispatcher
        .receive(envelope(vec![vec![messaging(
            "USER",
            json!({"message": {"mid": "m_1", "text": "hi"}}),
        )]]))
        .await
        .unwrap_err();

    let inner = match err {
        Error::Hook(inner) => inner,
        other => panic!("expected a hook error, got {other:?}"),
    };
    let quota = inner.downcast_ref::<QuotaExceeded>().unwrap();
    assert_eq!(quota.0, "USER");
}

#[tokio::test]
async fn test_register_named_and_receive_bytes() {
    let registry = Arc::new(HookRegistry::new());
    let recorder = Arc::new(Recorder::default());
    registry
        .register_named("account_linking", RecorderHandle(recorder.clone()))
        .unwrap();
    assert!(registry
        .register_named("checkout_update", RecorderHandle(recorder.clone()))
        .is_err());

    let body = serde_json::to_vec(&json!({
        "object": "page",
        "entry": [{"id": "PAGE_ID", "time": 1, "messaging": [
            messaging("USER", json!({"account_linking": {"status": "unlinked"}}))
        ]}]
    }))
    .unwrap();

    let summary = Dispatcher::new(registry).receive_bytes(&body).await.unwrap();
    assert_eq!(summary.handled, 1);
    assert_eq!(
        *recorder.seen.lock(),
        vec![(EventKind::AccountLinking, Some("USER".to_string()))]
    );
}

/// Forwards to a shared recorder so one recorder can back several registrations
struct RecorderHandle(Arc<Recorder>);

#[async_trait::async_trait]
impl Hook for RecorderHandle {
    async fn call(&self, event: &IncomingEvent) -> anyhow::Result<()> {
        self.0.call(event).await
    }
}

#[tokio::test]
async fn test_concurrent_deliveries_share_registry() {
    let registry = Arc::new(HookRegistry::new());
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    registry.on(EventKind::Message, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let dispatcher = Dispatcher::new(registry.clone());

    let mut tasks = Vec::new();
    for i in 0..16 {
        let dispatcher = dispatcher.clone();
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            if i % 4 == 0 {
                registry.on(EventKind::Read, |_| Ok(()));
            }
            dispatcher
                .receive(envelope(vec![vec![messaging(
                    "USER",
                    json!({"message": {"mid": format!("m_{i}"), "text": "hi"}}),
                )]]))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 16);
}
