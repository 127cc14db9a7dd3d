//! Property-based testing for webhook classification and dispatch.
//!
//! Uses proptest to generate messaging entries with arbitrary discriminator
//! combinations and verify the precedence rules hold for all of them.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use messenger_hooks::error::WebhookError;
use messenger_hooks::webhook::{
    classify, detect_kind, Dispatcher, EventKind, HookRegistry, MessagingEntry, WebhookEnvelope,
};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Top-level discriminators in precedence order
const TOP_LEVEL: &[EventKind] = &[
    EventKind::Postback,
    EventKind::Delivery,
    EventKind::Optin,
    EventKind::Read,
    EventKind::AccountLinking,
    EventKind::Referral,
    EventKind::Payment,
    EventKind::PolicyEnforcement,
];

const KNOWN_KEYS: &[&str] = &[
    "sender",
    "recipient",
    "timestamp",
    "message",
    "reaction",
    "postback",
    "delivery",
    "optin",
    "read",
    "account_linking",
    "referral",
    "payment",
    "policy_enforcement",
    "policy-enforcement",
];

// ============================================================================
// STRATEGIES
// ============================================================================

/// Strategy for any event kind
pub fn arb_kind() -> impl Strategy<Value = EventKind> {
    prop::sample::select(EventKind::ALL.to_vec())
}

/// Strategy for short payload strings
pub fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _-]{1,40}"
}

/// Strategy for millisecond timestamps
pub fn arb_millis() -> impl Strategy<Value = i64> {
    1_400_000_000_000i64..1_900_000_000_000i64
}

/// Strategy for keys the classifier does not know about
pub fn arb_unknown_key() -> impl Strategy<Value = String> {
    "[a-z_]{1,16}".prop_filter("must not be a known key", |key| {
        !KNOWN_KEYS.contains(&key.as_str())
    })
}

/// Entry key and a valid body for `kind`
fn body_for(kind: EventKind, text: &str, millis: i64) -> (&'static str, Value) {
    match kind {
        EventKind::Message => ("message", json!({"mid": format!("m_{text}"), "text": text})),
        EventKind::MessageEcho => (
            "message",
            json!({
                "mid": format!("m_{text}"),
                "text": text,
                "is_echo": true,
                "app_id": 1517776481860111_i64
            }),
        ),
        EventKind::MessageReaction => (
            "reaction",
            json!({
                "reaction": "like",
                "emoji": "\u{1f44d}",
                "action": "react",
                "mid": format!("m_{text}")
            }),
        ),
        EventKind::Postback => ("postback", json!({"title": text, "payload": text})),
        EventKind::Delivery => (
            "delivery",
            json!({"mids": [format!("m_{text}")], "watermark": millis}),
        ),
        EventKind::Optin => ("optin", json!({"ref": text})),
        EventKind::Read => ("read", json!({"watermark": millis})),
        EventKind::AccountLinking => ("account_linking", json!({"status": "unlinked"})),
        EventKind::Referral => (
            "referral",
            json!({"ref": text, "source": "SHORTLINK", "type": "OPEN_THREAD"}),
        ),
        EventKind::Payment => (
            "payment",
            json!({"payload": text, "amount": {"currency": "USD", "amount": "2.70"}}),
        ),
        EventKind::PolicyEnforcement => (
            "policy_enforcement",
            json!({"action": "block", "reason": text}),
        ),
    }
}

fn entry_with(kinds: &[EventKind], text: &str, millis: i64) -> MessagingEntry {
    let mut map = Map::new();
    map.insert("sender".to_string(), json!({"id": "USER_PSID"}));
    map.insert("recipient".to_string(), json!({"id": "PAGE_ID"}));
    map.insert("timestamp".to_string(), json!(millis));
    for kind in kinds {
        let (key, body) = body_for(*kind, text, millis);
        map.insert(key.to_string(), body);
    }
    MessagingEntry::new(map)
}

// ============================================================================
// CLASSIFICATION PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn single_discriminator_maps_to_its_kind(
        kind in arb_kind(),
        text in arb_text(),
        millis in arb_millis(),
    ) {
        let entry = entry_with(&[kind], &text, millis);

        let (classified, event) = classify(entry.clone()).unwrap();
        prop_assert_eq!(classified, kind);
        prop_assert_eq!(event.kind(), kind);
        prop_assert_eq!(event.timestamp(), millis);
        prop_assert_eq!(event.raw(), &entry);
        prop_assert_eq!(detect_kind(&entry), Some(kind));
    }

    #[test]
    fn classification_is_deterministic(
        kinds in prop::collection::vec(arb_kind(), 1..4),
        text in arb_text(),
        millis in arb_millis(),
    ) {
        let entry = entry_with(&kinds, &text, millis);

        let (first_kind, first) = classify(entry.clone()).unwrap();
        let (second_kind, second) = classify(entry.clone()).unwrap();
        prop_assert_eq!(first_kind, second_kind);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn first_top_level_key_wins(
        mask in prop::collection::vec(any::<bool>(), TOP_LEVEL.len()),
        text in arb_text(),
        millis in arb_millis(),
    ) {
        let present: Vec<EventKind> = TOP_LEVEL
            .iter()
            .zip(&mask)
            .filter(|(_, on)| **on)
            .map(|(kind, _)| *kind)
            .collect();
        prop_assume!(!present.is_empty());

        let (kind, _) = classify(entry_with(&present, &text, millis)).unwrap();
        prop_assert_eq!(kind, present[0]);
    }

    #[test]
    fn message_family_beats_top_level_keys(
        head in prop::sample::select(vec![
            EventKind::Message,
            EventKind::MessageEcho,
            EventKind::MessageReaction,
        ]),
        others in prop::collection::vec(prop::sample::select(TOP_LEVEL.to_vec()), 0..4),
        text in arb_text(),
        millis in arb_millis(),
    ) {
        let mut kinds = vec![head];
        kinds.extend(others);

        let (kind, _) = classify(entry_with(&kinds, &text, millis)).unwrap();
        prop_assert_eq!(kind, head);
    }

    #[test]
    fn reaction_beats_plain_message(text in arb_text(), millis in arb_millis()) {
        let entry = entry_with(&[EventKind::Message, EventKind::MessageReaction], &text, millis);
        prop_assert_eq!(detect_kind(&entry), Some(EventKind::MessageReaction));
    }

    #[test]
    fn unknown_keys_are_unrecognized(
        keys in prop::collection::hash_set(arb_unknown_key(), 0..6),
        millis in arb_millis(),
    ) {
        let mut map = Map::new();
        map.insert("sender".to_string(), json!({"id": "USER_PSID"}));
        map.insert("recipient".to_string(), json!({"id": "PAGE_ID"}));
        map.insert("timestamp".to_string(), json!(millis));
        for key in &keys {
            map.insert(key.clone(), json!({}));
        }

        match classify(MessagingEntry::new(map)) {
            Err(WebhookError::UnrecognizedEvent { keys: reported }) => {
                let reported: HashSet<String> = reported.into_iter().collect();
                for key in &keys {
                    prop_assert!(reported.contains(key));
                }
            }
            other => prop_assert!(
                false,
                "expected UnrecognizedEvent, got {:?}",
                other.map(|(kind, _)| kind)
            ),
        }
    }

    #[test]
    fn kind_names_parse_back(kind in arb_kind()) {
        prop_assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
    }
}

// ============================================================================
// DISPATCH PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn only_registered_kinds_are_handled(
        registered in prop::sample::subsequence(EventKind::ALL.to_vec(), 0..=EventKind::ALL.len()),
        delivered in prop::collection::vec(arb_kind(), 1..12),
        text in arb_text(),
        millis in arb_millis(),
    ) {
        let registry = Arc::new(HookRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));
        for kind in &registered {
            let counter = calls.clone();
            registry.on(*kind, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let messaging: Vec<Value> = delivered
            .iter()
            .map(|kind| Value::Object(entry_with(&[*kind], &text, millis).as_map().clone()))
            .collect();
        let envelope: WebhookEnvelope = serde_json::from_value(json!({
            "object": "page",
            "entry": [{"id": "PAGE_ID", "time": millis, "messaging": messaging}]
        }))
        .unwrap();

        let summary = tokio_test::block_on(Dispatcher::new(registry).receive(envelope)).unwrap();

        let expected = delivered.iter().filter(|kind| registered.contains(*kind)).count();
        prop_assert_eq!(summary.handled, expected);
        prop_assert_eq!(summary.ignored, delivered.len() - expected);
        prop_assert_eq!(calls.load(Ordering::SeqCst), expected);
    }
}
