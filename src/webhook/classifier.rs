//! Payload classification
//!
//! Maps one raw messaging entry onto exactly one [`EventKind`] and builds the
//! typed event for it. Classification is a pure function of which
//! discriminator keys are present:
//!
//! ```text
//! message.is_echo == true            -> message_echo
//! message.reaction | reaction        -> reaction
//! message                            -> message
//! postback | delivery | optin | read |
//! account_linking | referral |
//! payment | policy_enforcement       -> first key present, in that order
//! anything else                      -> UnrecognizedEvent
//! ```

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{WebhookError, WebhookResult};
use crate::webhook::events::{Event, EventKind, IncomingEvent, MessagingEntry, Participant};

/// Top-level discriminators checked after the `message` family
const TOP_LEVEL_KEYS: &[(&str, EventKind)] = &[
    ("postback", EventKind::Postback),
    ("delivery", EventKind::Delivery),
    ("optin", EventKind::Optin),
    ("read", EventKind::Read),
    ("account_linking", EventKind::AccountLinking),
    ("referral", EventKind::Referral),
    ("payment", EventKind::Payment),
    ("policy_enforcement", EventKind::PolicyEnforcement),
    ("policy-enforcement", EventKind::PolicyEnforcement),
];

/// Determine the event kind of an entry without building the event.
pub fn detect_kind(entry: &MessagingEntry) -> Option<EventKind> {
    if let Some(message) = entry.get("message") {
        if message.get("is_echo").and_then(Value::as_bool) == Some(true) {
            return Some(EventKind::MessageEcho);
        }
        if message.get("reaction").is_some_and(Value::is_object) {
            return Some(EventKind::MessageReaction);
        }
    }
    if entry.contains_key("reaction") {
        return Some(EventKind::MessageReaction);
    }
    if entry.contains_key("message") {
        return Some(EventKind::Message);
    }

    TOP_LEVEL_KEYS
        .iter()
        .find(|(key, _)| entry.contains_key(key))
        .map(|(_, kind)| *kind)
}

/// Classify a messaging entry and build its typed view.
///
/// The entry is moved into the returned event. Fails with
/// [`WebhookError::UnrecognizedEvent`] when no discriminator is present and
/// with [`WebhookError::InvalidPayload`] when the matched body is malformed.
pub fn classify(entry: MessagingEntry) -> WebhookResult<(EventKind, IncomingEvent)> {
    let kind = detect_kind(&entry).ok_or_else(|| WebhookError::UnrecognizedEvent {
        keys: entry.keys(),
    })?;

    let event = match kind {
        EventKind::Message => IncomingEvent::Message(build(entry, kind)?),
        EventKind::MessageEcho => IncomingEvent::MessageEcho(build(entry, kind)?),
        EventKind::MessageReaction => IncomingEvent::MessageReaction(build(entry, kind)?),
        EventKind::Postback => IncomingEvent::Postback(build(entry, kind)?),
        EventKind::Delivery => IncomingEvent::Delivery(build(entry, kind)?),
        EventKind::Optin => IncomingEvent::Optin(build(entry, kind)?),
        EventKind::Read => IncomingEvent::Read(build(entry, kind)?),
        EventKind::AccountLinking => IncomingEvent::AccountLinking(build(entry, kind)?),
        EventKind::Referral => IncomingEvent::Referral(build(entry, kind)?),
        EventKind::Payment => IncomingEvent::Payment(build(entry, kind)?),
        EventKind::PolicyEnforcement => IncomingEvent::PolicyEnforcement(build(entry, kind)?),
    };

    Ok((kind, event))
}

/// Where the body of each kind lives inside the entry
fn body_of(entry: &MessagingEntry, kind: EventKind) -> Option<&Value> {
    match kind {
        EventKind::Message | EventKind::MessageEcho => entry.get("message"),
        EventKind::MessageReaction => entry
            .get("reaction")
            .or_else(|| entry.get("message").and_then(|m| m.get("reaction"))),
        EventKind::PolicyEnforcement => entry
            .get("policy_enforcement")
            .or_else(|| entry.get("policy-enforcement")),
        other => entry.get(other.as_str()),
    }
}

/// Kinds the platform may send without a sender PSID
fn sender_optional(kind: EventKind) -> bool {
    matches!(kind, EventKind::PolicyEnforcement | EventKind::Optin)
}

fn field<T: DeserializeOwned>(
    entry: &MessagingEntry,
    key: &str,
    kind: EventKind,
) -> WebhookResult<T> {
    let value = entry
        .get(key)
        .ok_or_else(|| WebhookError::InvalidPayload(format!("{kind} entry is missing `{key}`")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| WebhookError::InvalidPayload(format!("{kind} entry has invalid `{key}`: {e}")))
}

fn build<B: DeserializeOwned>(entry: MessagingEntry, kind: EventKind) -> WebhookResult<Event<B>> {
    let sender = match entry.get("sender") {
        Some(_) => Some(field::<Participant>(&entry, "sender", kind)?),
        None if sender_optional(kind) => None,
        None => {
            return Err(WebhookError::InvalidPayload(format!(
                "{kind} entry is missing `sender`"
            )))
        }
    };
    let recipient = field::<Participant>(&entry, "recipient", kind)?;
    let timestamp = field::<i64>(&entry, "timestamp", kind)?;

    let raw_body = body_of(&entry, kind)
        .ok_or_else(|| WebhookError::InvalidPayload(format!("{kind} entry has no body")))?;
    let body = serde_json::from_value(raw_body.clone())
        .map_err(|e| WebhookError::InvalidPayload(format!("invalid {kind} body: {e}")))?;

    Ok(Event {
        sender,
        recipient,
        timestamp,
        body,
        raw: entry,
    })
}
