#![allow(missing_docs)]

//! Messenger Event Types
//!
//! Strongly-typed views over the messaging entries delivered by the
//! Messenger Platform webhook. Every variant keeps the raw entry it was
//! built from next to the fields validated at classification time.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{WebhookError, WebhookResult};

/// Webhook event kinds we classify into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    MessageEcho,
    Delivery,
    Postback,
    Optin,
    Read,
    AccountLinking,
    Referral,
    Payment,
    PolicyEnforcement,
    #[serde(rename = "reaction")]
    MessageReaction,
}

impl EventKind {
    /// Every supported kind
    pub const ALL: [EventKind; 11] = [
        Self::Message,
        Self::MessageEcho,
        Self::MessageReaction,
        Self::Postback,
        Self::Delivery,
        Self::Optin,
        Self::Read,
        Self::AccountLinking,
        Self::Referral,
        Self::Payment,
        Self::PolicyEnforcement,
    ];

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::MessageEcho => "message_echo",
            Self::Delivery => "delivery",
            Self::Postback => "postback",
            Self::Optin => "optin",
            Self::Read => "read",
            Self::AccountLinking => "account_linking",
            Self::Referral => "referral",
            Self::Payment => "payment",
            Self::PolicyEnforcement => "policy_enforcement",
            Self::MessageReaction => "reaction",
        }
    }

    fn available() -> String {
        Self::ALL
            .iter()
            .map(EventKind::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromStr for EventKind {
    type Err = WebhookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message_reaction" => return Ok(Self::MessageReaction),
            "policy-enforcement" => return Ok(Self::PolicyEnforcement),
            _ => {}
        }

        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| WebhookError::InvalidEventKind {
                name: s.to_string(),
                available: Self::available(),
            })
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Raw payload
// =============================================================================

/// Top-level body the platform POSTs to a subscribed endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    /// Subscription object, `page` for Messenger
    #[serde(default)]
    pub object: Option<String>,

    /// Batched page entries
    pub entry: Vec<EnvelopeEntry>,
}

impl WebhookEnvelope {
    /// Parse from raw JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> WebhookResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    /// Total number of messaging entries across all page entries
    pub fn messaging_len(&self) -> usize {
        self.entry.iter().map(|e| e.messaging.len()).sum()
    }

    /// Consume the envelope, yielding messaging entries in arrival order
    pub fn into_messaging(self) -> impl Iterator<Item = MessagingEntry> {
        self.entry.into_iter().flat_map(|e| e.messaging)
    }
}

/// One page entry of the envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeEntry {
    /// Page id
    #[serde(default)]
    pub id: Option<String>,

    /// Batch time (Unix milliseconds)
    #[serde(default)]
    pub time: Option<i64>,

    /// Messaging items; absent for non-messaging subscriptions
    #[serde(default)]
    pub messaging: Vec<MessagingEntry>,
}

/// One raw messaging item, untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessagingEntry(Map<String, Value>);

impl MessagingEntry {
    /// Wrap an already parsed JSON object
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Wrap a JSON value, which must be an object
    pub fn from_value(value: Value) -> WebhookResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(WebhookError::InvalidPayload(format!(
                "messaging entry must be an object, got {other}"
            ))),
        }
    }

    /// Look up a top-level key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether a top-level key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Top-level keys, in payload order
    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

// =============================================================================
// Typed events
// =============================================================================

/// Sender or recipient of a messaging entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// PSID for users, page id for pages
    pub id: String,
}

/// A classified messaging entry.
///
/// `B` is the typed body of the discriminator key (`message`, `delivery`,
/// ...). The common fields are validated once when the event is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<B> {
    pub(crate) sender: Option<Participant>,
    pub(crate) recipient: Participant,
    pub(crate) timestamp: i64,
    pub(crate) body: B,
    pub(crate) raw: MessagingEntry,
}

impl<B> Event<B> {
    /// Sender PSID. Absent only for page-level notices such as policy enforcement.
    pub fn sender_id(&self) -> Option<&str> {
        self.sender.as_ref().map(|p| p.id.as_str())
    }

    /// Recipient (page) id
    pub fn recipient_id(&self) -> &str {
        &self.recipient.id
    }

    /// Event time in Unix milliseconds
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Event time as a UTC datetime
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// The typed body
    pub fn body(&self) -> &B {
        &self.body
    }

    /// The entry this event was classified from
    pub fn raw(&self) -> &MessagingEntry {
        &self.raw
    }
}

/// A text or attachment message, also used for echoes
pub type Message = Event<MessageBody>;
/// A message the page itself sent, echoed back
pub type MessageEcho = Event<MessageBody>;
/// Delivery confirmation
pub type Delivery = Event<DeliveryBody>;
/// Button or menu postback
pub type Postback = Event<PostbackBody>;
/// Plugin opt-in
pub type Optin = Event<OptinBody>;
/// Read receipt
pub type Read = Event<ReadBody>;
/// Account linking / unlinking
pub type AccountLinking = Event<AccountLinkingBody>;
/// m.me link, ad or chat plugin referral
pub type Referral = Event<ReferralBody>;
/// Payment confirmation
pub type Payment = Event<PaymentBody>;
/// Page blocked or unblocked by the platform
pub type PolicyEnforcement = Event<PolicyEnforcementBody>;
/// Reaction added to or removed from a message
pub type MessageReaction = Event<ReactionBody>;

/// Classified webhook event
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingEvent {
    Message(Message),
    MessageEcho(MessageEcho),
    Delivery(Delivery),
    Postback(Postback),
    Optin(Optin),
    Read(Read),
    AccountLinking(AccountLinking),
    Referral(Referral),
    Payment(Payment),
    PolicyEnforcement(PolicyEnforcement),
    MessageReaction(MessageReaction),
}

macro_rules! on_each_variant {
    ($event:expr, $inner:ident => $body:expr) => {
        match $event {
            IncomingEvent::Message($inner) => $body,
            IncomingEvent::MessageEcho($inner) => $body,
            IncomingEvent::Delivery($inner) => $body,
            IncomingEvent::Postback($inner) => $body,
            IncomingEvent::Optin($inner) => $body,
            IncomingEvent::Read($inner) => $body,
            IncomingEvent::AccountLinking($inner) => $body,
            IncomingEvent::Referral($inner) => $body,
            IncomingEvent::Payment($inner) => $body,
            IncomingEvent::PolicyEnforcement($inner) => $body,
            IncomingEvent::MessageReaction($inner) => $body,
        }
    };
}

impl IncomingEvent {
    /// The kind this event was classified as
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message(_) => EventKind::Message,
            Self::MessageEcho(_) => EventKind::MessageEcho,
            Self::Delivery(_) => EventKind::Delivery,
            Self::Postback(_) => EventKind::Postback,
            Self::Optin(_) => EventKind::Optin,
            Self::Read(_) => EventKind::Read,
            Self::AccountLinking(_) => EventKind::AccountLinking,
            Self::Referral(_) => EventKind::Referral,
            Self::Payment(_) => EventKind::Payment,
            Self::PolicyEnforcement(_) => EventKind::PolicyEnforcement,
            Self::MessageReaction(_) => EventKind::MessageReaction,
        }
    }

    /// Sender PSID, when the entry has one
    pub fn sender_id(&self) -> Option<&str> {
        on_each_variant!(self, e => e.sender_id())
    }

    /// Recipient (page) id
    pub fn recipient_id(&self) -> &str {
        on_each_variant!(self, e => e.recipient_id())
    }

    /// Event time in Unix milliseconds
    pub fn timestamp(&self) -> i64 {
        on_each_variant!(self, e => e.timestamp())
    }

    /// The entry this event was classified from
    pub fn raw(&self) -> &MessagingEntry {
        on_each_variant!(self, e => e.raw())
    }
}

// =============================================================================
// Message / echo
// =============================================================================

/// `message` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    /// Message id
    pub mid: String,
    /// Sequence number (older API versions only)
    #[serde(default)]
    pub seq: Option<i64>,
    /// Text content
    #[serde(default)]
    pub text: Option<String>,
    /// Quick reply the user tapped
    #[serde(default)]
    pub quick_reply: Option<QuickReply>,
    /// Attachments (image, audio, video, file, location, fallback, ...)
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Message being replied to
    #[serde(default)]
    pub reply_to: Option<ReplyTo>,
    /// Set on messages sent by the page
    #[serde(default)]
    pub is_echo: bool,
    /// App that sent the echoed message
    #[serde(default)]
    pub app_id: Option<i64>,
    /// Developer metadata attached to the echoed message
    #[serde(default)]
    pub metadata: Option<String>,
}

/// Quick reply payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickReply {
    pub payload: String,
}

/// Reply-to reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTo {
    pub mid: String,
}

/// Message attachment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// `image`, `audio`, `video`, `file`, `location`, `fallback`, ...
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload, usually carrying a `url`
    #[serde(default)]
    pub payload: Value,
}

impl Attachment {
    /// The `payload.url` field, when present
    pub fn url(&self) -> Option<&str> {
        self.payload.get("url").and_then(Value::as_str)
    }
}

impl Event<MessageBody> {
    pub fn mid(&self) -> &str {
        &self.body.mid
    }

    pub fn seq(&self) -> Option<i64> {
        self.body.seq
    }

    pub fn text(&self) -> Option<&str> {
        self.body.text.as_deref()
    }

    /// Payload of the tapped quick reply
    pub fn quick_reply(&self) -> Option<&str> {
        self.body.quick_reply.as_ref().map(|q| q.payload.as_str())
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.body.attachments
    }

    /// Mid of the message this one replies to
    pub fn reply_to(&self) -> Option<&str> {
        self.body.reply_to.as_ref().map(|r| r.mid.as_str())
    }

    pub fn is_echo(&self) -> bool {
        self.body.is_echo
    }

    pub fn app_id(&self) -> Option<i64> {
        self.body.app_id
    }

    pub fn metadata(&self) -> Option<&str> {
        self.body.metadata.as_deref()
    }
}

// =============================================================================
// Receipts
// =============================================================================

/// `delivery` object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryBody {
    /// Delivered message ids; may be empty
    #[serde(default)]
    pub mids: Vec<String>,
    /// Everything before this timestamp was delivered
    pub watermark: i64,
    #[serde(default)]
    pub seq: Option<i64>,
}

impl Event<DeliveryBody> {
    pub fn mids(&self) -> &[String] {
        &self.body.mids
    }

    pub fn watermark(&self) -> i64 {
        self.body.watermark
    }

    /// Watermark as a UTC datetime
    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.body.watermark)
    }
}

/// `read` object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadBody {
    /// Everything before this timestamp was read
    pub watermark: i64,
    #[serde(default)]
    pub seq: Option<i64>,
}

impl Event<ReadBody> {
    pub fn watermark(&self) -> i64 {
        self.body.watermark
    }

    /// Watermark as a UTC datetime
    pub fn read_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.body.watermark)
    }
}

// =============================================================================
// Postback / optin / referral
// =============================================================================

/// `postback` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostbackBody {
    /// Button title
    #[serde(default)]
    pub title: Option<String>,
    /// Developer payload of the button
    pub payload: String,
    /// Referral when the postback came from a Get Started button on an m.me link
    #[serde(default)]
    pub referral: Option<ReferralBody>,
}

impl Event<PostbackBody> {
    pub fn title(&self) -> Option<&str> {
        self.body.title.as_deref()
    }

    pub fn payload(&self) -> &str {
        &self.body.payload
    }

    pub fn referral(&self) -> Option<&ReferralBody> {
        self.body.referral.as_ref()
    }
}

/// `optin` object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptinBody {
    /// `data-ref` of the plugin
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    /// Checkbox plugin user reference, sent instead of a sender PSID
    #[serde(default)]
    pub user_ref: Option<String>,
}

impl Event<OptinBody> {
    pub fn reference(&self) -> Option<&str> {
        self.body.reference.as_deref()
    }

    pub fn user_ref(&self) -> Option<&str> {
        self.body.user_ref.as_deref()
    }
}

/// `referral` object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralBody {
    /// `ref` parameter of the link or ad
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    /// `SHORTLINK`, `ADS`, `MESSENGER_CODE`, `CUSTOMER_CHAT_PLUGIN`, ...
    pub source: String,
    /// Always `OPEN_THREAD` at the time of writing
    #[serde(rename = "type")]
    pub referral_type: String,
    #[serde(default)]
    pub ad_id: Option<String>,
    /// Page the chat plugin was loaded on
    #[serde(default)]
    pub referer_uri: Option<String>,
}

impl Event<ReferralBody> {
    pub fn reference(&self) -> Option<&str> {
        self.body.reference.as_deref()
    }

    pub fn source(&self) -> &str {
        &self.body.source
    }

    pub fn referral_type(&self) -> &str {
        &self.body.referral_type
    }

    pub fn ad_id(&self) -> Option<&str> {
        self.body.ad_id.as_deref()
    }

    pub fn referer_uri(&self) -> Option<&str> {
        self.body.referer_uri.as_deref()
    }
}

// =============================================================================
// Account linking / payment / policy
// =============================================================================

/// Account linking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkingStatus {
    Linked,
    Unlinked,
}

/// `account_linking` object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLinkingBody {
    pub status: LinkingStatus,
    /// Present only when `status` is `linked`
    #[serde(default)]
    pub authorization_code: Option<String>,
}

impl Event<AccountLinkingBody> {
    pub fn status(&self) -> LinkingStatus {
        self.body.status
    }

    pub fn authorization_code(&self) -> Option<&str> {
        self.body.authorization_code.as_deref()
    }
}

/// `payment` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentBody {
    /// Developer payload of the buy button
    pub payload: String,
    /// Contact and shipping info the user agreed to share
    #[serde(default)]
    pub requested_user_info: Value,
    #[serde(default)]
    pub payment_credential: Option<PaymentCredential>,
    pub amount: PaymentAmount,
    #[serde(default)]
    pub shipping_option_id: Option<String>,
}

/// Payment credential reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCredential {
    /// `stripe`, `paypal`, `token`, ...
    pub provider_type: String,
    #[serde(default)]
    pub charge_id: Option<String>,
    #[serde(default)]
    pub fb_payment_id: Option<String>,
}

/// Charged amount; the platform sends the value as a decimal string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAmount {
    pub currency: String,
    pub amount: String,
}

impl Event<PaymentBody> {
    pub fn payload(&self) -> &str {
        &self.body.payload
    }

    pub fn requested_user_info(&self) -> &Value {
        &self.body.requested_user_info
    }

    pub fn payment_credential(&self) -> Option<&PaymentCredential> {
        self.body.payment_credential.as_ref()
    }

    pub fn amount(&self) -> &PaymentAmount {
        &self.body.amount
    }

    pub fn shipping_option_id(&self) -> Option<&str> {
        self.body.shipping_option_id.as_deref()
    }
}

/// `policy_enforcement` object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEnforcementBody {
    /// `block` or `unblock`
    pub action: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Event<PolicyEnforcementBody> {
    pub fn action(&self) -> &str {
        &self.body.action
    }

    pub fn reason(&self) -> Option<&str> {
        self.body.reason.as_deref()
    }
}

// =============================================================================
// Reactions
// =============================================================================

/// Reaction action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionAction {
    React,
    Unreact,
    #[serde(other)]
    Unknown,
}

/// `reaction` object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionBody {
    /// `smile`, `angry`, `sad`, `wow`, `love`, `like`, `dislike` or `other`
    #[serde(default)]
    pub reaction: Option<String>,
    /// The emoji itself
    #[serde(default)]
    pub emoji: Option<String>,
    pub action: ReactionAction,
    /// Id of the message reacted to
    pub mid: String,
}

impl Event<ReactionBody> {
    /// Reaction name. Omitted by the platform on `unreact`.
    pub fn reaction(&self) -> Option<&str> {
        self.body.reaction.as_deref()
    }

    pub fn emoji(&self) -> Option<&str> {
        self.body.emoji.as_deref()
    }

    pub fn action(&self) -> ReactionAction {
        self.body.action
    }

    /// Id of the message reacted to
    pub fn mid(&self) -> &str {
        &self.body.mid
    }
}
