//! Socket events: every type that travels over a client connection.
//!
//! Frames are adjacently tagged JSON objects. An inbound ping looks like
//! `{ "event": "ping", "data": 1700000000000 }`, an outbound login notice
//! like `{ "event": "login_notification", "data": { "username": "...",
//! "timestamp": "2024-05-01T12:00:00Z" } }`.

use chrono::{DateTime, Utc};
use realm_transport::ConnectionId;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Authenticate payload
// ---------------------------------------------------------------------------

/// The payload of an `authenticate` event as clients actually send it.
///
/// Older clients send the token as a bare string, newer ones wrap it in
/// an object. Both are accepted here and nowhere else: call
/// [`RawToken::from_payload`] at the boundary and pass the normalized
/// token on. Any other shape still decodes, as `Unrecognized`, so the
/// client gets an `auth_error` rather than a generic frame error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthenticatePayload {
    /// `"eyJhbGciOi..."`
    Bare(String),
    /// `{ "token": "eyJhbGciOi..." }`
    Wrapped {
        #[serde(default)]
        token: Option<String>,
    },
    /// `42`, `[..]`, `{ "token": 123 }`, ...
    Unrecognized(Unrecognized),
}

/// Placeholder for an authenticate payload of no known shape. Its
/// contents are discarded on decode and it encodes as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Unrecognized;

impl<'de> Deserialize<'de> for Unrecognized {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(Self)
    }
}

impl Serialize for Unrecognized {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_unit()
    }
}

/// A token exactly as submitted by the client, not yet verified.
///
/// An empty `raw` means the client sent no token at all. A malformed
/// token came in a payload shape that carries no usable string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawToken {
    pub raw: String,
    malformed: bool,
}

impl RawToken {
    /// Creates a raw token from a string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            malformed: false,
        }
    }

    /// A token that could not be read out of the client's payload.
    pub fn malformed() -> Self {
        Self {
            raw: String::new(),
            malformed: true,
        }
    }

    /// Normalizes whatever shape the client sent into a single token.
    pub fn from_payload(payload: Option<AuthenticatePayload>) -> Self {
        match payload {
            Some(AuthenticatePayload::Bare(token)) => Self::new(token),
            Some(AuthenticatePayload::Wrapped { token }) => {
                Self::new(token.unwrap_or_default())
            }
            Some(AuthenticatePayload::Unrecognized(_)) => Self::malformed(),
            None => Self::default(),
        }
    }

    /// `true` when the payload had no readable token shape.
    pub fn is_malformed(&self) -> bool {
        self.malformed
    }

    /// Returns the token with surrounding whitespace removed.
    pub fn as_str(&self) -> &str {
        self.raw.trim()
    }

    /// `true` when there is nothing to verify.
    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A free-form feed item submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub message: String,
    #[serde(rename = "type", default = "default_activity_kind")]
    pub kind: String,
}

fn default_activity_kind() -> String {
    "info".to_string()
}

/// A chat line as the client submits it (no author, no timestamp).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatDraft {
    pub message: String,
}

/// A client announcing it is about to leave.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisconnectRequest {
    #[serde(default)]
    pub reason: String,
}

/// Events a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Submit an identity token. `null` means no token was given.
    Authenticate(Option<AuthenticatePayload>),

    /// Latency probe carrying the client's clock in milliseconds.
    Ping(u64),

    /// A feed item to share with everyone online.
    Activity(ActivityItem),

    /// A chat line to share with everyone online.
    ChatMessage(ChatDraft),

    /// Voluntary disconnect.
    Disconnect(DisconnectRequest),
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Payload of `login_notification` and `logout_notification`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceNotice {
    pub username: String,
    pub timestamp: DateTime<Utc>,
}

/// Payload of an outbound `activity` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFeedItem {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
}

/// Payload of an outbound `chat_message` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLine {
    pub username: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Severity of an operator broadcast.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SystemMessageKind {
    #[default]
    Info,
    Warning,
    Alert,
}

/// Payload of `system_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemNotice {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: SystemMessageKind,
}

/// Payload of `mass_disconnect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MassDisconnectNotice {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Events the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The submitted token was accepted.
    AuthSuccess { username: String },

    /// The submitted token was rejected. The connection stays open.
    AuthError { message: String },

    /// Number of distinct authenticated players online.
    PlayersCount(u64),

    LoginNotification(PresenceNotice),

    LogoutNotification(PresenceNotice),

    Activity(ActivityFeedItem),

    ChatMessage(ChatLine),

    SystemMessage(SystemNotice),

    /// Every session was torn down by an operator.
    MassDisconnect(MassDisconnectNotice),

    /// Echo of a `ping`.
    Pong(u64),

    /// A frame could not be handled (bad JSON, not authenticated, ...).
    Error { message: String },
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who an outbound event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every open connection, authenticated or not.
    All,

    /// One specific connection.
    Connection(ConnectionId),

    /// Every open connection except one.
    AllExcept(ConnectionId),
}

// =========================================================================
// Tests
// =========================================================================
