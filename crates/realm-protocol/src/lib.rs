//! Wire protocol for the Realm presence server.
//!
//! This crate defines the events that travel over a client connection:
//!
//! - **Events** ([`ClientEvent`], [`ServerEvent`]): every frame is a JSON
//!   object `{ "event": "<name>", "data": <payload> }`.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how events are turned
//!   into bytes and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! ```text
//! Transport (bytes) → Protocol (events) → Presence (identity, registry)
//! ```

mod codec;
mod error;
mod event;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use event::{
    ActivityFeedItem, ActivityItem, AuthenticatePayload, ChatDraft, ChatLine,
    ClientEvent, DisconnectRequest, MassDisconnectNotice, PresenceNotice,
    RawToken, Recipient, ServerEvent, SystemMessageKind, SystemNotice,
    Unrecognized,
};
