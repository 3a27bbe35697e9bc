//! # Realm
//!
//! Real-time presence server for the Realm RPG.
//!
//! Browser clients hold a WebSocket open while they play. Realm verifies
//! the identity token they submit, keeps at most one live connection per
//! user, broadcasts the number of distinct players online, reaps
//! connections that go quiet and lets an administrator disconnect
//! everyone at once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use realm::prelude::*;
//!
//! # async fn start() -> Result<(), RealmError> {
//! let config = ServerConfig::from_env();
//! let server = RealmServerBuilder::from_config(&config)
//!     .build(JwtVerifier::new(&config.jwt_secret)?)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod admin;
mod config;
mod error;
mod handler;
mod logging;
mod server;

pub use admin::{AdminTrigger, DisconnectAllReport};
pub use config::ServerConfig;
pub use error::RealmError;
pub use logging::init_logging;
pub use server::{RealmServer, RealmServerBuilder};

pub mod prelude {
    pub use crate::{
        AdminTrigger, DisconnectAllReport, RealmError, RealmServer,
        RealmServerBuilder, ServerConfig, init_logging,
    };
    pub use realm_auth::{
        AuthError, Identity, JwtVerifier, Role, TokenClaims, TokenVerifier,
        UserId,
    };
    pub use realm_presence::{
        ActivityKind, ActivityLog, ActivityRecord, PresenceConfig,
        PresenceHandle,
    };
    pub use realm_protocol::{ClientEvent, ServerEvent, SystemMessageKind};
    pub use realm_reaper::ReaperConfig;
    pub use realm_transport::ConnectionId;
}
