//! `RealmServer` builder and accept loop.
//!
//! Ties the layers together: WebSocket transport → JSON codec →
//! per-connection handler → presence actor.

use std::future::Future;
use std::sync::Arc;

use realm_auth::TokenVerifier;
use realm_presence::{
    ActivityLog, PresenceConfig, PresenceHandle, PresenceService, spawn_presence,
};
use realm_protocol::JsonCodec;
use realm_transport::{Transport, WebSocketTransport};
use tokio::task::JoinHandle;

use crate::handler::handle_connection;
use crate::{AdminTrigger, RealmError, ServerConfig};

/// Builder for configuring and starting a Realm presence server.
///
/// # Example
///
/// ```rust,ignore
/// use realm::prelude::*;
///
/// let server = RealmServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(JwtVerifier::new(&secret)?)
///     .await?;
/// server.run().await
/// ```
pub struct RealmServerBuilder {
    bind_addr: String,
    presence_config: PresenceConfig,
    activity_log: Option<Arc<dyn ActivityLog>>,
}

impl RealmServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            presence_config: PresenceConfig::default(),
            activity_log: None,
        }
    }

    /// Takes bind address and presence timings from `config`.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new()
            .bind(&config.bind_addr.to_string())
            .presence_config(config.presence_config())
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets idle threshold and sweep timing.
    pub fn presence_config(mut self, config: PresenceConfig) -> Self {
        self.presence_config = config;
        self
    }

    /// Replaces the default tracing activity log.
    pub fn activity_log(mut self, log: Arc<dyn ActivityLog>) -> Self {
        self.activity_log = Some(log);
        self
    }

    /// Binds the listener and starts the presence actor.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(
        self,
        verifier: impl TokenVerifier,
    ) -> Result<RealmServer, RealmError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let mut service =
            PresenceService::new(self.presence_config, Arc::new(verifier));
        if let Some(log) = self.activity_log {
            service = service.with_activity_log(log);
        }
        let (presence, actor) = spawn_presence(service);

        tracing::info!(
            addr = %self.bind_addr,
            "presence server bound"
        );

        Ok(RealmServer {
            transport,
            presence,
            actor,
            codec: JsonCodec,
        })
    }
}

impl Default for RealmServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Realm presence server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct RealmServer {
    transport: WebSocketTransport,
    presence: PresenceHandle,
    actor: JoinHandle<()>,
    codec: JsonCodec,
}

impl RealmServer {
    /// Creates a new builder.
    pub fn builder() -> RealmServerBuilder {
        RealmServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Handle to the presence actor.
    pub fn presence(&self) -> PresenceHandle {
        self.presence.clone()
    }

    /// Entry point for the administrative surface.
    pub fn admin(&self) -> AdminTrigger {
        AdminTrigger::new(self.presence.clone())
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), RealmError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then closes every
    /// connection and stops the presence actor.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), RealmError> {
        tracing::info!("realm server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let presence = self.presence.clone();
                        let codec = self.codec;
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(conn, presence, codec).await
                            {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => break,
            }
        }

        match self.presence.shutdown().await {
            Ok(closed) => tracing::info!(closed, "realm server stopped"),
            Err(e) => tracing::warn!(error = %e, "presence already stopped"),
        }
        if let Err(e) = self.actor.await {
            tracing::error!(error = %e, "presence actor panicked");
        }
        Ok(())
    }
}
