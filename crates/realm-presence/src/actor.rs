//! The presence actor.
//!
//! One Tokio task owns the [`PresenceService`] and applies commands from
//! an mpsc queue strictly one at a time, interleaved with idle sweeps.
//! Everybody else holds a [`PresenceHandle`] and can only enqueue
//! commands, so no two transitions ever overlap.
//!
//! The command queue is unbounded: connection handlers must be able to
//! report a disconnect from a `Drop` impl, where nothing can be awaited.

use realm_auth::Identity;
use realm_protocol::{ActivityItem, ChatDraft, RawToken, SystemMessageKind};
use realm_reaper::SweepScheduler;
use realm_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{AuthOutcome, OutboundSender, PresenceError, PresenceService};

/// Commands sent to the presence actor.
///
/// Variants carrying a `oneshot::Sender` are requests: the caller waits
/// for the reply. Everything else is fire-and-forget.
pub(crate) enum PresenceCommand {
    Connect {
        connection_id: ConnectionId,
        sink: OutboundSender,
    },
    Authenticate {
        connection_id: ConnectionId,
        token: RawToken,
        reply: Option<oneshot::Sender<AuthOutcome>>,
    },
    Ping {
        connection_id: ConnectionId,
        client_time: u64,
    },
    Activity {
        connection_id: ConnectionId,
        item: ActivityItem,
    },
    Chat {
        connection_id: ConnectionId,
        draft: ChatDraft,
    },
    Disconnect(ConnectionId),
    MassDisconnect {
        reply: oneshot::Sender<usize>,
    },
    SystemMessage {
        message: String,
        kind: SystemMessageKind,
        reply: oneshot::Sender<usize>,
    },
    PlayersCount {
        reply: oneshot::Sender<u64>,
    },
    OnlinePlayers {
        reply: oneshot::Sender<Vec<Identity>>,
    },
    SweepNow {
        reply: oneshot::Sender<Vec<ConnectionId>>,
    },
    Shutdown {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the presence actor.
///
/// Cheap to clone. All methods fail with [`PresenceError::Unavailable`]
/// once the actor has stopped.
#[derive(Clone)]
pub struct PresenceHandle {
    sender: mpsc::UnboundedSender<PresenceCommand>,
}

impl PresenceHandle {
    fn send(&self, cmd: PresenceCommand) -> Result<(), PresenceError> {
        self.sender.send(cmd).map_err(|_| PresenceError::Unavailable)
    }

    async fn request<T>(
        &self,
        cmd: impl FnOnce(oneshot::Sender<T>) -> PresenceCommand,
    ) -> Result<T, PresenceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(cmd(reply_tx))?;
        reply_rx.await.map_err(|_| PresenceError::Unavailable)
    }

    /// Registers a freshly accepted connection and its outbound queue.
    pub fn connect(
        &self,
        connection_id: ConnectionId,
        sink: OutboundSender,
    ) -> Result<(), PresenceError> {
        self.send(PresenceCommand::Connect {
            connection_id,
            sink,
        })
    }

    /// Submits a token for verification. The client learns the result
    /// through its outbound queue.
    pub fn authenticate(
        &self,
        connection_id: ConnectionId,
        token: RawToken,
    ) -> Result<(), PresenceError> {
        self.send(PresenceCommand::Authenticate {
            connection_id,
            token,
            reply: None,
        })
    }

    /// Like [`authenticate`](Self::authenticate) but waits for the outcome.
    pub async fn authenticate_and_wait(
        &self,
        connection_id: ConnectionId,
        token: RawToken,
    ) -> Result<AuthOutcome, PresenceError> {
        self.request(|reply| PresenceCommand::Authenticate {
            connection_id,
            token,
            reply: Some(reply),
        })
        .await
    }

    pub fn ping(
        &self,
        connection_id: ConnectionId,
        client_time: u64,
    ) -> Result<(), PresenceError> {
        self.send(PresenceCommand::Ping {
            connection_id,
            client_time,
        })
    }

    pub fn activity(
        &self,
        connection_id: ConnectionId,
        item: ActivityItem,
    ) -> Result<(), PresenceError> {
        self.send(PresenceCommand::Activity {
            connection_id,
            item,
        })
    }

    pub fn chat(
        &self,
        connection_id: ConnectionId,
        draft: ChatDraft,
    ) -> Result<(), PresenceError> {
        self.send(PresenceCommand::Chat {
            connection_id,
            draft,
        })
    }

    /// Reports that a connection is gone. Safe to call more than once and
    /// from a `Drop` impl.
    pub fn disconnect(&self, connection_id: ConnectionId) -> Result<(), PresenceError> {
        self.send(PresenceCommand::Disconnect(connection_id))
    }

    /// Closes every open connection. Returns how many were closed.
    pub async fn mass_disconnect(&self) -> Result<usize, PresenceError> {
        self.request(|reply| PresenceCommand::MassDisconnect { reply })
            .await
    }

    /// Broadcasts an operator message. Returns how many connections it
    /// was queued for.
    pub async fn system_message(
        &self,
        message: impl Into<String>,
        kind: SystemMessageKind,
    ) -> Result<usize, PresenceError> {
        let message = message.into();
        self.request(|reply| PresenceCommand::SystemMessage {
            message,
            kind,
            reply,
        })
        .await
    }

    pub async fn players_count(&self) -> Result<u64, PresenceError> {
        self.request(|reply| PresenceCommand::PlayersCount { reply })
            .await
    }

    /// Authenticated identities, sorted by user id.
    pub async fn online_players(&self) -> Result<Vec<Identity>, PresenceError> {
        self.request(|reply| PresenceCommand::OnlinePlayers { reply })
            .await
    }

    /// Runs one idle sweep right now. Returns the reaped connections.
    pub async fn sweep_now(&self) -> Result<Vec<ConnectionId>, PresenceError> {
        self.request(|reply| PresenceCommand::SweepNow { reply })
            .await
    }

    /// Closes everything and stops the actor. Returns how many
    /// connections were closed.
    pub async fn shutdown(&self) -> Result<usize, PresenceError> {
        self.request(|reply| PresenceCommand::Shutdown { reply })
            .await
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl std::fmt::Debug for PresenceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

struct PresenceActor {
    service: PresenceService,
    scheduler: SweepScheduler,
    receiver: mpsc::UnboundedReceiver<PresenceCommand>,
}

impl PresenceActor {
    async fn run(mut self) {
        tracing::info!(
            idle_threshold_secs = self.service.config().idle_threshold.as_secs(),
            sweep_interval_secs = self.scheduler.interval().as_secs(),
            "presence actor started"
        );

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else {
                        // Every handle is gone.
                        self.service.shutdown();
                        break;
                    };
                    if !self.handle(cmd) {
                        break;
                    }
                }
                info = self.scheduler.wait_for_sweep() => {
                    let reaped = self.service.sweep();
                    tracing::debug!(
                        sweep = info.sweep,
                        reaped = reaped.len(),
                        online = self.service.players_count(),
                        "idle sweep"
                    );
                }
            }
        }

        tracing::info!("presence actor stopped");
    }

    /// Applies one command. Returns `false` when the actor should stop.
    fn handle(&mut self, cmd: PresenceCommand) -> bool {
        match cmd {
            PresenceCommand::Connect {
                connection_id,
                sink,
            } => self.service.connect(connection_id, sink),
            PresenceCommand::Authenticate {
                connection_id,
                token,
                reply,
            } => {
                let outcome = self.service.authenticate(connection_id, &token);
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            PresenceCommand::Ping {
                connection_id,
                client_time,
            } => self.service.ping(connection_id, client_time),
            PresenceCommand::Activity {
                connection_id,
                item,
            } => self.service.activity(connection_id, item),
            PresenceCommand::Chat {
                connection_id,
                draft,
            } => self.service.chat(connection_id, draft),
            PresenceCommand::Disconnect(connection_id) => {
                self.service.disconnect(connection_id);
            }
            PresenceCommand::MassDisconnect { reply } => {
                let _ = reply.send(self.service.mass_disconnect());
            }
            PresenceCommand::SystemMessage {
                message,
                kind,
                reply,
            } => {
                let _ = reply.send(self.service.system_message(message, kind));
            }
            PresenceCommand::PlayersCount { reply } => {
                let _ = reply.send(self.service.players_count());
            }
            PresenceCommand::OnlinePlayers { reply } => {
                let _ = reply.send(self.service.online_players());
            }
            PresenceCommand::SweepNow { reply } => {
                let _ = reply.send(self.service.sweep());
            }
            PresenceCommand::Shutdown { reply } => {
                let _ = reply.send(self.service.shutdown());
                return false;
            }
        }
        true
    }
}

/// Spawns the presence actor and returns a handle to it.
///
/// The sweep timer is built from the service's own
/// [`PresenceConfig::reaper`](crate::PresenceConfig) settings. Must be
/// called inside a Tokio runtime.
pub fn spawn_presence(service: PresenceService) -> (PresenceHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let scheduler = SweepScheduler::new(service.config().reaper.clone());

    let actor = PresenceActor {
        service,
        scheduler,
        receiver: rx,
    };
    let task = tokio::spawn(actor.run());

    (PresenceHandle { sender: tx }, task)
}
