//! Per-connection handler: frame decoding and event routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Attach an outbound queue to the presence actor (the client gets
//!      the current `players_count` right away)
//!   2. Loop: write queued outbound events, decode inbound frames and
//!      forward them to the actor
//!   3. On `Outbound::Close`, client close or socket error: close and
//!      report the disconnect

use realm_presence::{CloseReason, Outbound, PresenceHandle, outbound_channel};
use realm_protocol::{ClientEvent, Codec, RawToken, ServerEvent};
use realm_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::RealmError;

/// Reports the connection as gone when the handler exits, including on
/// error or panic. The command queue is unbounded, so this never blocks.
struct ConnectionGuard {
    connection_id: ConnectionId,
    presence: PresenceHandle,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let _ = self.presence.disconnect(self.connection_id);
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    presence: PresenceHandle,
    codec: C,
) -> Result<(), RealmError> {
    let connection_id = conn.id();
    tracing::info!(%connection_id, "connection accepted");

    let (sink, mut outbound) = outbound_channel();
    presence.connect(connection_id, sink)?;
    let _guard = ConnectionGuard {
        connection_id,
        presence: presence.clone(),
    };

    loop {
        tokio::select! {
            item = outbound.recv() => match item {
                Some(Outbound::Event(event)) => {
                    let bytes = codec.encode(&event)?;
                    conn.send(&bytes).await?;
                }
                Some(Outbound::Close(reason)) => {
                    close(&conn, connection_id, reason).await;
                    break;
                }
                None => {
                    // The actor dropped our queue without a close.
                    close(&conn, connection_id, CloseReason::Shutdown).await;
                    break;
                }
            },
            frame = conn.recv() => match frame {
                Ok(Some(data)) => {
                    if !route_frame(&conn, &presence, &codec, &data).await? {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::info!(%connection_id, "connection closed by client");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%connection_id, error = %e, "recv error");
                    break;
                }
            },
        }
    }

    // _guard drops here → presence disconnect fires.
    Ok(())
}

/// Decodes one inbound frame and forwards it to the presence actor.
/// Returns `false` if the client asked to leave.
async fn route_frame<C: Codec>(
    conn: &WebSocketConnection,
    presence: &PresenceHandle,
    codec: &C,
    data: &[u8],
) -> Result<bool, RealmError> {
    let connection_id = conn.id();

    let event: ClientEvent = match codec.decode(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(%connection_id, error = %e, "failed to decode frame");
            send_error(conn, codec, &format!("invalid frame: {e}")).await?;
            return Ok(true);
        }
    };

    match event {
        ClientEvent::Authenticate(payload) => {
            presence.authenticate(connection_id, RawToken::from_payload(payload))?;
        }
        ClientEvent::Ping(client_time) => {
            presence.ping(connection_id, client_time)?;
        }
        ClientEvent::Activity(item) => {
            presence.activity(connection_id, item)?;
        }
        ClientEvent::ChatMessage(draft) => {
            presence.chat(connection_id, draft)?;
        }
        ClientEvent::Disconnect(request) => {
            tracing::info!(%connection_id, reason = %request.reason, "client disconnected");
            let _ = conn.close().await;
            return Ok(false);
        }
    }

    Ok(true)
}

async fn close(conn: &WebSocketConnection, connection_id: ConnectionId, reason: CloseReason) {
    tracing::info!(%connection_id, %reason, "closing connection");
    if let Err(e) = conn.close().await {
        tracing::debug!(%connection_id, error = %e, "close failed");
    }
}

/// Sends an `error` event straight to the client, bypassing the actor.
async fn send_error<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    message: &str,
) -> Result<(), RealmError> {
    let bytes = codec.encode(&ServerEvent::Error {
        message: message.to_string(),
    })?;
    conn.send(&bytes).await?;
    Ok(())
}
