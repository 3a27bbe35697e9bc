//! Actor-level presence scenarios: logins, reconnects, idle reaping and
//! mass disconnect, driven through a `PresenceHandle` only.

use std::sync::Arc;
use std::time::Duration;

use realm_auth::{AuthError, Identity, Role, TokenVerifier, UserId};
use realm_presence::{
    AuthOutcome, CloseReason, Outbound, OutboundReceiver, PresenceConfig,
    PresenceHandle, PresenceService, outbound_channel, spawn_presence,
};
use realm_protocol::{RawToken, ServerEvent};
use realm_reaper::ReaperConfig;
use realm_transport::ConnectionId;

struct FakeVerifier;

impl TokenVerifier for FakeVerifier {
    fn verify(&self, token: &RawToken) -> Result<Identity, AuthError> {
        if token.is_empty() {
            return Err(AuthError::TokenMissing);
        }
        let (id, name) = token
            .as_str()
            .split_once(':')
            .ok_or(AuthError::TokenMalformed)?;
        let id = id.parse().map_err(|_| AuthError::TokenMalformed)?;
        Ok(Identity::new(UserId(id), name, Role::User))
    }
}

fn presence(config: PresenceConfig) -> PresenceHandle {
    let service = PresenceService::new(config, Arc::new(FakeVerifier));
    spawn_presence(service).0
}

fn conn(id: u64) -> ConnectionId {
    ConnectionId::new(id)
}

fn open(handle: &PresenceHandle, id: u64) -> OutboundReceiver {
    let (tx, rx) = outbound_channel();
    handle.connect(conn(id), tx).unwrap();
    rx
}

fn drain(rx: &mut OutboundReceiver) -> Vec<Outbound> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}

fn last_count(items: &[Outbound]) -> Option<u64> {
    items.iter().rev().find_map(|item| match item {
        Outbound::Event(ServerEvent::PlayersCount(n)) => Some(*n),
        _ => None,
    })
}

async fn login(handle: &PresenceHandle, id: u64, token: &str) -> AuthOutcome {
    handle
        .authenticate_and_wait(conn(id), RawToken::new(token))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_two_users_login_then_one_leaves() {
    let handle = presence(PresenceConfig::default());
    let mut a = open(&handle, 1);
    let _b = open(&handle, 2);

    login(&handle, 1, "1:aria").await;
    login(&handle, 2, "2:bram").await;
    assert_eq!(last_count(&drain(&mut a)), Some(2));

    handle.disconnect(conn(2)).unwrap();
    assert_eq!(handle.players_count().await.unwrap(), 1);

    let to_a = drain(&mut a);
    assert!(to_a.iter().any(|item| matches!(
        item,
        Outbound::Event(ServerEvent::LogoutNotification(n)) if n.username == "bram"
    )));
    assert_eq!(last_count(&to_a), Some(1));
}

#[tokio::test]
async fn test_reconnect_same_user_replaces_session_without_double_count() {
    let handle = presence(PresenceConfig::default());
    let mut first = open(&handle, 1);
    login(&handle, 1, "1:aria").await;

    let mut second = open(&handle, 2);
    let outcome = login(&handle, 2, "1:aria").await;

    assert!(matches!(
        outcome,
        AuthOutcome::Accepted { evicted: Some(old), .. } if old == conn(1)
    ));
    assert_eq!(
        drain(&mut first).last(),
        Some(&Outbound::Close(CloseReason::Superseded))
    );
    assert_eq!(last_count(&drain(&mut second)), Some(1));

    // The evicted handler reports its own close afterwards.
    handle.disconnect(conn(1)).unwrap();
    assert_eq!(handle.players_count().await.unwrap(), 1);
    let online = handle.online_players().await.unwrap();
    assert_eq!(online.len(), 1);
    assert_eq!(online[0].username, "aria");
}

#[tokio::test]
async fn test_failed_auth_keeps_connection_open_and_uncounted() {
    let handle = presence(PresenceConfig::default());
    let mut a = open(&handle, 1);

    let outcome = login(&handle, 1, "").await;

    assert_eq!(outcome, AuthOutcome::Rejected(AuthError::TokenMissing));
    let items = drain(&mut a);
    assert!(items.iter().any(|item| matches!(
        item,
        Outbound::Event(ServerEvent::AuthError { .. })
    )));
    assert!(!items.iter().any(|item| matches!(item, Outbound::Close(_))));
    assert_eq!(handle.players_count().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_idle_user_is_reaped_while_active_user_stays() {
    let config = PresenceConfig {
        idle_threshold: Duration::from_secs(60),
        reaper: ReaperConfig::with_interval(Duration::from_secs(10)),
    };
    let handle = presence(config);
    let mut idle = open(&handle, 1);
    let mut busy = open(&handle, 2);
    login(&handle, 1, "1:aria").await;
    login(&handle, 2, "2:bram").await;

    for _ in 0..8 {
        tokio::time::sleep(Duration::from_secs(10)).await;
        handle.ping(conn(2), 0).unwrap();
    }

    assert_eq!(handle.players_count().await.unwrap(), 1);
    assert_eq!(
        drain(&mut idle).last(),
        Some(&Outbound::Close(CloseReason::Idle))
    );
    let to_busy = drain(&mut busy);
    assert!(to_busy.iter().any(|item| matches!(
        item,
        Outbound::Event(ServerEvent::LogoutNotification(n)) if n.username == "aria"
    )));
    assert!(!to_busy.iter().any(|item| matches!(item, Outbound::Close(_))));
}

#[tokio::test(start_paused = true)]
async fn test_sweep_now_reaps_without_waiting_for_timer() {
    let config = PresenceConfig {
        idle_threshold: Duration::from_secs(60),
        reaper: ReaperConfig::with_interval(Duration::from_secs(3600)),
    };
    let handle = presence(config);
    let _a = open(&handle, 1);
    assert!(handle.sweep_now().await.unwrap().is_empty());

    tokio::time::advance(Duration::from_secs(61)).await;

    assert_eq!(handle.sweep_now().await.unwrap(), vec![conn(1)]);
}

#[tokio::test]
async fn test_mass_disconnect_closes_everyone_and_zeroes_count() {
    let handle = presence(PresenceConfig::default());
    let mut receivers: Vec<_> = (1..=3).map(|id| open(&handle, id)).collect();
    login(&handle, 1, "1:aria").await;
    login(&handle, 2, "2:bram").await;

    assert_eq!(handle.mass_disconnect().await.unwrap(), 3);

    for rx in &mut receivers {
        let items = drain(rx);
        assert_eq!(
            items
                .iter()
                .filter(|i| matches!(i, Outbound::Event(ServerEvent::MassDisconnect(_))))
                .count(),
            1
        );
        assert_eq!(items.last(), Some(&Outbound::Close(CloseReason::MassDisconnect)));
    }
    assert_eq!(handle.players_count().await.unwrap(), 0);

    // Late close reports from the torn-down handlers change nothing.
    for id in 1..=3 {
        handle.disconnect(conn(id)).unwrap();
    }
    assert_eq!(handle.players_count().await.unwrap(), 0);
    assert!(handle.online_players().await.unwrap().is_empty());
}
