//! Real-time sync integration tests
//!
//! These tests run the router on a local port and drive it with the client
//! runtime: the WebSocket sync client, the SSE change feed and the
//! reconciler that merges them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chefleague_api::api;
use chefleague_api::auth::jwt::{create_token, create_token_with_lifetime};
use chefleague_api::client::{
    ClientError, ClientResult, LeagueApiClient, LeagueStateReconciler, Reconciliation, ReconnectPolicy, StaticToken,
    SyncClient, SyncClientConfig, SyncEvent, TokenSource,
};
use chefleague_api::domain::league::{League, LeagueEvent, NewLeague, UserSummary};
use chefleague_api::infrastructure::repositories::InMemoryLeagueRepository;
use chefleague_api::realtime::messages::{ClientMessage, ServerMessage};
use chefleague_api::state::AppState;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use uuid::Uuid;

const SECRET: &str = "realtime-test-secret";

async fn start_server() -> (SocketAddr, AppState) {
    let state = AppState::new(Arc::new(InMemoryLeagueRepository::new()), SECRET, 5);
    let app = api::router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

async fn create_league(state: &AppState, owner: &UserSummary) -> League {
    state
        .leagues
        .create_league(
            owner.clone(),
            NewLeague {
                name: "Restaurant Wars".to_string(),
                season: 21,
                max_members: None,
                max_roster_size: None,
                scoring_settings: None,
            },
        )
        .await
        .unwrap()
}

fn token(user: &UserSummary) -> Arc<StaticToken> {
    Arc::new(StaticToken(create_token(user, SECRET).unwrap()))
}

/// Mints a fresh token with a fixed lifetime on every call
struct ShortLivedTokens {
    user: UserSummary,
    lifetime: chrono::Duration,
}

#[async_trait]
impl TokenSource for ShortLivedTokens {
    async fn token(&self) -> ClientResult<String> {
        create_token_with_lifetime(&self.user, SECRET, self.lifetime).map_err(ClientError::Token)
    }
}

fn short_lived(user: &UserSummary, seconds: i64) -> Arc<ShortLivedTokens> {
    Arc::new(ShortLivedTokens {
        user: user.clone(),
        lifetime: chrono::Duration::seconds(seconds),
    })
}

fn fast_reconnect(addr: SocketAddr) -> SyncClientConfig {
    let mut config = SyncClientConfig::new(format!("ws://{}/ws", addr));
    config.reconnect = ReconnectPolicy {
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        factor: 2,
        max_attempts: 5,
    };
    config
}

async fn next_event(events: &mut mpsc::Receiver<SyncEvent>) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for sync event")
        .expect("sync channel closed")
}

/// Collects events up to and including the first one matching `done`
async fn events_until(
    events: &mut mpsc::Receiver<SyncEvent>,
    done: impl Fn(&SyncEvent) -> bool,
) -> Vec<SyncEvent> {
    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let event = tokio::time::timeout_at(deadline, events.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for sync event, saw {:?}", seen))
            .expect("sync channel closed");
        let finished = done(&event);
        seen.push(event);
        if finished {
            return seen;
        }
    }
}

async fn expect_league_update(events: &mut mpsc::Receiver<SyncEvent>, league_id: Uuid) {
    let seen = events_until(events, |e| matches!(e, SyncEvent::Delta(LeagueEvent::LeagueUpdate(_)))).await;
    match seen.last() {
        Some(SyncEvent::Delta(LeagueEvent::LeagueUpdate(update))) => assert_eq!(update.league_id, league_id),
        other => panic!("expected league update, got {:?}", other),
    }
}

async fn read_server_message(
    stream: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for server frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return ServerMessage::from_json(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_draft_is_pushed_to_league_room() {
    let (addr, state) = start_server().await;
    let owner = UserSummary::new(Uuid::new_v4());
    let league = create_league(&state, &owner).await;

    let (client, mut events) = SyncClient::connect(SyncClientConfig::new(format!("ws://{}/ws", addr)), token(&owner));
    assert!(matches!(next_event(&mut events).await, SyncEvent::Connected { .. }));

    client.join_league(league.id()).unwrap();
    assert_eq!(next_event(&mut events).await, SyncEvent::Joined { league_id: league.id() });

    state.leagues.draft_chef(league.id(), owner.id, "chef123").await.unwrap();

    match next_event(&mut events).await {
        SyncEvent::Delta(LeagueEvent::LeagueUpdate(update)) => {
            assert_eq!(update.league_id, league.id());
            assert_eq!(update.version, 2);
            let members = update.updates.members.unwrap();
            assert!(members[0].has_chef("chef123"));
        }
        other => panic!("expected league update, got {:?}", other),
    }

    client.shutdown().await;
}

#[tokio::test]
async fn test_outsider_cannot_join_room() {
    let (addr, state) = start_server().await;
    let owner = UserSummary::new(Uuid::new_v4());
    let league = create_league(&state, &owner).await;
    let outsider = UserSummary::new(Uuid::new_v4());

    let (client, mut events) =
        SyncClient::connect(SyncClientConfig::new(format!("ws://{}/ws", addr)), token(&outsider));
    assert!(matches!(next_event(&mut events).await, SyncEvent::Connected { .. }));

    client.join_league(league.id()).unwrap();

    match next_event(&mut events).await {
        SyncEvent::Rejected { code, .. } => assert_eq!(code, "NOT_A_MEMBER"),
        other => panic!("expected rejection, got {:?}", other),
    }

    client.shutdown().await;
}

#[tokio::test]
async fn test_handshake_rejects_invalid_token() {
    let (addr, _) = start_server().await;

    let result = tokio_tungstenite::connect_async(format!("ws://{}/ws?token=garbage", addr)).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_change_feed_streams_snapshots() {
    let (addr, state) = start_server().await;
    let owner = UserSummary::new(Uuid::new_v4());
    let league = create_league(&state, &owner).await;

    let api = LeagueApiClient::new(format!("http://{}", addr), token(&owner));
    let mut feed = Box::pin(api.watch_league(league.id()).await.unwrap());

    let first = tokio::time::timeout(Duration::from_secs(5), feed.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(first.version(), 1);

    state.leagues.draft_chef(league.id(), owner.id, "chef42").await.unwrap();

    let second = tokio::time::timeout(Duration::from_secs(5), feed.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(second.version(), 2);
    assert!(second.members()[0].has_chef("chef42"));
}

#[tokio::test]
async fn test_late_delta_does_not_override_refetched_snapshot() {
    let (addr, state) = start_server().await;
    let owner = UserSummary::new(Uuid::new_v4());
    let league = create_league(&state, &owner).await;

    let (client, mut events) = SyncClient::connect(SyncClientConfig::new(format!("ws://{}/ws", addr)), token(&owner));
    assert!(matches!(next_event(&mut events).await, SyncEvent::Connected { .. }));
    client.join_league(league.id()).unwrap();
    assert_eq!(next_event(&mut events).await, SyncEvent::Joined { league_id: league.id() });

    state.leagues.draft_chef(league.id(), owner.id, "chef7").await.unwrap();
    let SyncEvent::Delta(delta) = next_event(&mut events).await else {
        panic!("expected delta");
    };

    // The snapshot already reflects the draft, so the delta arrives late
    let api = LeagueApiClient::new(format!("http://{}", addr), token(&owner));
    let snapshot = api.fetch_league(league.id()).await.unwrap();

    let mut reconciler = LeagueStateReconciler::new(league.id());
    assert!(reconciler.apply_snapshot(snapshot.clone()).is_applied());
    assert_eq!(reconciler.apply_event(&delta), Reconciliation::Stale);
    assert_eq!(reconciler.league(), Some(&snapshot));
    assert_eq!(reconciler.last_applied_version(), 2);

    client.shutdown().await;
}

#[tokio::test]
async fn test_handshake_rejects_recently_expired_token() {
    let (addr, _) = start_server().await;
    let user = UserSummary::new(Uuid::new_v4());
    let token = create_token_with_lifetime(&user, SECRET, chrono::Duration::seconds(-30)).unwrap();

    let result = tokio_tungstenite::connect_async(format!("ws://{}/ws?token={}", addr, token)).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_rooms_are_rejoined_after_reconnect() {
    let (addr, state) = start_server().await;
    let owner = UserSummary::new(Uuid::new_v4());
    let league = create_league(&state, &owner).await;

    // The server drops the socket when the token runs out and never sees a refresh
    let (client, mut events) = SyncClient::connect(fast_reconnect(addr), short_lived(&owner, 2));
    assert!(matches!(next_event(&mut events).await, SyncEvent::Connected { .. }));
    client.join_league(league.id()).unwrap();
    assert_eq!(next_event(&mut events).await, SyncEvent::Joined { league_id: league.id() });

    let seen = events_until(&mut events, |e| matches!(e, SyncEvent::Disconnected { .. })).await;
    assert!(seen
        .iter()
        .any(|e| matches!(e, SyncEvent::Rejected { code, .. } if code == "TOKEN_EXPIRED")));
    assert_eq!(seen.last(), Some(&SyncEvent::Disconnected { permanent: false }));

    assert!(matches!(next_event(&mut events).await, SyncEvent::Connected { .. }));
    assert_eq!(next_event(&mut events).await, SyncEvent::Joined { league_id: league.id() });

    state.leagues.draft_chef(league.id(), owner.id, "chef88").await.unwrap();
    expect_league_update(&mut events, league.id()).await;

    client.shutdown().await;
}

#[tokio::test]
async fn test_token_refresh_keeps_connection_and_rooms() {
    let (addr, state) = start_server().await;
    let owner = UserSummary::new(Uuid::new_v4());
    let league = create_league(&state, &owner).await;

    let mut config = fast_reconnect(addr);
    config.token_refresh_interval = Duration::from_millis(500);
    let (client, mut events) = SyncClient::connect(config, short_lived(&owner, 3));
    assert!(matches!(next_event(&mut events).await, SyncEvent::Connected { .. }));
    client.join_league(league.id()).unwrap();
    assert_eq!(next_event(&mut events).await, SyncEvent::Joined { league_id: league.id() });

    // Outlive the first token; refreshed tokens keep extending the deadline
    let quiet_until = tokio::time::Instant::now() + Duration::from_millis(4500);
    while let Ok(event) = tokio::time::timeout_at(quiet_until, events.recv()).await {
        match event {
            Some(SyncEvent::Connected { .. }) | Some(SyncEvent::Disconnected { .. }) | Some(SyncEvent::Rejected { .. }) => {
                panic!("connection did not survive token refresh: {:?}", event)
            }
            Some(_) => {}
            None => panic!("sync channel closed"),
        }
    }

    state.leagues.draft_chef(league.id(), owner.id, "chef9").await.unwrap();
    expect_league_update(&mut events, league.id()).await;

    client.shutdown().await;
}

#[tokio::test]
async fn test_auth_reassertion_requires_same_user() {
    let (addr, _) = start_server().await;
    let owner = UserSummary::new(Uuid::new_v4());
    let stranger = UserSummary::new(Uuid::new_v4());
    let owner_token = create_token(&owner, SECRET).unwrap();

    let (mut stream, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws?token={}", addr, owner_token))
        .await
        .unwrap();
    assert!(matches!(read_server_message(&mut stream).await, ServerMessage::Welcome { .. }));

    let foreign = ClientMessage::Auth {
        token: create_token(&stranger, SECRET).unwrap(),
    };
    stream.send(Message::Text(foreign.to_json().unwrap().into())).await.unwrap();
    match read_server_message(&mut stream).await {
        ServerMessage::AuthResult { success, .. } => assert!(!success),
        other => panic!("expected auth result, got {:?}", other),
    }

    let garbage = ClientMessage::Auth {
        token: "garbage".to_string(),
    };
    stream.send(Message::Text(garbage.to_json().unwrap().into())).await.unwrap();
    match read_server_message(&mut stream).await {
        ServerMessage::AuthResult { success, .. } => assert!(!success),
        other => panic!("expected auth result, got {:?}", other),
    }

    let own = ClientMessage::Auth {
        token: create_token(&owner, SECRET).unwrap(),
    };
    stream.send(Message::Text(own.to_json().unwrap().into())).await.unwrap();
    match read_server_message(&mut stream).await {
        ServerMessage::AuthResult { success, .. } => assert!(success),
        other => panic!("expected auth result, got {:?}", other),
    }
}
