//! Push-channel client.
//!
//! A background task owns the WebSocket. Room membership is tracked on the
//! client side and re-issued after every reconnect, because the server
//! forgets it when a connection drops.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::backoff::ReconnectPolicy;
use super::error::{ClientError, ClientResult};
use crate::domain::league::LeagueEvent;
use crate::realtime::messages::{ClientMessage, ServerMessage};

/// Refresh ahead of the 60 minute token lifetime
pub const DEFAULT_TOKEN_REFRESH: Duration = Duration::from_secs(55 * 60);

const EVENT_BUFFER: usize = 256;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Supplies identity tokens, fetching a fresh one on each call
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> ClientResult<String>;
}

/// A fixed token, for tests and short-lived tools
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> ClientResult<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone)]
pub struct SyncClientConfig {
    /// WebSocket endpoint, e.g. `ws://localhost:3000/ws`
    pub url: String,
    pub reconnect: ReconnectPolicy,
    pub token_refresh_interval: Duration,
}

impl SyncClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectPolicy::default(),
            token_refresh_interval: DEFAULT_TOKEN_REFRESH,
        }
    }
}

/// What the sync task reports to its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Connected { connection_id: Uuid },
    Joined { league_id: Uuid },
    /// The server refused a request, e.g. joining a league the user is not in
    Rejected { code: String, message: String },
    Delta(LeagueEvent),
    /// `permanent` once reconnect attempts are exhausted; the owner should
    /// fall back to a full snapshot refetch
    Disconnected { permanent: bool },
}

#[derive(Debug)]
enum Command {
    Join(Uuid),
    Leave(Uuid),
    Shutdown,
}

#[derive(Clone, Copy)]
enum SessionEnd {
    Shutdown,
    Dropped { was_connected: bool },
}

/// Handle to the background sync task
pub struct SyncClient {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl SyncClient {
    /// Starts the sync task and returns the stream of its events
    pub fn connect(config: SyncClientConfig, tokens: Arc<dyn TokenSource>) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::channel(EVENT_BUFFER);

        let task = tokio::spawn(run(config, tokens, command_rx, events));

        (Self { commands, task }, event_rx)
    }

    /// Subscribes to a league's room, now and after every reconnect
    pub fn join_league(&self, league_id: Uuid) -> ClientResult<()> {
        self.send(Command::Join(league_id))
    }

    pub fn leave_league(&self, league_id: Uuid) -> ClientResult<()> {
        self.send(Command::Leave(league_id))
    }

    /// Closes the connection and waits for the task to finish
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        let _ = self.task.await;
    }

    fn send(&self, command: Command) -> ClientResult<()> {
        self.commands.send(command).map_err(|_| ClientError::Disconnected)
    }
}

async fn run(
    config: SyncClientConfig,
    tokens: Arc<dyn TokenSource>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::Sender<SyncEvent>,
) {
    let mut rooms = HashSet::new();
    let mut failures = 0u32;

    loop {
        match session(&config, tokens.as_ref(), &mut commands, &mut rooms, &events).await {
            SessionEnd::Shutdown => return,
            SessionEnd::Dropped { was_connected } => {
                if was_connected {
                    failures = 0;
                    if events.send(SyncEvent::Disconnected { permanent: false }).await.is_err() {
                        return;
                    }
                }
            }
        }

        failures += 1;
        let Some(delay) = config.reconnect.delay_for(failures) else {
            warn!("Giving up on sync channel after {} attempts", failures - 1);
            let _ = events.send(SyncEvent::Disconnected { permanent: true }).await;
            return;
        };
        info!(attempt = failures, "Reconnecting sync channel in {:?}", delay);

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                command = commands.recv() => match command {
                    Some(Command::Join(league_id)) => {
                        rooms.insert(league_id);
                    }
                    Some(Command::Leave(league_id)) => {
                        rooms.remove(&league_id);
                    }
                    Some(Command::Shutdown) | None => return,
                },
            }
        }
    }
}

async fn session(
    config: &SyncClientConfig,
    tokens: &dyn TokenSource,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    rooms: &mut HashSet<Uuid>,
    events: &mpsc::Sender<SyncEvent>,
) -> SessionEnd {
    let token = match tokens.token().await {
        Ok(token) => token,
        Err(e) => {
            warn!("Failed to obtain identity token: {}", e);
            return SessionEnd::Dropped { was_connected: false };
        }
    };

    let url = format!("{}?token={}", config.url, token);
    let ws = match connect_async(url.as_str()).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            warn!("Failed to connect sync channel: {}", e);
            return SessionEnd::Dropped { was_connected: false };
        }
    };
    let (mut sink, mut stream) = ws.split();
    let dropped = SessionEnd::Dropped { was_connected: true };

    // Rooms do not survive a dropped connection
    for league_id in rooms.iter() {
        if send(&mut sink, &ClientMessage::JoinLeague { league_id: *league_id }).await.is_err() {
            return dropped;
        }
    }

    let mut refresh = interval_at(
        Instant::now() + config.token_refresh_interval,
        config.token_refresh_interval,
    );

    loop {
        tokio::select! {
            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return dropped,
                    Some(Ok(_)) => continue,
                };
                let Some(event) = into_sync_event(&text) else { continue };
                if events.send(event).await.is_err() {
                    let _ = sink.close().await;
                    return SessionEnd::Shutdown;
                }
            }

            command = commands.recv() => {
                let message = match command {
                    Some(Command::Join(league_id)) => {
                        rooms.insert(league_id);
                        ClientMessage::JoinLeague { league_id }
                    }
                    Some(Command::Leave(league_id)) => {
                        rooms.remove(&league_id);
                        ClientMessage::LeaveLeague { league_id }
                    }
                    Some(Command::Shutdown) | None => {
                        let _ = sink.close().await;
                        return SessionEnd::Shutdown;
                    }
                };
                if send(&mut sink, &message).await.is_err() {
                    return dropped;
                }
            }

            _ = refresh.tick() => {
                match tokens.token().await {
                    Ok(token) => {
                        if send(&mut sink, &ClientMessage::Auth { token }).await.is_err() {
                            return dropped;
                        }
                    }
                    // The server closes the connection at expiry; reconnecting fetches a token again
                    Err(e) => warn!("Token refresh failed: {}", e),
                }
            }
        }
    }
}

async fn send(sink: &mut WsSink, message: &ClientMessage) -> ClientResult<()> {
    let json = message.to_json().map_err(|e| ClientError::Decode(e.to_string()))?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| ClientError::Transport(e.to_string()))
}

fn into_sync_event(text: &str) -> Option<SyncEvent> {
    let message = match ServerMessage::from_json(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Ignoring malformed server frame: {}", e);
            return None;
        }
    };

    match message {
        ServerMessage::Welcome { connection_id, .. } => {
            info!(connection_id = %connection_id, "Sync channel connected");
            Some(SyncEvent::Connected { connection_id })
        }
        ServerMessage::Joined { league_id } => Some(SyncEvent::Joined { league_id }),
        ServerMessage::Error { code, message } => Some(SyncEvent::Rejected { code, message }),
        ServerMessage::AuthResult { success, message } => {
            if !success {
                warn!("Token re-assertion rejected: {}", message);
            }
            None
        }
        ServerMessage::Left { .. } | ServerMessage::Pong { .. } => None,
        message => message.into_event().map(SyncEvent::Delta).or_else(|| {
            debug!("Unhandled server frame");
            None
        }),
    }
}
