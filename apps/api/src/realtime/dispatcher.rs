//! League-scoped event fan-out.
//!
//! One broadcast channel feeds every connection. Room membership lives with
//! the connection that owns it, so publishing never takes a lock and never
//! waits on the store.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::league::LeagueEvent;

/// Slow receivers that fall this far behind skip events
pub const DEFAULT_CAPACITY: usize = 1024;

pub struct SyncDispatcher {
    sender: broadcast::Sender<Arc<LeagueEvent>>,
}

impl SyncDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Opens a connection with no rooms joined
    ///
    /// # Returns
    /// The connection's room state and its event receiver
    pub fn connect(&self, user_id: Uuid) -> (Connection, broadcast::Receiver<Arc<LeagueEvent>>) {
        let connection = Connection {
            id: Uuid::new_v4(),
            user_id,
            rooms: HashSet::new(),
        };
        (connection, self.sender.subscribe())
    }

    /// Relays an event to every connection in the league's room
    ///
    /// Returns how many connections were handed the event before room
    /// filtering.
    pub fn publish(&self, event: LeagueEvent) -> usize {
        tracing::debug!(
            league_id = %event.league_id(),
            version = event.version(),
            "Publishing {}",
            event.event_type()
        );
        // No receivers is fine
        self.sender.send(Arc::new(event)).unwrap_or(0)
    }
}

impl Default for SyncDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Rooms joined by one live connection
///
/// Dropped with the connection; nothing survives a reconnect.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    user_id: Uuid,
    rooms: HashSet<Uuid>,
}

impl Connection {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Returns false if the room was already joined
    pub fn join_room(&mut self, league_id: Uuid) -> bool {
        self.rooms.insert(league_id)
    }

    pub fn leave_room(&mut self, league_id: Uuid) -> bool {
        self.rooms.remove(&league_id)
    }

    pub fn in_room(&self, league_id: Uuid) -> bool {
        self.rooms.contains(&league_id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Uuid> {
        self.rooms.iter()
    }

    pub fn wants(&self, event: &LeagueEvent) -> bool {
        self.in_room(event.league_id())
    }
}
