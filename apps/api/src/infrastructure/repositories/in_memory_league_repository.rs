use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::domain::errors::{LeagueError, LeagueResult, ValidationError};
use crate::domain::league::{InviteCode, League};
use crate::domain::repositories::{LeagueMutator, LeagueRepository};

const CHANGE_FEED_CAPACITY: usize = 1024;

#[derive(Default)]
struct Leagues {
    by_id: HashMap<Uuid, League>,
    by_invite_code: HashMap<InviteCode, Uuid>,
}

/// In-process implementation of LeagueRepository
///
/// Used when no database is configured and throughout the test suite. The
/// write lock is held across read, mutate and commit, which makes
/// `conditional_update` atomic.
pub struct InMemoryLeagueRepository {
    leagues: RwLock<Leagues>,
    changes: broadcast::Sender<Arc<League>>,
}

impl InMemoryLeagueRepository {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            leagues: RwLock::new(Leagues::default()),
            changes,
        }
    }

    fn publish(&self, league: &League) {
        // No subscribers is fine
        let _ = self.changes.send(Arc::new(league.clone()));
    }
}

impl Default for InMemoryLeagueRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeagueRepository for InMemoryLeagueRepository {
    async fn get(&self, id: Uuid) -> LeagueResult<League> {
        self.leagues
            .read()
            .await
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| LeagueError::NotFound(id.to_string()))
    }

    async fn find_by_invite_code(&self, code: &InviteCode) -> LeagueResult<League> {
        let leagues = self.leagues.read().await;
        leagues
            .by_invite_code
            .get(code)
            .and_then(|id| leagues.by_id.get(id))
            .cloned()
            .ok_or_else(|| LeagueError::NotFound(format!("invite code {}", code)))
    }

    async fn create(&self, league: &League) -> LeagueResult<League> {
        let mut leagues = self.leagues.write().await;

        if leagues.by_invite_code.contains_key(league.invite_code()) {
            return Err(ValidationError::DuplicateInviteCode.into());
        }
        if leagues.by_id.contains_key(&league.id()) {
            return Err(LeagueError::Store(format!("League already exists: {}", league.id())));
        }

        leagues
            .by_invite_code
            .insert(league.invite_code().clone(), league.id());
        leagues.by_id.insert(league.id(), league.clone());
        drop(leagues);

        self.publish(league);
        Ok(league.clone())
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        mutator: LeagueMutator<'_>,
    ) -> LeagueResult<League> {
        let mut leagues = self.leagues.write().await;

        let mut candidate = leagues
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| LeagueError::NotFound(id.to_string()))?;

        if candidate.version() != expected_version {
            return Err(LeagueError::conflict(id));
        }

        mutator(&mut candidate)?;
        candidate.set_version(expected_version + 1);

        leagues.by_id.insert(id, candidate.clone());
        drop(leagues);

        self.publish(&candidate);
        Ok(candidate)
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<League>> {
        self.changes.subscribe()
    }
}
