use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::errors::LeagueResult;
use crate::domain::league::{InviteCode, League};

/// Mutation applied to a freshly read league inside a conditional update
pub type LeagueMutator<'a> = Box<dyn FnOnce(&mut League) -> LeagueResult<()> + Send + 'a>;

/// Repository trait for the League aggregate
///
/// The durable source of truth for league state. `conditional_update` is the
/// only way to change an existing league: implementations must make the
/// version check and the write a single atomic step, so that no two writes
/// ever commit against the same version.
#[async_trait]
pub trait LeagueRepository: Send + Sync {
    /// Find a league by its ID; `NotFound` if absent
    async fn get(&self, id: Uuid) -> LeagueResult<League>;

    /// Find the league an invite code belongs to; `NotFound` if absent
    async fn find_by_invite_code(&self, code: &InviteCode) -> LeagueResult<League>;

    /// Insert a new league; `DuplicateInviteCode` if the code is taken
    async fn create(&self, league: &League) -> LeagueResult<League>;

    /// Apply `mutator` and commit only if the stored version is still
    /// `expected_version`
    ///
    /// # Returns
    /// * `Ok(League)` - The committed league with its version incremented
    /// * `Err(ConcurrencyConflict)` - Another write committed first
    /// * `Err(_)` - Whatever the mutator rejected with; nothing is written
    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        mutator: LeagueMutator<'_>,
    ) -> LeagueResult<League>;

    /// Change feed: every committed league snapshot, across all leagues
    fn subscribe(&self) -> broadcast::Receiver<Arc<League>>;
}
