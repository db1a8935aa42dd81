//! Single merge point for the snapshot and delta channels.
//!
//! The two channels are not ordered relative to each other. Every update
//! carries the store version that produced it, and the reconciler only
//! moves forward: a delta at or below the last applied version is
//! discarded, so a late delta can never resurrect values an authoritative
//! snapshot has already replaced.

use tracing::debug;
use uuid::Uuid;

use crate::domain::leaderboard::{compute_leaderboard, LeaderboardEntry};
use crate::domain::league::{League, LeagueEvent};

/// Outcome of offering an update to the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Local state changed; `standings_changed` when members or scores moved
    Applied { standings_changed: bool },
    /// Older than (or as old as) what is already applied
    Stale,
    /// Not applicable: another league, or a delta before the first snapshot
    Ignored,
}

impl Reconciliation {
    pub fn is_applied(&self) -> bool {
        matches!(self, Reconciliation::Applied { .. })
    }
}

/// Local view of one league
#[derive(Debug, Clone)]
pub struct LeagueStateReconciler {
    league_id: Uuid,
    league: Option<League>,
    last_applied_version: i64,
    leaderboard: Vec<LeaderboardEntry>,
}

impl LeagueStateReconciler {
    pub fn new(league_id: Uuid) -> Self {
        Self {
            league_id,
            league: None,
            last_applied_version: 0,
            leaderboard: Vec::new(),
        }
    }

    pub fn league_id(&self) -> Uuid {
        self.league_id
    }

    pub fn league(&self) -> Option<&League> {
        self.league.as_ref()
    }

    pub fn last_applied_version(&self) -> i64 {
        self.last_applied_version
    }

    pub fn leaderboard(&self) -> &[LeaderboardEntry] {
        &self.leaderboard
    }

    /// Replaces local state with a full record
    ///
    /// A snapshot older than the applied version is a refetch that raced a
    /// newer update and is dropped. An equal version replaces local state,
    /// since a snapshot is authoritative for every field.
    pub fn apply_snapshot(&mut self, snapshot: League) -> Reconciliation {
        if snapshot.id() != self.league_id {
            return Reconciliation::Ignored;
        }
        if self.league.is_some() && snapshot.version() < self.last_applied_version {
            debug!(
                league_id = %self.league_id,
                snapshot = snapshot.version(),
                applied = self.last_applied_version,
                "Dropping stale snapshot"
            );
            return Reconciliation::Stale;
        }

        let standings_changed = self
            .league
            .as_ref()
            .map_or(true, |current| current.members() != snapshot.members());

        self.last_applied_version = snapshot.version();
        self.league = Some(snapshot);
        if standings_changed {
            self.recompute_leaderboard();
        }

        Reconciliation::Applied { standings_changed }
    }

    /// Applies a pushed event if it is newer than anything applied so far
    pub fn apply_event(&mut self, event: &LeagueEvent) -> Reconciliation {
        if event.league_id() != self.league_id {
            return Reconciliation::Ignored;
        }
        let Some(league) = self.league.as_mut() else {
            // Nothing to patch yet; the first snapshot will include this change
            debug!(league_id = %self.league_id, "Delta before first snapshot");
            return Reconciliation::Ignored;
        };

        let version = event.version();
        if version <= self.last_applied_version {
            debug!(
                league_id = %self.league_id,
                version,
                applied = self.last_applied_version,
                "Discarding stale {}",
                event.event_type()
            );
            return Reconciliation::Stale;
        }
        if version > self.last_applied_version + 1 {
            debug!(
                league_id = %self.league_id,
                version,
                applied = self.last_applied_version,
                "Version gap in delta channel"
            );
        }

        let standings_changed = match event {
            LeagueEvent::LeagueUpdate(update) => {
                league.apply_delta(&update.updates, version);
                update.updates.touches_standings()
            }
            LeagueEvent::ScoreUpdate(update) => league.apply_score(update.user_id, update.new_score, version),
        };

        self.last_applied_version = version;
        if standings_changed {
            self.recompute_leaderboard();
        }

        Reconciliation::Applied { standings_changed }
    }

    fn recompute_leaderboard(&mut self) {
        self.leaderboard = self
            .league
            .as_ref()
            .map(|league| compute_leaderboard(league.members()))
            .unwrap_or_default();
    }
}
