use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{AuthorizationError, LeagueError, LeagueResult, ValidationError};
use crate::domain::leaderboard::{compute_leaderboard, LeaderboardEntry};
use crate::domain::league::{InviteCode, League, LeagueEvent, LeagueStatus, NewLeague, UserSummary};
use crate::domain::repositories::LeagueRepository;
use crate::realtime::SyncDispatcher;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const INVITE_CODE_ATTEMPTS: u32 = 5;

/// Applies league mutations with at-most-one-winner semantics
///
/// Every change is validated against a fresh read and committed through the
/// repository's conditional update. A lost race re-reads and re-validates,
/// up to `max_attempts` times, so under any number of concurrent drafts of
/// one chef exactly one succeeds. Committed changes are then relayed to the
/// league's room.
pub struct LeagueService {
    store: Arc<dyn LeagueRepository>,
    dispatcher: Arc<SyncDispatcher>,
    max_attempts: u32,
}

impl LeagueService {
    pub fn new(store: Arc<dyn LeagueRepository>, dispatcher: Arc<SyncDispatcher>) -> Self {
        Self::with_max_attempts(store, dispatcher, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(
        store: Arc<dyn LeagueRepository>,
        dispatcher: Arc<SyncDispatcher>,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            dispatcher,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Creates a league with `owner` as its only member
    ///
    /// Retries with a fresh invite code if the generated one is taken.
    pub async fn create_league(&self, owner: UserSummary, input: NewLeague) -> LeagueResult<League> {
        let mut league = League::new(owner, input)?;

        for attempt in 1..=INVITE_CODE_ATTEMPTS {
            match self.store.create(&league).await {
                Ok(created) => {
                    info!(league_id = %created.id(), "League created");
                    return Ok(created);
                }
                Err(LeagueError::Validation(ValidationError::DuplicateInviteCode))
                    if attempt < INVITE_CODE_ATTEMPTS =>
                {
                    warn!(attempt, "Invite code collision, regenerating");
                    league.regenerate_invite_code();
                }
                Err(e) => return Err(e),
            }
        }

        Err(ValidationError::DuplicateInviteCode.into())
    }

    pub async fn get_league(&self, league_id: Uuid) -> LeagueResult<League> {
        self.store.get(league_id).await
    }

    /// Loads a league on behalf of one of its members
    pub async fn get_league_for(&self, league_id: Uuid, user_id: Uuid) -> LeagueResult<League> {
        let league = self.store.get(league_id).await?;
        if !league.is_member(user_id) {
            return Err(AuthorizationError::NotAMember.into());
        }
        Ok(league)
    }

    pub async fn leaderboard(&self, league_id: Uuid, user_id: Uuid) -> LeagueResult<Vec<LeaderboardEntry>> {
        let league = self.get_league_for(league_id, user_id).await?;
        Ok(compute_leaderboard(league.members()))
    }

    /// Redeems an invite code for `user`
    pub async fn join_league_with_code(&self, code: &InviteCode, user: UserSummary) -> LeagueResult<League> {
        let league_id = self.store.find_by_invite_code(code).await?.id();
        let user_id = user.id;

        let league = self
            .commit_with_retry(league_id, |league| league.add_member(user.clone(), Utc::now()))
            .await?;

        info!(league_id = %league_id, user_id = %user_id, version = league.version(), "Member joined");
        self.dispatcher.publish(LeagueEvent::members_changed(&league));
        Ok(league)
    }

    /// Puts `chef_id` on the roster of `user_id`
    pub async fn draft_chef(&self, league_id: Uuid, user_id: Uuid, chef_id: &str) -> LeagueResult<League> {
        let chef_id = chef_id.trim();
        if chef_id.is_empty() {
            return Err(ValidationError::InvalidInput("Chef id cannot be empty".to_string()).into());
        }

        let league = self
            .commit_with_retry(league_id, |league| league.draft_chef(user_id, chef_id, Utc::now()))
            .await?;

        info!(
            league_id = %league_id,
            user_id = %user_id,
            chef_id,
            version = league.version(),
            "Chef drafted"
        );
        self.dispatcher.publish(LeagueEvent::members_changed(&league));
        Ok(league)
    }

    /// Sets a member's score as reported by the challenge catalog
    pub async fn set_score(
        &self,
        league_id: Uuid,
        actor_id: Uuid,
        user_id: Uuid,
        score: Decimal,
    ) -> LeagueResult<League> {
        let league = self
            .commit_with_retry(league_id, |league| league.set_score(actor_id, user_id, score))
            .await?;

        debug!(league_id = %league_id, user_id = %user_id, %score, "Score updated");
        self.dispatcher
            .publish(LeagueEvent::score_changed(&league, user_id, score));
        Ok(league)
    }

    pub async fn set_status(&self, league_id: Uuid, actor_id: Uuid, status: LeagueStatus) -> LeagueResult<League> {
        let league = self
            .commit_with_retry(league_id, |league| league.transition_to(actor_id, status))
            .await?;

        info!(league_id = %league_id, %status, "League status changed");
        self.dispatcher.publish(LeagueEvent::status_changed(&league));
        Ok(league)
    }

    /// Read, validate, conditionally commit; on a lost race start over
    async fn commit_with_retry<F>(&self, league_id: Uuid, mutate: F) -> LeagueResult<League>
    where
        F: Fn(&mut League) -> LeagueResult<()> + Send + Sync,
    {
        for attempt in 1..=self.max_attempts {
            let current = self.store.get(league_id).await?;

            // Rejections surface straight away, before any write
            let mut candidate = current.clone();
            mutate(&mut candidate)?;

            match self
                .store
                .conditional_update(league_id, current.version(), Box::new(|league: &mut League| mutate(league)))
                .await
            {
                Ok(league) => return Ok(league),
                Err(e) if e.is_conflict() => {
                    debug!(league_id = %league_id, attempt, "Version conflict, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        warn!(league_id = %league_id, attempts = self.max_attempts, "Giving up after repeated conflicts");
        Err(LeagueError::ConcurrencyConflict {
            league_id,
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::league::LeagueDelta;
    use crate::domain::repositories::LeagueMutator;
    use crate::infrastructure::repositories::InMemoryLeagueRepository;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::broadcast;

    fn new_league(max_members: u32, max_roster_size: u32) -> NewLeague {
        NewLeague {
            name: "Service league".to_string(),
            season: 21,
            max_members: Some(max_members),
            max_roster_size: Some(max_roster_size),
            scoring_settings: None,
        }
    }

    fn service() -> (Arc<LeagueService>, Arc<SyncDispatcher>) {
        let dispatcher = Arc::new(SyncDispatcher::default());
        let store = Arc::new(InMemoryLeagueRepository::new());
        (Arc::new(LeagueService::new(store, dispatcher.clone())), dispatcher)
    }

    async fn league_with_members(
        service: &LeagueService,
        max_members: u32,
        max_roster_size: u32,
        extra: usize,
    ) -> (League, Vec<Uuid>) {
        let owner = UserSummary::new(Uuid::new_v4());
        let mut league = service
            .create_league(owner.clone(), new_league(max_members, max_roster_size))
            .await
            .unwrap();
        let mut ids = vec![owner.id];
        for _ in 0..extra {
            let user = UserSummary::new(Uuid::new_v4());
            ids.push(user.id);
            league = service
                .join_league_with_code(&league.invite_code().clone(), user)
                .await
                .unwrap();
        }
        (league, ids)
    }

    #[tokio::test]
    async fn create_then_get_returns_same_league() {
        let (service, _) = service();
        let owner = UserSummary::new(Uuid::new_v4());

        let created = service.create_league(owner.clone(), new_league(4, 3)).await.unwrap();
        let loaded = service.get_league(created.id()).await.unwrap();

        assert_eq!(loaded, created);
        assert!(!loaded.invite_code().as_str().is_empty());
        assert_eq!(loaded.members()[0].user, owner);
    }

    #[tokio::test]
    async fn draft_publishes_league_update_with_committed_version() {
        let (service, dispatcher) = service();
        let (league, ids) = league_with_members(&service, 4, 3, 0).await;
        let (mut conn, mut rx) = dispatcher.connect(ids[0]);
        conn.join_room(league.id());

        let updated = service.draft_chef(league.id(), ids[0], "chef123").await.unwrap();

        let event = rx.recv().await.unwrap();
        assert!(conn.wants(&event));
        assert_eq!(event.version(), updated.version());
        assert_eq!(updated.version(), league.version() + 1);
    }

    #[tokio::test]
    async fn draft_in_active_league_fails_and_leaves_state_unchanged() {
        let (service, _) = service();
        let (league, ids) = league_with_members(&service, 4, 3, 0).await;
        let active = service
            .set_status(league.id(), ids[0], LeagueStatus::Active)
            .await
            .unwrap();

        let result = service.draft_chef(league.id(), ids[0], "chef1").await;

        assert_eq!(result, Err(LeagueError::from(ValidationError::NotDraftPhase)));
        assert_eq!(service.get_league(league.id()).await.unwrap(), active);
    }

    #[tokio::test]
    async fn draft_by_outsider_is_not_a_member() {
        let (service, _) = service();
        let (league, _) = league_with_members(&service, 4, 3, 0).await;

        let result = service.draft_chef(league.id(), Uuid::new_v4(), "chef1").await;

        assert_eq!(result, Err(LeagueError::from(AuthorizationError::NotAMember)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_drafts_of_one_chef_have_one_winner() {
        let (service, _) = service();
        let (league, ids) = league_with_members(&service, 4, 5, 1).await;
        let (user_a, user_b) = (ids[0], ids[1]);
        let league_id = league.id();

        let a = {
            let service = service.clone();
            tokio::spawn(async move { service.draft_chef(league_id, user_a, "chef123").await })
        };
        let b = {
            let service = service.clone();
            tokio::spawn(async move { service.draft_chef(league_id, user_b, "chef123").await })
        };
        let results = vec![a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(LeagueError::Validation(ValidationError::AlreadyDrafted(chef))) if chef == "chef123"
        )));

        let stored = service.get_league(league.id()).await.unwrap();
        let holders = stored.members().iter().filter(|m| m.has_chef("chef123")).count();
        assert_eq!(holders, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_concurrent_drafts_never_duplicate_a_chef() {
        let (service, _) = service();
        let (league, ids) = league_with_members(&service, 12, 5, 11).await;
        let league_id = league.id();

        let handles: Vec<_> = ids
            .iter()
            .map(|&user_id| {
                let service = service.clone();
                tokio::spawn(async move { service.draft_chef(league_id, user_id, "chef-star").await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        let stored = service.get_league(league.id()).await.unwrap();
        assert_eq!(stored.members().iter().filter(|m| m.has_chef("chef-star")).count(), 1);
    }

    #[tokio::test]
    async fn join_full_league_fails_without_changing_membership() {
        let (service, _) = service();
        let (league, _) = league_with_members(&service, 2, 3, 1).await;
        let before = service.get_league(league.id()).await.unwrap();

        let result = service
            .join_league_with_code(league.invite_code(), UserSummary::new(Uuid::new_v4()))
            .await;

        assert_eq!(result, Err(LeagueError::from(ValidationError::LeagueFull)));
        let after = service.get_league(league.id()).await.unwrap();
        assert_eq!(after.members().len(), before.members().len());
        assert_eq!(after.version(), before.version());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_joins_never_overfill() {
        let (service, _) = service();
        let (league, _) = league_with_members(&service, 5, 3, 0).await;

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let service = service.clone();
                let code = league.invite_code().clone();
                tokio::spawn(async move {
                    service
                        .join_league_with_code(&code, UserSummary::new(Uuid::new_v4()))
                        .await
                })
            })
            .collect();

        let mut joined = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => joined += 1,
                Err(e) => assert!(
                    e == LeagueError::from(ValidationError::LeagueFull) || e.is_conflict(),
                    "unexpected error: {e}"
                ),
            }
        }

        assert_eq!(joined, 4);
        assert_eq!(service.get_league(league.id()).await.unwrap().members().len(), 5);
    }

    #[tokio::test]
    async fn join_with_unknown_code_is_not_found() {
        let (service, _) = service();

        let result = service
            .join_league_with_code(&InviteCode::generate(), UserSummary::new(Uuid::new_v4()))
            .await;

        assert!(matches!(result, Err(LeagueError::NotFound(_))));
    }

    #[tokio::test]
    async fn set_score_publishes_score_update() {
        let (service, dispatcher) = service();
        let (league, ids) = league_with_members(&service, 4, 3, 1).await;
        let (_conn, mut rx) = dispatcher.connect(ids[0]);

        let updated = service
            .set_score(league.id(), ids[0], ids[1], Decimal::from(30))
            .await
            .unwrap();

        match rx.recv().await.unwrap().as_ref() {
            LeagueEvent::ScoreUpdate(update) => {
                assert_eq!(update.user_id, ids[1]);
                assert_eq!(update.new_score, Decimal::from(30));
                assert_eq!(update.version, updated.version());
            }
            other => panic!("Expected ScoreUpdate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn plain_member_cannot_set_scores() {
        let (service, _) = service();
        let (league, ids) = league_with_members(&service, 4, 3, 1).await;

        let result = service
            .set_score(league.id(), ids[1], ids[1], Decimal::from(100))
            .await;

        assert_eq!(result, Err(LeagueError::from(AuthorizationError::InsufficientRole)));
    }

    #[tokio::test]
    async fn leaderboard_requires_membership() {
        let (service, _) = service();
        let (league, ids) = league_with_members(&service, 4, 3, 2).await;
        service.set_score(league.id(), ids[0], ids[0], Decimal::from(10)).await.unwrap();
        service.set_score(league.id(), ids[0], ids[1], Decimal::from(30)).await.unwrap();
        service.set_score(league.id(), ids[0], ids[2], Decimal::from(20)).await.unwrap();

        let board = service.leaderboard(league.id(), ids[2]).await.unwrap();
        let order: Vec<Uuid> = board.iter().map(|e| e.user.id).collect();
        assert_eq!(order, vec![ids[1], ids[2], ids[0]]);

        let outsider = service.leaderboard(league.id(), Uuid::new_v4()).await;
        assert_eq!(outsider, Err(LeagueError::from(AuthorizationError::NotAMember)));
    }

    /// Store whose conditional updates always lose the race
    struct AlwaysConflicting {
        inner: InMemoryLeagueRepository,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl LeagueRepository for AlwaysConflicting {
        async fn get(&self, id: Uuid) -> LeagueResult<League> {
            self.inner.get(id).await
        }

        async fn find_by_invite_code(&self, code: &InviteCode) -> LeagueResult<League> {
            self.inner.find_by_invite_code(code).await
        }

        async fn create(&self, league: &League) -> LeagueResult<League> {
            self.inner.create(league).await
        }

        async fn conditional_update(
            &self,
            id: Uuid,
            _expected_version: i64,
            _mutator: LeagueMutator<'_>,
        ) -> LeagueResult<League> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(LeagueError::conflict(id))
        }

        fn subscribe(&self) -> broadcast::Receiver<Arc<League>> {
            self.inner.subscribe()
        }
    }

    #[tokio::test]
    async fn conflict_surfaces_after_bounded_retries() {
        let store = Arc::new(AlwaysConflicting {
            inner: InMemoryLeagueRepository::new(),
            attempts: AtomicU32::new(0),
        });
        let service = LeagueService::with_max_attempts(store.clone(), Arc::new(SyncDispatcher::default()), 3);
        let owner = UserSummary::new(Uuid::new_v4());
        let league = service.create_league(owner.clone(), new_league(4, 3)).await.unwrap();

        let result = service.draft_chef(league.id(), owner.id, "chef1").await;

        assert_eq!(
            result,
            Err(LeagueError::ConcurrencyConflict {
                league_id: league.id(),
                attempts: 3
            })
        );
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn status_change_is_published_as_delta() {
        let (service, dispatcher) = service();
        let (league, ids) = league_with_members(&service, 4, 3, 0).await;
        let (_conn, mut rx) = dispatcher.connect(ids[0]);

        service.set_status(league.id(), ids[0], LeagueStatus::Active).await.unwrap();

        match rx.recv().await.unwrap().as_ref() {
            LeagueEvent::LeagueUpdate(update) => assert_eq!(
                update.updates,
                LeagueDelta {
                    status: Some(LeagueStatus::Active),
                    ..LeagueDelta::default()
                }
            ),
            other => panic!("Expected LeagueUpdate, got {:?}", other),
        }
    }
}
