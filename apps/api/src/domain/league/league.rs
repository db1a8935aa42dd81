use super::events::LeagueDelta;
use super::value_objects::{
    InviteCode, LeagueStatus, MemberRef, MemberRole, ScoringSettings, UserSummary,
};
use crate::domain::errors::{AuthorizationError, LeagueError, ValidationError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_MAX_MEMBERS: u32 = 12;
pub const DEFAULT_MAX_ROSTER_SIZE: u32 = 5;
/// Upper bound for both capacities; fits the store's INTEGER columns
pub const MAX_CAPACITY: u32 = 1000;

/// A chef placed on a member's roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub chef_id: String,
    pub drafted_at: DateTime<Utc>,
    pub active: bool,
}

/// A user participating in a league
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredMember")]
pub struct Member {
    pub user: UserSummary,
    pub role: MemberRole,
    pub score: Decimal,
    pub roster: Vec<RosterEntry>,
    pub joined_at: DateTime<Utc>,
}

/// Member as found in documents, with either user reference shape
#[derive(Deserialize)]
struct StoredMember {
    user: MemberRef,
    role: MemberRole,
    #[serde(default)]
    score: Decimal,
    #[serde(default)]
    roster: Vec<RosterEntry>,
    joined_at: DateTime<Utc>,
}

impl From<StoredMember> for Member {
    fn from(stored: StoredMember) -> Self {
        Self {
            user: stored.user.normalize(),
            role: stored.role,
            score: stored.score,
            roster: stored.roster,
            joined_at: stored.joined_at,
        }
    }
}

impl Member {
    pub fn new(user: UserSummary, role: MemberRole, joined_at: DateTime<Utc>) -> Self {
        Self {
            user,
            role,
            score: Decimal::ZERO,
            roster: Vec::new(),
            joined_at,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn has_chef(&self, chef_id: &str) -> bool {
        self.roster.iter().any(|entry| entry.chef_id == chef_id)
    }
}

/// Input for creating a league
#[derive(Debug, Clone)]
pub struct NewLeague {
    pub name: String,
    pub season: i32,
    pub max_members: Option<u32>,
    pub max_roster_size: Option<u32>,
    pub scoring_settings: Option<ScoringSettings>,
}

/// League aggregate root
///
/// The unit of consistency for membership, rosters and scores. Every
/// accepted mutation goes through the store's conditional update, which
/// bumps `version`.
///
/// # Invariants
/// - A chef id appears in at most one roster
/// - No roster exceeds `max_roster_size`
/// - Member count never exceeds `max_members`
/// - Rosters only change while status is `Draft`
///
/// # Example
/// ```
/// use chefleague_api::domain::league::{League, NewLeague};
/// use chefleague_api::domain::league::value_objects::UserSummary;
/// use uuid::Uuid;
///
/// let owner = UserSummary::new(Uuid::new_v4());
/// let league = League::new(
///     owner.clone(),
///     NewLeague {
///         name: "Season 21 Pool".to_string(),
///         season: 21,
///         max_members: None,
///         max_roster_size: None,
///         scoring_settings: None,
///     },
/// )
/// .expect("valid league");
///
/// assert_eq!(league.members().len(), 1);
/// assert!(league.is_member(owner.id));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct League {
    id: Uuid,
    name: String,
    season: i32,
    status: LeagueStatus,
    max_members: u32,
    max_roster_size: u32,
    invite_code: InviteCode,
    scoring_settings: ScoringSettings,
    current_week: i32,
    members: Vec<Member>,
    version: i64,
    created_at: DateTime<Utc>,
}

impl League {
    /// Creates a new league owned by `owner`
    ///
    /// # Business Rules Enforced
    /// - Name must not be empty
    /// - Capacities must be between 1 and `MAX_CAPACITY`
    /// - Owner is the sole initial member with score 0 and an empty roster
    pub fn new(owner: UserSummary, input: NewLeague) -> Result<Self, LeagueError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::InvalidInput("League name cannot be empty".to_string()).into());
        }

        let max_members = input.max_members.unwrap_or(DEFAULT_MAX_MEMBERS);
        let max_roster_size = input.max_roster_size.unwrap_or(DEFAULT_MAX_ROSTER_SIZE);
        if max_members == 0 || max_roster_size == 0 {
            return Err(ValidationError::InvalidInput(
                "League capacities must be at least 1".to_string(),
            )
            .into());
        }
        if max_members > MAX_CAPACITY || max_roster_size > MAX_CAPACITY {
            return Err(ValidationError::InvalidInput(format!(
                "League capacities cannot exceed {}",
                MAX_CAPACITY
            ))
            .into());
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            season: input.season,
            status: LeagueStatus::Draft,
            max_members,
            max_roster_size,
            invite_code: InviteCode::generate(),
            scoring_settings: input.scoring_settings.unwrap_or_default(),
            current_week: 0,
            members: vec![Member::new(owner, MemberRole::Owner, now)],
            version: 1,
            created_at: now,
        })
    }

    // ===== Rules =====

    /// Checks every precondition of a draft without mutating
    pub fn check_draft(&self, user_id: Uuid, chef_id: &str) -> Result<(), LeagueError> {
        if self.status != LeagueStatus::Draft {
            return Err(LeagueError::from(ValidationError::NotDraftPhase));
        }

        let member = self.member(user_id).ok_or(AuthorizationError::NotAMember)?;

        if member.roster.len() >= self.max_roster_size as usize {
            return Err(LeagueError::from(ValidationError::RosterFull));
        }

        if self.chef_owner(chef_id).is_some() {
            return Err(ValidationError::AlreadyDrafted(chef_id.to_string()).into());
        }

        Ok(())
    }

    /// Appends `chef_id` to the member's roster
    pub fn draft_chef(
        &mut self,
        user_id: Uuid,
        chef_id: &str,
        drafted_at: DateTime<Utc>,
    ) -> Result<(), LeagueError> {
        self.check_draft(user_id, chef_id)?;

        let member = self
            .member_mut(user_id)
            .ok_or(AuthorizationError::NotAMember)?;
        member.roster.push(RosterEntry {
            chef_id: chef_id.to_string(),
            drafted_at,
            active: true,
        });

        Ok(())
    }

    pub fn check_join(&self, user_id: Uuid) -> Result<(), LeagueError> {
        if self.is_member(user_id) {
            return Err(LeagueError::from(ValidationError::AlreadyMember));
        }
        if self.members.len() >= self.max_members as usize {
            return Err(LeagueError::from(ValidationError::LeagueFull));
        }
        Ok(())
    }

    /// Adds a plain member
    pub fn add_member(
        &mut self,
        user: UserSummary,
        joined_at: DateTime<Utc>,
    ) -> Result<(), LeagueError> {
        self.check_join(user.id)?;
        self.members.push(Member::new(user, MemberRole::Member, joined_at));
        Ok(())
    }

    /// Sets a member's score on behalf of an owner or admin
    pub fn set_score(
        &mut self,
        actor_id: Uuid,
        user_id: Uuid,
        score: Decimal,
    ) -> Result<(), LeagueError> {
        let actor = self.member(actor_id).ok_or(AuthorizationError::NotAMember)?;
        if !actor.role.can_manage_scores() {
            return Err(LeagueError::from(AuthorizationError::InsufficientRole));
        }

        let member = self
            .member_mut(user_id)
            .ok_or(AuthorizationError::NotAMember)?;
        member.score = score;
        Ok(())
    }

    /// Moves the league along its lifecycle; owner only
    pub fn transition_to(&mut self, actor_id: Uuid, next: LeagueStatus) -> Result<(), LeagueError> {
        let actor = self.member(actor_id).ok_or(AuthorizationError::NotAMember)?;
        if actor.role != MemberRole::Owner {
            return Err(LeagueError::from(AuthorizationError::InsufficientRole));
        }

        if !self.status.can_transition_to(next) {
            return Err(ValidationError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            }
            .into());
        }

        self.status = next;
        Ok(())
    }

    /// Applies a partial update received over the push channel
    pub fn apply_delta(&mut self, delta: &LeagueDelta, version: i64) {
        if let Some(name) = &delta.name {
            self.name = name.clone();
        }
        if let Some(status) = delta.status {
            self.status = status;
        }
        if let Some(week) = delta.current_week {
            self.current_week = week;
        }
        if let Some(members) = &delta.members {
            self.members = members.clone();
        }
        self.version = version;
    }

    /// Applies a pushed score change; returns false for unknown members
    pub fn apply_score(&mut self, user_id: Uuid, score: Decimal, version: i64) -> bool {
        self.version = version;
        match self.member_mut(user_id) {
            Some(member) => {
                member.score = score;
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    pub(crate) fn regenerate_invite_code(&mut self) {
        self.invite_code = InviteCode::generate();
    }

    // ===== Getters =====

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn season(&self) -> i32 {
        self.season
    }

    pub fn status(&self) -> LeagueStatus {
        self.status
    }

    pub fn max_members(&self) -> u32 {
        self.max_members
    }

    pub fn max_roster_size(&self) -> u32 {
        self.max_roster_size
    }

    pub fn invite_code(&self) -> &InviteCode {
        &self.invite_code
    }

    pub fn scoring_settings(&self) -> &ScoringSettings {
        &self.scoring_settings
    }

    pub fn current_week(&self) -> i32 {
        self.current_week
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn member(&self, user_id: Uuid) -> Option<&Member> {
        self.members.iter().find(|m| m.user_id() == user_id)
    }

    fn member_mut(&mut self, user_id: Uuid) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.user_id() == user_id)
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.member(user_id).is_some()
    }

    /// Member whose roster holds `chef_id`, if any
    pub fn chef_owner(&self, chef_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.has_chef(chef_id))
    }

    /// Reconstructs a League from persistence layer data
    ///
    /// Bypasses business rule validation; only for repository implementations.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persistence(
        id: Uuid,
        name: String,
        season: i32,
        status: LeagueStatus,
        max_members: u32,
        max_roster_size: u32,
        invite_code: InviteCode,
        scoring_settings: ScoringSettings,
        current_week: i32,
        members: Vec<Member>,
        version: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            season,
            status,
            max_members,
            max_roster_size,
            invite_code,
            scoring_settings,
            current_week,
            members,
            version,
            created_at,
        }
    }
}
