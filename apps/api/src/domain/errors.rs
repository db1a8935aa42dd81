use thiserror::Error;
use uuid::Uuid;

/// Rule violations; surfaced to the caller and never retried
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("League is not in the draft phase")]
    NotDraftPhase,

    #[error("Roster is full")]
    RosterFull,

    #[error("Chef {0} has already been drafted in this league")]
    AlreadyDrafted(String),

    #[error("League is full")]
    LeagueFull,

    #[error("User is already a member of this league")]
    AlreadyMember,

    #[error("Invite code is already in use")]
    DuplicateInviteCode,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("{0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("User is not a member of this league")]
    NotAMember,

    #[error("Insufficient role for this operation")]
    InsufficientRole,
}

/// Errors produced by the league store and the engine built on top of it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeagueError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error("League not found: {0}")]
    NotFound(String),

    #[error("Concurrent modification of league {league_id} (gave up after {attempts} attempts)")]
    ConcurrencyConflict { league_id: Uuid, attempts: u32 },

    #[error("Store error: {0}")]
    Store(String),
}

impl LeagueError {
    pub fn conflict(league_id: Uuid) -> Self {
        LeagueError::ConcurrencyConflict {
            league_id,
            attempts: 1,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, LeagueError::ConcurrencyConflict { .. })
    }

    /// Stable machine-readable code used on the wire
    pub fn code(&self) -> &'static str {
        match self {
            LeagueError::Validation(e) => match e {
                ValidationError::NotDraftPhase => "NOT_DRAFT_PHASE",
                ValidationError::RosterFull => "ROSTER_FULL",
                ValidationError::AlreadyDrafted(_) => "ALREADY_DRAFTED",
                ValidationError::LeagueFull => "LEAGUE_FULL",
                ValidationError::AlreadyMember => "ALREADY_MEMBER",
                ValidationError::DuplicateInviteCode => "DUPLICATE_INVITE_CODE",
                ValidationError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
                ValidationError::InvalidInput(_) => "INVALID_INPUT",
            },
            LeagueError::Authorization(AuthorizationError::NotAMember) => "NOT_A_MEMBER",
            LeagueError::Authorization(AuthorizationError::InsufficientRole) => "INSUFFICIENT_ROLE",
            LeagueError::NotFound(_) => "NOT_FOUND",
            LeagueError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            LeagueError::Store(_) => "STORE_ERROR",
        }
    }
}

pub type LeagueResult<T> = Result<T, LeagueError>;
