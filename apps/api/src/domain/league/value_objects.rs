use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Represents the lifecycle status of a league
///
/// # Status Transitions
/// ```text
/// Draft -> Active -> Completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "league_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LeagueStatus {
    /// Members are drafting chefs onto their rosters
    Draft,
    /// The season is running and scores are updating
    Active,
    /// The season is over
    Completed,
}

impl LeagueStatus {
    /// Checks if a transition from current status to next status is valid
    ///
    /// # Example
    /// ```
    /// use chefleague_api::domain::league::value_objects::LeagueStatus;
    ///
    /// assert!(LeagueStatus::Draft.can_transition_to(LeagueStatus::Active));
    /// assert!(!LeagueStatus::Draft.can_transition_to(LeagueStatus::Completed));
    /// ```
    pub fn can_transition_to(&self, next: LeagueStatus) -> bool {
        use LeagueStatus::*;
        matches!((self, next), (Draft, Active) | (Active, Completed))
    }
}

impl fmt::Display for LeagueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeagueStatus::Draft => write!(f, "draft"),
            LeagueStatus::Active => write!(f, "active"),
            LeagueStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Role a member holds inside a league
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
}

impl MemberRole {
    /// Owners and admins may set scores
    pub fn can_manage_scores(&self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Admin)
    }
}

/// Denormalized user fields carried on a member record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl UserSummary {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            display_name: None,
            avatar_url: None,
        }
    }
}

/// A member's user reference as it may appear in stored or submitted data
///
/// Older documents hold a bare id, newer ones an embedded summary. Both are
/// normalized into a [`UserSummary`] as soon as they are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemberRef {
    ById(Uuid),
    Embedded(UserSummary),
}

impl MemberRef {
    pub fn id(&self) -> Uuid {
        match self {
            MemberRef::ById(id) => *id,
            MemberRef::Embedded(summary) => summary.id,
        }
    }

    /// Canonical form used everywhere past the read boundary
    pub fn normalize(self) -> UserSummary {
        match self {
            MemberRef::ById(id) => UserSummary::new(id),
            MemberRef::Embedded(summary) => summary,
        }
    }
}

impl From<MemberRef> for UserSummary {
    fn from(value: MemberRef) -> Self {
        value.normalize()
    }
}

/// Fixed-point reward table applied by the external scoring controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringSettings {
    pub quickfire_win: Decimal,
    pub elimination_win: Decimal,
    pub top_group: Decimal,
    pub bottom_group: Decimal,
    pub eliminated: Decimal,
    pub season_winner: Decimal,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            quickfire_win: Decimal::from(10),
            elimination_win: Decimal::from(20),
            top_group: Decimal::from(5),
            bottom_group: Decimal::from(-5),
            eliminated: Decimal::from(-10),
            season_winner: Decimal::from(50),
        }
    }
}

/// Invite code value object
///
/// # Invariants
/// - Exactly [`InviteCode::LENGTH`] characters
/// - Only characters from the unambiguous uppercase alphabet
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InviteCode(String);

impl InviteCode {
    pub const LENGTH: usize = 8;

    // No 0/O or 1/I/L
    const ALPHABET: &'static [u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

    /// Generates a fresh random code
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code = (0..Self::LENGTH)
            .map(|_| Self::ALPHABET[rng.gen_range(0..Self::ALPHABET.len())] as char)
            .collect();
        InviteCode(code)
    }

    /// Parses a user-submitted code, case-insensitively
    ///
    /// # Example
    /// ```
    /// use chefleague_api::domain::league::value_objects::InviteCode;
    ///
    /// let code = InviteCode::parse(" abcd2345 ").expect("valid code");
    /// assert_eq!(code.as_str(), "ABCD2345");
    /// ```
    pub fn parse(code: impl AsRef<str>) -> Result<Self, String> {
        let code = code.as_ref().trim().to_uppercase();
        if code.len() != Self::LENGTH {
            return Err(format!("Invite code must be {} characters", Self::LENGTH));
        }
        if !code.bytes().all(|b| Self::ALPHABET.contains(&b)) {
            return Err(format!("Invalid invite code: {}", code));
        }
        Ok(InviteCode(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InviteCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        InviteCode::parse(value)
    }
}

impl From<InviteCode> for String {
    fn from(value: InviteCode) -> Self {
        value.0
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
