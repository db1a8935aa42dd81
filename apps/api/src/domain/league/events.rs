use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::league::{League, Member};
use super::value_objects::LeagueStatus;

/// Changed fields of a league; absent fields are untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LeagueStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_week: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<Member>>,
}

impl LeagueDelta {
    pub fn touches_standings(&self) -> bool {
        self.members.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueUpdate {
    pub league_id: Uuid,
    pub updates: LeagueDelta,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    pub league_id: Uuid,
    pub user_id: Uuid,
    pub new_score: Decimal,
    pub version: i64,
}

/// Domain events that occur within the League aggregate
///
/// Produced after a mutation commits; each carries the store version that
/// produced it so that receivers can order them against snapshots.
///
/// # Example
/// ```
/// use chefleague_api::domain::league::events::{LeagueEvent, ScoreUpdate};
/// use rust_decimal::Decimal;
/// use uuid::Uuid;
///
/// let event = LeagueEvent::ScoreUpdate(ScoreUpdate {
///     league_id: Uuid::new_v4(),
///     user_id: Uuid::new_v4(),
///     new_score: Decimal::from(30),
///     version: 8,
/// });
/// assert_eq!(event.version(), 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeagueEvent {
    LeagueUpdate(LeagueUpdate),
    ScoreUpdate(ScoreUpdate),
}

impl LeagueEvent {
    /// Membership or rosters changed
    pub fn members_changed(league: &League) -> Self {
        LeagueEvent::LeagueUpdate(LeagueUpdate {
            league_id: league.id(),
            updates: LeagueDelta {
                members: Some(league.members().to_vec()),
                ..LeagueDelta::default()
            },
            version: league.version(),
        })
    }

    pub fn status_changed(league: &League) -> Self {
        LeagueEvent::LeagueUpdate(LeagueUpdate {
            league_id: league.id(),
            updates: LeagueDelta {
                status: Some(league.status()),
                ..LeagueDelta::default()
            },
            version: league.version(),
        })
    }

    pub fn score_changed(league: &League, user_id: Uuid, new_score: Decimal) -> Self {
        LeagueEvent::ScoreUpdate(ScoreUpdate {
            league_id: league.id(),
            user_id,
            new_score,
            version: league.version(),
        })
    }

    pub fn league_id(&self) -> Uuid {
        match self {
            LeagueEvent::LeagueUpdate(update) => update.league_id,
            LeagueEvent::ScoreUpdate(update) => update.league_id,
        }
    }

    pub fn version(&self) -> i64 {
        match self {
            LeagueEvent::LeagueUpdate(update) => update.version,
            LeagueEvent::ScoreUpdate(update) => update.version,
        }
    }

    /// Wire name of the event
    pub fn event_type(&self) -> &'static str {
        match self {
            LeagueEvent::LeagueUpdate(_) => "league_update",
            LeagueEvent::ScoreUpdate(_) => "score_update",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::league::value_objects::UserSummary;
    use crate::domain::league::NewLeague;

    fn league() -> League {
        League::new(
            UserSummary::new(Uuid::new_v4()),
            NewLeague {
                name: "Events".to_string(),
                season: 1,
                max_members: None,
                max_roster_size: None,
                scoring_settings: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn members_changed_carries_members_and_version() {
        let league = league();
        let event = LeagueEvent::members_changed(&league);

        assert_eq!(event.league_id(), league.id());
        assert_eq!(event.version(), league.version());
        assert_eq!(event.event_type(), "league_update");
        match event {
            LeagueEvent::LeagueUpdate(update) => {
                assert_eq!(update.updates.members.as_deref(), Some(league.members()));
                assert!(update.updates.status.is_none());
            }
            _ => panic!("Expected LeagueUpdate event"),
        }
    }

    #[test]
    fn delta_serializes_only_changed_fields() {
        let delta = LeagueDelta {
            status: Some(LeagueStatus::Active),
            ..LeagueDelta::default()
        };

        let json = serde_json::to_value(&delta).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "active" }));
        assert!(!delta.touches_standings());
    }
}
