// League domain module
// Contains the league aggregate root, value objects, and domain events

#![allow(clippy::module_inception)]

pub mod events;
pub mod league;
pub mod value_objects;

// Re-export main types for convenience
pub use events::{LeagueDelta, LeagueEvent, LeagueUpdate, ScoreUpdate};
pub use league::{League, Member, NewLeague, RosterEntry};
pub use value_objects::{InviteCode, LeagueStatus, MemberRef, MemberRole, UserSummary};
