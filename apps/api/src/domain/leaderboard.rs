//! Leaderboard calculation.
//!
//! Standings are derived from league members on demand and never stored.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::league::value_objects::UserSummary;
use super::league::Member;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user: UserSummary,
    pub score: Decimal,
    pub roster_count: usize,
}

/// Ranks members by score, highest first
///
/// Ties go to whoever joined first. Members with identical scores and join
/// times keep their order in the league.
///
/// # Example
/// ```
/// use chefleague_api::domain::leaderboard::compute_leaderboard;
///
/// assert!(compute_leaderboard(&[]).is_empty());
/// ```
pub fn compute_leaderboard(members: &[Member]) -> Vec<LeaderboardEntry> {
    let mut ranked: Vec<&Member> = members.iter().collect();
    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.joined_at.cmp(&b.joined_at))
    });

    ranked
        .into_iter()
        .enumerate()
        .map(|(index, member)| LeaderboardEntry {
            rank: index + 1,
            user: member.user.clone(),
            score: member.score,
            roster_count: member.roster.len(),
        })
        .collect()
}
