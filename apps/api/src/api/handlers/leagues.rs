use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::middleware::JwtAuth;
use crate::domain::leaderboard::LeaderboardEntry;
use crate::domain::league::value_objects::ScoringSettings;
use crate::domain::league::{InviteCode, League, LeagueStatus, NewLeague};
use crate::state::AppState;

/// Request body for creating a league
#[derive(Debug, Deserialize)]
pub struct CreateLeagueRequest {
    pub name: String,
    pub season: i32,
    pub max_members: Option<u32>,
    pub max_roster_size: Option<u32>,
    pub scoring_settings: Option<ScoringSettings>,
}

#[derive(Debug, Deserialize)]
pub struct JoinLeagueRequest {
    pub invite_code: String,
}

#[derive(Debug, Deserialize)]
pub struct DraftChefRequest {
    pub chef_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SetScoreRequest {
    pub score: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: LeagueStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub league_id: Uuid,
    pub entries: Vec<LeaderboardEntry>,
}

/// Create a new league owned by the caller
///
/// POST /leagues
pub async fn create_league(
    State(state): State<AppState>,
    JwtAuth(user): JwtAuth,
    Json(req): Json<CreateLeagueRequest>,
) -> Result<(StatusCode, Json<League>), ApiError> {
    let league = state
        .leagues
        .create_league(
            user,
            NewLeague {
                name: req.name,
                season: req.season,
                max_members: req.max_members,
                max_roster_size: req.max_roster_size,
                scoring_settings: req.scoring_settings,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(league)))
}

/// Join a league with an invite code
///
/// POST /leagues/join
pub async fn join_league(
    State(state): State<AppState>,
    JwtAuth(user): JwtAuth,
    Json(req): Json<JoinLeagueRequest>,
) -> Result<Json<League>, ApiError> {
    let code = InviteCode::parse(&req.invite_code).map_err(ApiError::bad_request)?;
    let league = state.leagues.join_league_with_code(&code, user).await?;

    Ok(Json(league))
}

/// Get a league the caller belongs to
///
/// GET /leagues/:id
pub async fn get_league(
    State(state): State<AppState>,
    JwtAuth(user): JwtAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<League>, ApiError> {
    let league = state.leagues.get_league_for(id, user.id).await?;
    Ok(Json(league))
}

/// Draft a chef onto the caller's roster
///
/// POST /leagues/:id/draft
pub async fn draft_chef(
    State(state): State<AppState>,
    JwtAuth(user): JwtAuth,
    Path(id): Path<Uuid>,
    Json(req): Json<DraftChefRequest>,
) -> Result<Json<League>, ApiError> {
    let league = state.leagues.draft_chef(id, user.id, &req.chef_id).await?;
    Ok(Json(league))
}

/// Current standings
///
/// GET /leagues/:id/leaderboard
pub async fn get_leaderboard(
    State(state): State<AppState>,
    JwtAuth(user): JwtAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let entries = state.leagues.leaderboard(id, user.id).await?;

    Ok(Json(LeaderboardResponse {
        league_id: id,
        entries,
    }))
}

/// Record a member's score; owners and admins only
///
/// PUT /leagues/:id/members/:user_id/score
pub async fn set_score(
    State(state): State<AppState>,
    JwtAuth(user): JwtAuth,
    Path((id, member_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<SetScoreRequest>,
) -> Result<Json<League>, ApiError> {
    let league = state.leagues.set_score(id, user.id, member_id, req.score).await?;
    Ok(Json(league))
}

/// Move the league through its lifecycle; owner only
///
/// PUT /leagues/:id/status
pub async fn set_status(
    State(state): State<AppState>,
    JwtAuth(user): JwtAuth,
    Path(id): Path<Uuid>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<League>, ApiError> {
    let league = state.leagues.set_status(id, user.id, req.status).await?;
    Ok(Json(league))
}
