// API layer module (adapters for controllers)
// Follows Hexagonal Architecture - API is an adapter

pub mod errors;
pub mod handlers;
pub mod middleware;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::realtime::websocket_handler;
use crate::state::AppState;
use handlers::{feed, health, leagues};

/// Builds the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // League routes
        .route("/leagues", post(leagues::create_league))
        .route("/leagues/join", post(leagues::join_league))
        .route("/leagues/:id", get(leagues::get_league))
        .route("/leagues/:id/draft", post(leagues::draft_chef))
        .route("/leagues/:id/leaderboard", get(leagues::get_leaderboard))
        .route("/leagues/:id/members/:user_id/score", put(leagues::set_score))
        .route("/leagues/:id/status", put(leagues::set_status))
        // Real-time sync
        .route("/leagues/:id/feed", get(feed::league_feed))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}
