use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::middleware::JwtAuth;
use crate::domain::league::League;
use crate::state::AppState;

/// SSE event name carrying a full league record
pub const SNAPSHOT_EVENT: &str = "snapshot";

fn snapshot_event(league: &League) -> Result<Event, axum::Error> {
    Event::default()
        .event(SNAPSHOT_EVENT)
        .id(league.version().to_string())
        .json_data(league)
}

/// Stream of full league snapshots, starting with the current record
///
/// GET /leagues/:id/feed
pub async fn league_feed(
    State(state): State<AppState>,
    JwtAuth(user): JwtAuth,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    // Subscribe before the read so no commit falls between the two
    let changes = state.store.subscribe();
    let current = state.leagues.get_league_for(id, user.id).await?;

    let initial = stream::once(async move { snapshot_event(&current) });
    let updates = stream::unfold(changes, move |mut changes| async move {
        let league = next_snapshot(&mut changes, id).await?;
        Some((snapshot_event(&league), changes))
    });

    Ok(Sse::new(initial.chain(updates)).keep_alive(KeepAlive::default()))
}

async fn next_snapshot(changes: &mut broadcast::Receiver<Arc<League>>, id: Uuid) -> Option<Arc<League>> {
    loop {
        match changes.recv().await {
            Ok(league) if league.id() == id => return Some(league),
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                // The next snapshot supersedes whatever was skipped
                warn!(league_id = %id, "Change feed lagged by {} records", n);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
