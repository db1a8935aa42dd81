use std::sync::Arc;

use crate::domain::repositories::LeagueRepository;
use crate::realtime::SyncDispatcher;
use crate::services::LeagueService;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LeagueRepository>,
    pub dispatcher: Arc<SyncDispatcher>,
    pub leagues: Arc<LeagueService>,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn LeagueRepository>, jwt_secret: impl Into<Arc<str>>, max_attempts: u32) -> Self {
        let dispatcher = Arc::new(SyncDispatcher::default());
        let leagues = Arc::new(LeagueService::with_max_attempts(
            store.clone(),
            dispatcher.clone(),
            max_attempts,
        ));

        Self {
            store,
            dispatcher,
            leagues,
            jwt_secret: jwt_secret.into(),
        }
    }
}
