use std::sync::Arc;

use chefleague_api::config::AppConfig;
use chefleague_api::domain::repositories::LeagueRepository;
use chefleague_api::infrastructure::repositories::{InMemoryLeagueRepository, PostgresLeagueRepository};
use chefleague_api::{api, state::AppState};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let config = AppConfig::from_env()?;

    let store: Arc<dyn LeagueRepository> = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(database_url)
                .await
                .map_err(|e| format!("Failed to connect to database: {}", e))?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| format!("Failed to run migrations: {}", e))?;
            tracing::info!("Database connected successfully");

            let repo = PostgresLeagueRepository::new(pool);
            repo.start_change_feed()
                .await
                .map_err(|e| format!("Failed to start change feed: {}", e))?;
            Arc::new(repo)
        }
        None => Arc::new(InMemoryLeagueRepository::new()),
    };

    let state = AppState::new(store, config.jwt_secret.as_str(), config.draft_max_attempts);

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    tracing::info!("Server listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| format!("Failed to bind address: {}", e))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("Server failed: {}", e))
}
