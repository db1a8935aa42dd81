// Application configuration
// Read from the environment (and `.env` via dotenv) once at startup

use std::net::SocketAddr;

use crate::services::league_service::DEFAULT_MAX_ATTEMPTS;

const DEFAULT_JWT_SECRET: &str = "dev-secret-key";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string; the in-memory store is used when absent
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    /// Conditional-update attempts before a conflict is surfaced
    pub draft_max_attempts: u32,
}

impl AppConfig {
    /// Loads configuration from environment variables
    ///
    /// # Returns
    /// * `Err(String)` - If a variable is present but malformed
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        if database_url.is_none() {
            tracing::warn!("DATABASE_URL not set, using in-memory league store");
        }

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using default");
            DEFAULT_JWT_SECRET.to_string()
        });

        let bind_addr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e| format!("Invalid BIND_ADDR: {}", e))?;

        Ok(Self {
            database_url,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 5)?,
            jwt_secret,
            bind_addr,
            draft_max_attempts: parse_var("DRAFT_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 5,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            draft_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

fn parse_var(name: &str, default: u32) -> Result<u32, String> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|e| format!("Invalid {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}
