use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgListener;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::errors::{LeagueError, LeagueResult, ValidationError};
use crate::domain::league::value_objects::ScoringSettings;
use crate::domain::league::{InviteCode, League, LeagueStatus, Member};
use crate::domain::repositories::{LeagueMutator, LeagueRepository};

/// NOTIFY channel carrying the id of every committed league
pub const CHANGE_CHANNEL: &str = "league_changes";

const CHANGE_FEED_CAPACITY: usize = 1024;

const SELECT_LEAGUE: &str = r#"
    SELECT
        id, name, season, status, max_members, max_roster_size,
        invite_code, scoring_settings, current_week, members,
        version, created_at
    FROM leagues
"#;

#[derive(FromRow)]
struct LeagueRow {
    id: Uuid,
    name: String,
    season: i32,
    status: LeagueStatus,
    max_members: i32,
    max_roster_size: i32,
    invite_code: String,
    scoring_settings: Json<ScoringSettings>,
    current_week: i32,
    members: Json<Vec<Member>>,
    version: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<LeagueRow> for League {
    type Error = LeagueError;

    fn try_from(r: LeagueRow) -> Result<Self, Self::Error> {
        let invite_code = InviteCode::parse(&r.invite_code)
            .map_err(|e| LeagueError::Store(format!("Invalid invite code from database: {}", e)))?;
        let max_members = u32::try_from(r.max_members)
            .map_err(|_| LeagueError::Store(format!("Invalid max_members from database: {}", r.max_members)))?;
        let max_roster_size = u32::try_from(r.max_roster_size)
            .map_err(|_| LeagueError::Store(format!("Invalid max_roster_size from database: {}", r.max_roster_size)))?;

        Ok(League::from_persistence(
            r.id,
            r.name,
            r.season,
            r.status,
            max_members,
            max_roster_size,
            invite_code,
            r.scoring_settings.0,
            r.current_week,
            r.members.0,
            r.version,
            r.created_at,
        ))
    }
}

fn column_int(value: u32, column: &str) -> LeagueResult<i32> {
    i32::try_from(value).map_err(|_| LeagueError::Store(format!("{} out of range: {}", column, value)))
}

async fn fetch_league(pool: &PgPool, id: Uuid) -> LeagueResult<League> {
    let row = sqlx::query_as::<_, LeagueRow>(&format!("{} WHERE id = $1", SELECT_LEAGUE))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| LeagueError::Store(format!("Failed to find league by id: {}", e)))?
        .ok_or_else(|| LeagueError::NotFound(id.to_string()))?;

    League::try_from(row)
}

/// PostgreSQL implementation of LeagueRepository
///
/// Members and scoring settings are stored as JSONB documents on the league
/// row. Conditional updates are `UPDATE ... WHERE version = $expected`, and
/// each commit sends a NOTIFY that [`start_change_feed`] turns into a
/// snapshot broadcast.
///
/// [`start_change_feed`]: PostgresLeagueRepository::start_change_feed
pub struct PostgresLeagueRepository {
    pool: PgPool,
    changes: broadcast::Sender<Arc<League>>,
}

impl PostgresLeagueRepository {
    /// Creates a new PostgresLeagueRepository
    ///
    /// # Arguments
    /// * `pool` - SQLx connection pool for PostgreSQL
    pub fn new(pool: PgPool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { pool, changes }
    }

    /// Listens for league commits from any process and republishes the
    /// fresh record to local subscribers
    pub async fn start_change_feed(&self) -> LeagueResult<JoinHandle<()>> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| LeagueError::Store(format!("Failed to start change listener: {}", e)))?;
        listener
            .listen(CHANGE_CHANNEL)
            .await
            .map_err(|e| LeagueError::Store(format!("Failed to LISTEN: {}", e)))?;

        let pool = self.pool.clone();
        let changes = self.changes.clone();

        Ok(tokio::spawn(async move {
            loop {
                let notification = match listener.recv().await {
                    Ok(notification) => notification,
                    Err(e) => {
                        tracing::error!("League change listener stopped: {}", e);
                        break;
                    }
                };

                let Ok(id) = Uuid::parse_str(notification.payload()) else {
                    tracing::warn!("Ignoring malformed change notification: {}", notification.payload());
                    continue;
                };

                match fetch_league(&pool, id).await {
                    Ok(league) => {
                        let _ = changes.send(Arc::new(league));
                    }
                    Err(e) => tracing::warn!("Failed to load changed league {}: {}", id, e),
                }
            }
        }))
    }
}

#[async_trait]
impl LeagueRepository for PostgresLeagueRepository {
    async fn get(&self, id: Uuid) -> LeagueResult<League> {
        fetch_league(&self.pool, id).await
    }

    async fn find_by_invite_code(&self, code: &InviteCode) -> LeagueResult<League> {
        let row = sqlx::query_as::<_, LeagueRow>(&format!("{} WHERE invite_code = $1", SELECT_LEAGUE))
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LeagueError::Store(format!("Failed to find league by invite code: {}", e)))?
            .ok_or_else(|| LeagueError::NotFound(format!("invite code {}", code)))?;

        League::try_from(row)
    }

    async fn create(&self, league: &League) -> LeagueResult<League> {
        let max_members = column_int(league.max_members(), "max_members")?;
        let max_roster_size = column_int(league.max_roster_size(), "max_roster_size")?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LeagueError::Store(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO leagues (
                id, name, season, status, max_members, max_roster_size,
                invite_code, scoring_settings, current_week, members,
                version, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(league.id())
        .bind(league.name())
        .bind(league.season())
        .bind(league.status())
        .bind(max_members)
        .bind(max_roster_size)
        .bind(league.invite_code().as_str())
        .bind(Json(league.scoring_settings()))
        .bind(league.current_week())
        .bind(Json(league.members()))
        .bind(league.version())
        .bind(league.created_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                LeagueError::from(ValidationError::DuplicateInviteCode)
            }
            e => LeagueError::Store(format!("Failed to create league: {}", e)),
        })?;

        notify(&mut tx, league.id()).await?;
        tx.commit()
            .await
            .map_err(|e| LeagueError::Store(format!("Failed to commit league: {}", e)))?;

        Ok(league.clone())
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        mutator: LeagueMutator<'_>,
    ) -> LeagueResult<League> {
        let mut candidate = fetch_league(&self.pool, id).await?;
        if candidate.version() != expected_version {
            return Err(LeagueError::conflict(id));
        }

        mutator(&mut candidate)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LeagueError::Store(format!("Failed to begin transaction: {}", e)))?;

        // A concurrent writer that committed first has moved the version on,
        // so this matches no row
        let row = sqlx::query_as::<_, LeagueRow>(
            r#"
            UPDATE leagues SET
                name = $3,
                status = $4,
                current_week = $5,
                members = $6,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING
                id, name, season, status, max_members, max_roster_size,
                invite_code, scoring_settings, current_week, members,
                version, created_at
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(candidate.name())
        .bind(candidate.status())
        .bind(candidate.current_week())
        .bind(Json(candidate.members()))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| LeagueError::Store(format!("Failed to update league: {}", e)))?
        .ok_or_else(|| LeagueError::conflict(id))?;

        notify(&mut tx, id).await?;
        tx.commit()
            .await
            .map_err(|e| LeagueError::Store(format!("Failed to commit league: {}", e)))?;

        League::try_from(row)
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<League>> {
        self.changes.subscribe()
    }
}

async fn notify(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, id: Uuid) -> LeagueResult<()> {
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(CHANGE_CHANNEL)
        .bind(id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(|e| LeagueError::Store(format!("Failed to notify league change: {}", e)))?;
    Ok(())
}
