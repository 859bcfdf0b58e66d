use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    Result, StateEntry, StateStoreError, Version,
    store::{PutOptions, StateStore},
};

/// PostgreSQL-backed state store implementation.
///
/// Values live in the `state_entries` table; conditional writes are expressed
/// as `INSERT .. ON CONFLICT DO NOTHING` (insert-if-absent) or
/// `UPDATE .. WHERE version = $expected` so the version check and the write
/// happen in a single statement.
#[derive(Clone)]
pub struct PostgresStateStore {
    pool: PgPool,
}

impl PostgresStateStore {
    /// Creates a new PostgreSQL state store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url` and creates a store over the pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_entry(row: PgRow) -> Result<StateEntry> {
        Ok(StateEntry {
            key: row.try_get("key")?,
            value: row.try_get("value")?,
            version: Version::new(row.try_get("version")?),
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn current_version(&self, key: &str) -> Result<Version> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM state_entries WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(Version::new(version.unwrap_or(0)))
    }
}

#[async_trait]
impl StateStore for PostgresStateStore {
    async fn get(&self, key: &str) -> Result<Option<StateEntry>> {
        let row = sqlx::query(
            r#"
            SELECT key, value, version, updated_at
            FROM state_entries
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_entry).transpose()
    }

    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        options: PutOptions,
    ) -> Result<Version> {
        let now = Utc::now();

        let written: Option<i64> = match options.expected_version {
            None => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO state_entries (key, value, version, updated_at)
                    VALUES ($1, $2, 1, $3)
                    ON CONFLICT (key) DO UPDATE
                    SET value = EXCLUDED.value,
                        version = state_entries.version + 1,
                        updated_at = EXCLUDED.updated_at
                    RETURNING version
                    "#,
                )
                .bind(key)
                .bind(&value)
                .bind(now)
                .fetch_optional(&self.pool)
                .await?
            }
            Some(expected) if expected == Version::initial() => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO state_entries (key, value, version, updated_at)
                    VALUES ($1, $2, 1, $3)
                    ON CONFLICT (key) DO NOTHING
                    RETURNING version
                    "#,
                )
                .bind(key)
                .bind(&value)
                .bind(now)
                .fetch_optional(&self.pool)
                .await?
            }
            Some(expected) => {
                sqlx::query_scalar(
                    r#"
                    UPDATE state_entries
                    SET value = $2, version = version + 1, updated_at = $3
                    WHERE key = $1 AND version = $4
                    RETURNING version
                    "#,
                )
                .bind(key)
                .bind(&value)
                .bind(now)
                .bind(expected.as_i64())
                .fetch_optional(&self.pool)
                .await?
            }
        };

        match written {
            Some(version) => Ok(Version::new(version)),
            None => {
                let actual = self.current_version(key).await?;
                tracing::debug!(%key, %actual, "conditional write rejected");
                Err(StateStoreError::ConcurrencyConflict {
                    key: key.to_string(),
                    expected: options.expected_version.unwrap_or(Version::initial()),
                    actual,
                })
            }
        }
    }
}
