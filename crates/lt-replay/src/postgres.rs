//! # PostgreSQL Replay Store
//!
//! Shared backend for multi-instance deployments. Consumption is a single
//! conditional upsert:
//!
//! ```sql
//! INSERT ... ON CONFLICT (tenant_id, jti)
//!   DO UPDATE SET expires_at = EXCLUDED.expires_at
//!   WHERE replay_tokens.expires_at <= $now
//! RETURNING expires_at
//! ```
//!
//! A returned row means the key was absent or expired and is now consumed.
//! No row means a live record blocked the update. Postgres row locking on
//! the primary key serializes concurrent upserts for the same key, so
//! exactly one caller gets a row back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lt_core::Timestamp;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::ReplayStoreError;
use crate::store::ReplayStore;
use crate::token::{ConsumeOutcome, ReplayKey};

const CONSUME_SQL: &str = "INSERT INTO replay_tokens (tenant_id, jti, expires_at)
     VALUES ($1, $2, $3)
     ON CONFLICT (tenant_id, jti) DO UPDATE SET expires_at = EXCLUDED.expires_at
     WHERE replay_tokens.expires_at <= $4
     RETURNING expires_at";

/// Replay store backed by the `replay_tokens` table.
#[derive(Debug, Clone)]
pub struct PgReplayStore {
    pool: PgPool,
}

impl PgReplayStore {
    /// Wrap an existing pool. The schema must already exist.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and apply the embedded migrations.
    pub async fn connect(database_url: &str) -> Result<Self, ReplayStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(database_url)
            .await?;
        tracing::info!("Connected to PostgreSQL replay store");

        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Apply the embedded migrations (idempotent).
    pub async fn ensure_schema(&self) -> Result<(), ReplayStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ReplayStoreError::Unavailable(format!("migration failed: {e}")))?;
        tracing::info!("Replay store migrations applied");
        Ok(())
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn from_db(dt: DateTime<Utc>) -> Timestamp {
    Timestamp::from_utc(dt)
}

#[async_trait]
impl ReplayStore for PgReplayStore {
    async fn consume(
        &self,
        key: &ReplayKey,
        expires_at: Timestamp,
        now: Timestamp,
    ) -> Result<ConsumeOutcome, ReplayStoreError> {
        let written: Option<DateTime<Utc>> = sqlx::query_scalar(CONSUME_SQL)
            .bind(key.tenant_id.as_str())
            .bind(key.jti.as_str())
            .bind(*expires_at.as_datetime())
            .bind(*now.as_datetime())
            .fetch_optional(&self.pool)
            .await?;

        match written {
            Some(dt) => Ok(ConsumeOutcome::Accepted {
                expires_at: from_db(dt),
            }),
            None => {
                let existing = self.get(key, now).await?;
                Ok(ConsumeOutcome::Rejected {
                    expires_at: existing,
                })
            }
        }
    }

    async fn get(
        &self,
        key: &ReplayKey,
        now: Timestamp,
    ) -> Result<Option<Timestamp>, ReplayStoreError> {
        let row: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT expires_at FROM replay_tokens
             WHERE tenant_id = $1 AND jti = $2 AND expires_at > $3",
        )
        .bind(key.tenant_id.as_str())
        .bind(key.jti.as_str())
        .bind(*now.as_datetime())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_db))
    }

    async fn put(&self, key: &ReplayKey, expires_at: Timestamp) -> Result<(), ReplayStoreError> {
        sqlx::query(
            "INSERT INTO replay_tokens (tenant_id, jti, expires_at) VALUES ($1, $2, $3)
             ON CONFLICT (tenant_id, jti) DO UPDATE SET expires_at = EXCLUDED.expires_at",
        )
        .bind(key.tenant_id.as_str())
        .bind(key.jti.as_str())
        .bind(*expires_at.as_datetime())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release(
        &self,
        key: &ReplayKey,
        expires_at: Timestamp,
    ) -> Result<bool, ReplayStoreError> {
        let result = sqlx::query(
            "DELETE FROM replay_tokens WHERE tenant_id = $1 AND jti = $2 AND expires_at = $3",
        )
        .bind(key.tenant_id.as_str())
        .bind(key.jti.as_str())
        .bind(*expires_at.as_datetime())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self, now: Timestamp) -> Result<u64, ReplayStoreError> {
        let result = sqlx::query("DELETE FROM replay_tokens WHERE expires_at <= $1")
            .bind(*now.as_datetime())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
