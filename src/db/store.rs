use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::str::FromStr;

use crate::models::moderation::{ModerationResult, ModerationStatus};

/// Durable record of each moderation task's lifecycle.
///
/// `complete` and `fail` are conditional on the record still being pending
/// and report whether a transition happened. A `false` return means the
/// record was already terminal: the caller lost a redelivery race and must
/// treat its own work as a duplicate, never overwrite.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert a new pending record and return its task id.
    async fn create_pending(&self, item_id: i64) -> Result<i64, StoreError>;

    /// Fetch a record by task id.
    async fn get(&self, task_id: i64) -> Result<Option<ModerationResult>, StoreError>;

    /// Transition `pending -> completed`, setting the prediction and
    /// `processed_at`. No-op on terminal records.
    async fn complete(
        &self,
        task_id: i64,
        is_violation: bool,
        probability: f64,
    ) -> Result<bool, StoreError>;

    /// Transition `pending -> failed`, setting the error message and
    /// `processed_at`. No-op on terminal records.
    async fn fail(&self, task_id: i64, error_message: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// PostgreSQL-backed result store over the `moderation_results` table.
pub struct PgResultStore {
    pool: PgPool,
}

impl PgResultStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn result_from_row(row: &sqlx::postgres::PgRow) -> Result<ModerationResult, sqlx::Error> {
    let status_str: String = row.try_get("status")?;
    let status = ModerationStatus::from_str(&status_str).unwrap_or(ModerationStatus::Pending);

    Ok(ModerationResult {
        id: row.try_get("id")?,
        item_id: row.try_get("item_id")?,
        status,
        is_violation: row.try_get("is_violation")?,
        probability: row.try_get("probability")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        processed_at: row.try_get("processed_at")?,
    })
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn create_pending(&self, item_id: i64) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO moderation_results (item_id, status)
            VALUES ($1, 'pending')
            RETURNING id
            "#,
        )
        .bind(item_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id").map_err(StoreError::Database)?)
    }

    async fn get(&self, task_id: i64) -> Result<Option<ModerationResult>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, item_id, status, is_violation, probability,
                   error_message, created_at, processed_at
            FROM moderation_results
            WHERE id = $1
            "#,
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(result_from_row(&r)?)),
            None => Ok(None),
        }
    }

    async fn complete(
        &self,
        task_id: i64,
        is_violation: bool,
        probability: f64,
    ) -> Result<bool, StoreError> {
        // Guarded by the current status so the terminal-state check is atomic
        // with the write: two workers racing on a redelivered message cannot
        // both transition the record.
        let result = sqlx::query(
            r#"
            UPDATE moderation_results
            SET status = 'completed',
                is_violation = $2,
                probability = $3,
                processed_at = NOW()
            WHERE id = $1
              AND status = 'pending'
            "#,
        )
        .bind(task_id)
        .bind(is_violation)
        .bind(probability)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fail(&self, task_id: i64, error_message: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE moderation_results
            SET status = 'failed',
                error_message = $2,
                processed_at = NOW()
            WHERE id = $1
              AND status = 'pending'
            "#,
        )
        .bind(task_id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
