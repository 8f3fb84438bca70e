//! PostgreSQL-backed job store.
//!
//! Uses `SELECT ... FOR UPDATE SKIP LOCKED` inside an `UPDATE` to claim
//! the lane head, which is what prevents double-dispatch when multiple
//! workers poll one lane.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use renderq_core::config::QueueConfig;
use renderq_core::error::QueueError;
use renderq_core::types::{new_job_id, JobId, Timestamp};

use crate::models::job::{JobRecord, Submission};
use crate::models::status::JobStatus;
use crate::store::JobStore;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, lane, task_name, args, kwargs, status_id, \
    result, error_message, enqueued_at, started_at, finished_at";

/// Job store backed by a shared PostgreSQL server.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    /// Connect to the store and verify it responds.
    ///
    /// Validates the configuration before any network call. Connection
    /// failures name the configured host and port; errors after a
    /// successful connect surface as storage errors instead.
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        config.validate()?;

        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url())
            .await
            .map_err(|e| connection_error(config, &e))?;

        // Round-trip ping so a wrong host/port fails here, not on first use.
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| connection_error(config, &e))?;

        Ok(Self { pool })
    }

    /// Wrap an already-connected pool (tests, embedding).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    pub async fn run_migrations(&self) -> Result<(), QueueError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| QueueError::Storage(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn connection_error(config: &QueueConfig, error: &sqlx::Error) -> QueueError {
    QueueError::Connection {
        host: config.host.clone(),
        port: config.port,
        detail: error.to_string(),
    }
}

fn storage_error(error: sqlx::Error) -> QueueError {
    QueueError::Storage(error.to_string())
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn submit(&self, lane: &str, submission: Submission) -> Result<JobRecord, QueueError> {
        if lane.trim().is_empty() {
            return Err(QueueError::Validation(
                "Lane not specified. You must specify the name of a renderq lane.".to_string(),
            ));
        }
        submission.validate()?;

        let query = format!(
            "INSERT INTO jobs (id, lane, task_name, args, kwargs, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        let record = sqlx::query_as::<_, JobRecord>(&query)
            .bind(new_job_id())
            .bind(lane)
            .bind(&submission.task_name)
            .bind(Value::Array(submission.args))
            .bind(Value::Object(submission.kwargs))
            .bind(JobStatus::Queued.id())
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;

        tracing::debug!(job_id = %record.id, lane, task = %record.task_name, "Job enqueued");
        Ok(record)
    }

    async fn claim_next(&self, lane: &str) -> Result<Option<JobRecord>, QueueError> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $1, started_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE lane = $2 AND status_id = $3 \
                 ORDER BY enqueued_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRecord>(&query)
            .bind(JobStatus::Running.id())
            .bind(lane)
            .bind(JobStatus::Queued.id())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)
    }

    async fn complete(&self, id: JobId, result: Value) -> Result<bool, QueueError> {
        let outcome = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, result = $3, finished_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(JobStatus::Succeeded.id())
        .bind(result)
        .bind(JobStatus::Running.id())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(outcome.rows_affected() > 0)
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<bool, QueueError> {
        let outcome = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, error_message = $3, finished_at = NOW() \
             WHERE id = $1 AND status_id IN ($4, $5)",
        )
        .bind(id)
        .bind(JobStatus::Failed.id())
        .bind(error)
        .bind(JobStatus::Queued.id())
        .bind(JobStatus::Running.id())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(outcome.rows_affected() > 0)
    }

    async fn get(&self, id: JobId) -> Result<JobRecord, QueueError> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .ok_or(QueueError::NotFound { id })
    }

    async fn purge_finished(&self, cutoff: Timestamp) -> Result<u64, QueueError> {
        let outcome = sqlx::query(
            "DELETE FROM jobs \
             WHERE status_id IN ($1, $2) AND finished_at < $3",
        )
        .bind(JobStatus::Succeeded.id())
        .bind(JobStatus::Failed.id())
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(outcome.rows_affected())
    }
}
