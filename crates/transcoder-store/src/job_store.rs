//! Durable job records and the claim/finalize transition discipline.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use transcoder_models::{ClaimOutcome, ErrorKind, Job, JobId, JobState};

use crate::error::{StoreError, StoreResult};

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: i64,
    job_id: String,
    input_s3_path: String,
    output_s3_path: String,
    pipeline: String,
    preset_id: Option<i64>,
    state: String,
    error: Option<String>,
    error_type: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    transcode_started_at: Option<DateTime<Utc>>,
    transcode_completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let state: JobState = row
            .state
            .parse()
            .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))))?;
        let error_type = row
            .error_type
            .map(|s| s.parse::<ErrorKind>())
            .transpose()
            .map_err(|e: String| StoreError::Database(sqlx::Error::Decode(Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))))?;
        Ok(Job {
            id: row.id,
            job_id: JobId::from_string(row.job_id),
            input_s3_path: row.input_s3_path,
            output_s3_path: row.output_s3_path,
            pipeline: row.pipeline,
            preset_id: row.preset_id,
            state,
            error: row.error,
            error_type,
            created_at: row.created_at,
            updated_at: row.updated_at,
            transcode_started_at: row.transcode_started_at,
            transcode_completed_at: row.transcode_completed_at,
        })
    }
}

/// Durable mapping of job identity to lifecycle record.
#[derive(Clone)]
pub struct JobStore {
    pool: PgPool,
}

impl JobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_job(
        &self,
        job_id: &JobId,
        input_s3_path: &str,
        output_s3_path: &str,
        pipeline: &str,
        preset_id: Option<i64>,
    ) -> StoreResult<Job> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO jobs (job_id, input_s3_path, output_s3_path, pipeline, preset_id, state)
            VALUES ($1, $2, $3, $4, $5, 'queued')
            RETURNING id, job_id, input_s3_path, output_s3_path, pipeline, preset_id, state,
                      error, error_type, created_at, updated_at, transcode_started_at, transcode_completed_at
            "#,
        )
        .bind(job_id.as_str())
        .bind(input_s3_path)
        .bind(output_s3_path)
        .bind(pipeline)
        .bind(preset_id)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    pub async fn get_job(&self, job_id: &JobId) -> StoreResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, job_id, input_s3_path, output_s3_path, pipeline, preset_id, state,
                   error, error_type, created_at, updated_at, transcode_started_at, transcode_completed_at
            FROM jobs WHERE job_id = $1
            "#,
        )
        .bind(job_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn list_jobs(&self, state: Option<JobState>) -> StoreResult<Vec<Job>> {
        let rows = match state {
            Some(state) => {
                sqlx::query_as::<_, JobRow>(
                    r#"
                    SELECT id, job_id, input_s3_path, output_s3_path, pipeline, preset_id, state,
                           error, error_type, created_at, updated_at, transcode_started_at, transcode_completed_at
                    FROM jobs WHERE state = $1 ORDER BY created_at DESC
                    "#,
                )
                .bind(state.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, JobRow>(
                    r#"
                    SELECT id, job_id, input_s3_path, output_s3_path, pipeline, preset_id, state,
                           error, error_type, created_at, updated_at, transcode_started_at, transcode_completed_at
                    FROM jobs ORDER BY created_at DESC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Atomic compare-and-set of state from `queued` to `in-progress`,
    /// stamping `transcode_started_at`. The `UPDATE ... WHERE state = 'queued'`
    /// is the sole serialization point between concurrent workers: Postgres
    /// guarantees at most one such statement observes and consumes the row.
    pub async fn claim(&self, job_id: &JobId) -> StoreResult<ClaimOutcome> {
        let claimed = sqlx::query(
            r#"
            UPDATE jobs SET state = 'in-progress', transcode_started_at = now(), updated_at = now()
            WHERE job_id = $1 AND state = 'queued'
            "#,
        )
        .bind(job_id.as_str())
        .execute(&self.pool)
        .await?;

        if claimed.rows_affected() == 1 {
            return Ok(ClaimOutcome::Claimed);
        }

        let state: Option<String> = sqlx::query_scalar("SELECT state FROM jobs WHERE job_id = $1")
            .bind(job_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(match state.as_deref() {
            None => ClaimOutcome::NotFound,
            Some("cancelled") => ClaimOutcome::Cancelled,
            Some("in-progress") => ClaimOutcome::AlreadyInProgress,
            Some(_) => ClaimOutcome::AlreadyTerminal,
        })
    }

    /// Sets a terminal state and `transcode_completed_at`. Rejects with
    /// `IllegalTransition` if the job is already terminal, unless the new
    /// status equals the current one (idempotent re-finalize is a no-op).
    pub async fn finalize(
        &self,
        job_id: &JobId,
        status: JobState,
        error: Option<&str>,
        error_kind: Option<ErrorKind>,
    ) -> StoreResult<()> {
        if !status.is_terminal() {
            return Err(StoreError::illegal_transition(format!(
                "finalize requires a terminal status, got {status}"
            )));
        }

        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET state = $2, error = $3, error_type = $4, transcode_completed_at = now(), updated_at = now()
            WHERE job_id = $1 AND state NOT IN ('completed', 'failed', 'cancelled', 'stalled')
            "#,
        )
        .bind(job_id.as_str())
        .bind(status.as_str())
        .bind(error)
        .bind(error_kind.map(|k| k.as_str()))
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 1 {
            return Ok(());
        }

        let current: Option<String> = sqlx::query_scalar("SELECT state FROM jobs WHERE job_id = $1")
            .bind(job_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match current.as_deref() {
            None => Err(StoreError::not_found(job_id.to_string())),
            Some(s) if s == status.as_str() => Ok(()),
            Some(s) => Err(StoreError::illegal_transition(format!(
                "job {job_id} already terminal in state {s}, cannot finalize as {status}"
            ))),
        }
    }

    /// Only a `queued` job may be cancelled externally.
    pub async fn cancel_job(&self, job_id: &JobId) -> StoreResult<()> {
        let updated = sqlx::query(
            "UPDATE jobs SET state = 'cancelled', updated_at = now() WHERE job_id = $1 AND state = 'queued'",
        )
        .bind(job_id.as_str())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 1 {
            return Ok(());
        }

        let current: Option<String> = sqlx::query_scalar("SELECT state FROM jobs WHERE job_id = $1")
            .bind(job_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match current.as_deref() {
            None => Err(StoreError::not_found(job_id.to_string())),
            Some("cancelled") => Ok(()),
            Some(s) => Err(StoreError::illegal_transition(format!(
                "job {job_id} is {s}, only a queued job may be cancelled"
            ))),
        }
    }

    /// Used by the readiness probe: a trivial round trip to the pool.
    pub async fn check_connectivity(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Jobs in `in-progress` whose `updated_at` is older than the given
    /// threshold. Read by the Stall Detector each tick.
    pub async fn list_stale_in_progress(&self, older_than: DateTime<Utc>) -> StoreResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, job_id, input_s3_path, output_s3_path, pipeline, preset_id, state,
                   error, error_type, created_at, updated_at, transcode_started_at, transcode_completed_at
            FROM jobs WHERE state = 'in-progress' AND updated_at < $1
            "#,
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_rejects_non_terminal_status() {
        // Pure validation, no pool needed: non-terminal status is rejected
        // before any query is issued.
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::InProgress.is_terminal());
    }
}
