//! `SQLite` job repository.
//!
//! # Overview
//! Persists [`Job`] rows and implements every lifecycle transition as one
//! conditional `UPDATE … WHERE status = expected` statement. The affected-row
//! count decides who won a race; there is no row-level locking beyond what
//! the single statement provides, and none is needed.

use std::sync::Arc;

use async_trait::async_trait;
use binlift_domain::entities::{Job, JobError};
use binlift_domain::error::Result;
use binlift_domain::ports::{DatabaseExecutor, JobRepository, SqlParam};
use binlift_domain::value_objects::{JobId, WorkerId};
use tracing::debug;

use super::query_helpers;
use super::row_convert;

/// `SQLite`-backed implementation of the [`JobRepository`] port.
pub struct SqliteJobRepository {
    executor: Arc<dyn DatabaseExecutor>,
}

impl SqliteJobRepository {
    /// Create a repository that uses the given executor.
    #[must_use]
    pub fn new(executor: Arc<dyn DatabaseExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        let translation_json = job
            .translation
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let error_json = job.error.as_ref().map(serde_json::to_string).transpose()?;
        let params = [
            SqlParam::String(job.id.to_string()),
            SqlParam::String(job.owner.clone()),
            SqlParam::String(job.file_sha256.clone()),
            SqlParam::String(job.status.as_str().to_owned()),
            SqlParam::F64(job.progress),
            SqlParam::I64(job.priority),
            translation_json.map_or(SqlParam::Null, SqlParam::String),
            SqlParam::I64(job.visible_at),
            SqlParam::I64(i64::from(job.attempts)),
            SqlParam::I64(i64::from(job.max_attempts)),
            error_json.map_or(SqlParam::Null, SqlParam::String),
            job.idempotency_key
                .clone()
                .map_or(SqlParam::Null, SqlParam::String),
            SqlParam::I64(i64::from(job.result_present)),
            SqlParam::String(serde_json::to_string(&job.metadata)?),
            SqlParam::I64(job.created_at),
        ];
        self.executor
            .execute(
                r"
                INSERT INTO jobs (id, owner, file_sha256, status, progress, priority,
                                  translation_json, visible_at, attempts, max_attempts,
                                  error_json, idempotency_key, result_present,
                                  metadata_json, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                &params,
            )
            .await?;
        debug!(job_id = %job.id, owner = %job.owner, "inserted job");
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>> {
        query_helpers::query_one(
            &self.executor,
            "SELECT * FROM jobs WHERE id = ?",
            &[SqlParam::String(id.to_string())],
            row_convert::row_to_job,
        )
        .await
    }

    async fn find_by_idempotency(&self, owner: &str, key: &str) -> Result<Option<Job>> {
        query_helpers::query_one(
            &self.executor,
            "SELECT * FROM jobs WHERE owner = ? AND idempotency_key = ?",
            &[
                SqlParam::String(owner.to_owned()),
                SqlParam::String(key.to_owned()),
            ],
            row_convert::row_to_job,
        )
        .await
    }

    async fn count_active_for_owner(&self, owner: &str) -> Result<u64> {
        let row = self
            .executor
            .query_one(
                "SELECT COUNT(*) AS n FROM jobs WHERE owner = ? AND status IN ('queued', 'running')",
                &[SqlParam::String(owner.to_owned())],
            )
            .await?;
        Ok(row
            .and_then(|r| r.try_get_i64("n").ok().flatten())
            .unwrap_or(0) as u64)
    }

    async fn claimable(&self, now: i64, limit: usize) -> Result<Vec<Job>> {
        query_helpers::query_all(
            &self.executor,
            r"
            SELECT * FROM jobs
            WHERE status = 'queued' AND visible_at <= ?
            ORDER BY priority DESC, created_at ASC
            LIMIT ?
            ",
            &[SqlParam::I64(now), SqlParam::I64(limit as i64)],
            row_convert::row_to_job,
            "job",
        )
        .await
    }

    async fn try_claim(
        &self,
        id: &JobId,
        worker: &WorkerId,
        now: i64,
        lease_expires: i64,
    ) -> Result<bool> {
        let affected = self
            .executor
            .execute(
                r"
                UPDATE jobs
                SET status = 'running',
                    worker_id = ?,
                    claim_expires_at = ?,
                    started_at = COALESCE(started_at, ?)
                WHERE id = ? AND status = 'queued' AND visible_at <= ?
                ",
                &[
                    SqlParam::String(worker.to_string()),
                    SqlParam::I64(lease_expires),
                    SqlParam::I64(now),
                    SqlParam::String(id.to_string()),
                    SqlParam::I64(now),
                ],
            )
            .await?;
        Ok(affected == 1)
    }

    async fn try_extend_lease(
        &self,
        id: &JobId,
        worker: &WorkerId,
        progress: f64,
        lease_expires: i64,
    ) -> Result<bool> {
        // Progress is monotonic: MAX keeps a stale heartbeat from moving it
        // backwards.
        let affected = self
            .executor
            .execute(
                r"
                UPDATE jobs
                SET claim_expires_at = ?, progress = MAX(progress, ?)
                WHERE id = ? AND worker_id = ? AND status = 'running'
                ",
                &[
                    SqlParam::I64(lease_expires),
                    SqlParam::F64(progress),
                    SqlParam::String(id.to_string()),
                    SqlParam::String(worker.to_string()),
                ],
            )
            .await?;
        Ok(affected == 1)
    }

    async fn try_complete(&self, id: &JobId, worker: &WorkerId, now: i64) -> Result<bool> {
        let affected = self
            .executor
            .execute(
                r"
                UPDATE jobs
                SET status = 'completed', result_present = 1, progress = 1.0,
                    completed_at = ?, worker_id = NULL, claim_expires_at = NULL,
                    error_json = NULL
                WHERE id = ? AND worker_id = ? AND status = 'running'
                ",
                &[
                    SqlParam::I64(now),
                    SqlParam::String(id.to_string()),
                    SqlParam::String(worker.to_string()),
                ],
            )
            .await?;
        Ok(affected == 1)
    }

    async fn try_requeue(
        &self,
        id: &JobId,
        worker: Option<&WorkerId>,
        visible_at: i64,
        error: &JobError,
        now: i64,
    ) -> Result<bool> {
        let error_json = serde_json::to_string(error)?;
        let affected = match worker {
            Some(worker) => {
                self.executor
                    .execute(
                        r"
                        UPDATE jobs
                        SET status = 'queued', worker_id = NULL, claim_expires_at = NULL,
                            visible_at = ?, attempts = attempts + 1, error_json = ?
                        WHERE id = ? AND worker_id = ? AND status = 'running'
                        ",
                        &[
                            SqlParam::I64(visible_at),
                            SqlParam::String(error_json),
                            SqlParam::String(id.to_string()),
                            SqlParam::String(worker.to_string()),
                        ],
                    )
                    .await?
            }
            // Janitor path: reclaim regardless of holder, but only once the
            // lease has actually expired.
            None => {
                self.executor
                    .execute(
                        r"
                        UPDATE jobs
                        SET status = 'queued', worker_id = NULL, claim_expires_at = NULL,
                            visible_at = ?, attempts = attempts + 1, error_json = ?
                        WHERE id = ? AND status = 'running' AND claim_expires_at < ?
                        ",
                        &[
                            SqlParam::I64(visible_at),
                            SqlParam::String(error_json),
                            SqlParam::String(id.to_string()),
                            SqlParam::I64(now),
                        ],
                    )
                    .await?
            }
        };
        Ok(affected == 1)
    }

    async fn try_fail(
        &self,
        id: &JobId,
        worker: Option<&WorkerId>,
        error: &JobError,
        now: i64,
    ) -> Result<bool> {
        let error_json = serde_json::to_string(error)?;
        let affected = match worker {
            Some(worker) => {
                self.executor
                    .execute(
                        r"
                        UPDATE jobs
                        SET status = 'failed', completed_at = ?, error_json = ?,
                            worker_id = NULL, claim_expires_at = NULL
                        WHERE id = ? AND worker_id = ? AND status = 'running'
                        ",
                        &[
                            SqlParam::I64(now),
                            SqlParam::String(error_json),
                            SqlParam::String(id.to_string()),
                            SqlParam::String(worker.to_string()),
                        ],
                    )
                    .await?
            }
            None => {
                self.executor
                    .execute(
                        r"
                        UPDATE jobs
                        SET status = 'failed', completed_at = ?, error_json = ?,
                            worker_id = NULL, claim_expires_at = NULL
                        WHERE id = ? AND status = 'running' AND claim_expires_at < ?
                        ",
                        &[
                            SqlParam::I64(now),
                            SqlParam::String(error_json),
                            SqlParam::String(id.to_string()),
                            SqlParam::I64(now),
                        ],
                    )
                    .await?
            }
        };
        Ok(affected == 1)
    }

    async fn force_fail(&self, id: &JobId, error: &JobError, now: i64) -> Result<bool> {
        let error_json = serde_json::to_string(error)?;
        let affected = self
            .executor
            .execute(
                r"
                UPDATE jobs
                SET status = 'failed', completed_at = ?, error_json = ?,
                    worker_id = NULL, claim_expires_at = NULL
                WHERE id = ? AND status = 'running'
                ",
                &[
                    SqlParam::I64(now),
                    SqlParam::String(error_json),
                    SqlParam::String(id.to_string()),
                ],
            )
            .await?;
        Ok(affected == 1)
    }

    async fn try_cancel(&self, id: &JobId, owner: &str, now: i64) -> Result<bool> {
        let affected = self
            .executor
            .execute(
                r"
                UPDATE jobs
                SET status = 'cancelled', completed_at = ?,
                    worker_id = NULL, claim_expires_at = NULL
                WHERE id = ? AND owner = ? AND status IN ('queued', 'running')
                ",
                &[
                    SqlParam::I64(now),
                    SqlParam::String(id.to_string()),
                    SqlParam::String(owner.to_owned()),
                ],
            )
            .await?;
        Ok(affected == 1)
    }

    async fn expired_running(&self, now: i64, limit: usize) -> Result<Vec<Job>> {
        query_helpers::query_all(
            &self.executor,
            r"
            SELECT * FROM jobs
            WHERE status = 'running' AND claim_expires_at < ?
            ORDER BY claim_expires_at ASC
            LIMIT ?
            ",
            &[SqlParam::I64(now), SqlParam::I64(limit as i64)],
            row_convert::row_to_job,
            "job",
        )
        .await
    }

    async fn running_started_before(&self, cutoff: i64, limit: usize) -> Result<Vec<Job>> {
        query_helpers::query_all(
            &self.executor,
            r"
            SELECT * FROM jobs
            WHERE status = 'running' AND started_at IS NOT NULL AND started_at < ?
            ORDER BY started_at ASC
            LIMIT ?
            ",
            &[SqlParam::I64(cutoff), SqlParam::I64(limit as i64)],
            row_convert::row_to_job,
            "job",
        )
        .await
    }

    async fn completed_before(&self, cutoff: i64, limit: usize) -> Result<Vec<Job>> {
        query_helpers::query_all(
            &self.executor,
            r"
            SELECT * FROM jobs
            WHERE result_present = 1
              AND status IN ('completed', 'failed', 'cancelled')
              AND completed_at < ?
            ORDER BY completed_at ASC
            LIMIT ?
            ",
            &[SqlParam::I64(cutoff), SqlParam::I64(limit as i64)],
            row_convert::row_to_job,
            "job",
        )
        .await
    }

    async fn clear_result_present(&self, id: &JobId) -> Result<()> {
        self.executor
            .execute(
                "UPDATE jobs SET result_present = 0 WHERE id = ?",
                &[SqlParam::String(id.to_string())],
            )
            .await?;
        Ok(())
    }

    async fn all_ids(&self) -> Result<Vec<JobId>> {
        let rows = self.executor.query_all("SELECT id FROM jobs", &[]).await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(id) = row.try_get_string("id")? {
                ids.push(JobId::parse(&id)?);
            }
        }
        Ok(ids)
    }
}
