//! `SQLite` rate-window repository.
//!
//! One bucket row per `(subject, endpoint, window_start)`. The increment is
//! a single `INSERT … ON CONFLICT … RETURNING` statement so count-and-read
//! cannot interleave with a concurrent admit.

use std::sync::Arc;

use async_trait::async_trait;
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::{DatabaseExecutor, RateWindowRepository, SqlParam};

/// `SQLite`-backed implementation of the [`RateWindowRepository`] port.
pub struct SqliteRateWindowRepository {
    executor: Arc<dyn DatabaseExecutor>,
}

impl SqliteRateWindowRepository {
    /// Create a repository that uses the given executor.
    #[must_use]
    pub fn new(executor: Arc<dyn DatabaseExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl RateWindowRepository for SqliteRateWindowRepository {
    async fn increment(&self, subject: &str, endpoint: &str, window_start: i64) -> Result<i64> {
        let row = self
            .executor
            .query_one(
                r"
                INSERT INTO rate_windows (subject, endpoint, window_start, count)
                VALUES (?, ?, ?, 1)
                ON CONFLICT(subject, endpoint, window_start) DO UPDATE SET
                    count = count + 1
                RETURNING count
                ",
                &[
                    SqlParam::String(subject.to_owned()),
                    SqlParam::String(endpoint.to_owned()),
                    SqlParam::I64(window_start),
                ],
            )
            .await?;
        row.and_then(|r| r.try_get_i64("count").ok().flatten())
            .ok_or_else(|| Error::storage_tx("rate window increment returned no count"))
    }

    async fn window_sum(&self, subject: &str, endpoint: &str, since: i64) -> Result<i64> {
        let row = self
            .executor
            .query_one(
                r"
                SELECT COALESCE(SUM(count), 0) AS total FROM rate_windows
                WHERE subject = ? AND endpoint = ? AND window_start > ?
                ",
                &[
                    SqlParam::String(subject.to_owned()),
                    SqlParam::String(endpoint.to_owned()),
                    SqlParam::I64(since),
                ],
            )
            .await?;
        Ok(row
            .and_then(|r| r.try_get_i64("total").ok().flatten())
            .unwrap_or(0))
    }

    async fn oldest_in_window(
        &self,
        subject: &str,
        endpoint: &str,
        since: i64,
    ) -> Result<Option<i64>> {
        let row = self
            .executor
            .query_one(
                r"
                SELECT MIN(window_start) AS oldest FROM rate_windows
                WHERE subject = ? AND endpoint = ? AND window_start > ? AND count > 0
                ",
                &[
                    SqlParam::String(subject.to_owned()),
                    SqlParam::String(endpoint.to_owned()),
                    SqlParam::I64(since),
                ],
            )
            .await?;
        Ok(row.and_then(|r| r.try_get_i64("oldest").ok().flatten()))
    }

    async fn prune_before(&self, cutoff: i64) -> Result<u64> {
        self.executor
            .execute(
                "DELETE FROM rate_windows WHERE window_start <= ?",
                &[SqlParam::I64(cutoff)],
            )
            .await
    }
}
