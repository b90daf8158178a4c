//! `SQLite` usage ledger repository.
//!
//! The ledger is monotonic: `add` only ever increases counters, one upsert
//! statement per call. Budget sums are computed on read.

use std::sync::Arc;

use async_trait::async_trait;
use binlift_domain::entities::{OperationType, UsageRecord};
use binlift_domain::error::Result;
use binlift_domain::ports::{DatabaseExecutor, SqlParam, UsageRepository};

use super::query_helpers;
use super::row_convert;

/// `SQLite`-backed implementation of the [`UsageRepository`] port.
pub struct SqliteUsageRepository {
    executor: Arc<dyn DatabaseExecutor>,
}

impl SqliteUsageRepository {
    /// Create a repository that uses the given executor.
    #[must_use]
    pub fn new(executor: Arc<dyn DatabaseExecutor>) -> Self {
        Self { executor }
    }

    async fn sum_cost(&self, sql: &str, params: &[SqlParam]) -> Result<f64> {
        let row = self.executor.query_one(sql, params).await?;
        Ok(row
            .and_then(|r| r.try_get_f64("total").ok().flatten())
            .unwrap_or(0.0))
    }
}

#[async_trait]
impl UsageRepository for SqliteUsageRepository {
    async fn add(
        &self,
        owner: &str,
        provider_id: &str,
        day: &str,
        operation: OperationType,
        tokens: u64,
        requests: u64,
        cost: f64,
    ) -> Result<()> {
        self.executor
            .execute(
                r"
                INSERT INTO usage (owner, provider_id, day, operation_type,
                                   tokens_used, requests, cost)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(owner, provider_id, day, operation_type) DO UPDATE SET
                    tokens_used = tokens_used + excluded.tokens_used,
                    requests = requests + excluded.requests,
                    cost = cost + excluded.cost
                ",
                &[
                    SqlParam::String(owner.to_owned()),
                    SqlParam::String(provider_id.to_owned()),
                    SqlParam::String(day.to_owned()),
                    SqlParam::String(operation.as_str().to_owned()),
                    SqlParam::I64(tokens as i64),
                    SqlParam::I64(requests as i64),
                    SqlParam::F64(cost),
                ],
            )
            .await?;
        Ok(())
    }

    async fn cost_for_day(&self, owner: &str, provider_id: &str, day: &str) -> Result<f64> {
        self.sum_cost(
            r"
            SELECT COALESCE(SUM(cost), 0) AS total FROM usage
            WHERE owner = ? AND provider_id = ? AND day = ?
            ",
            &[
                SqlParam::String(owner.to_owned()),
                SqlParam::String(provider_id.to_owned()),
                SqlParam::String(day.to_owned()),
            ],
        )
        .await
    }

    async fn cost_for_month(&self, owner: &str, provider_id: &str, month: &str) -> Result<f64> {
        self.sum_cost(
            r"
            SELECT COALESCE(SUM(cost), 0) AS total FROM usage
            WHERE owner = ? AND provider_id = ? AND day LIKE ?
            ",
            &[
                SqlParam::String(owner.to_owned()),
                SqlParam::String(provider_id.to_owned()),
                SqlParam::String(format!("{month}-%")),
            ],
        )
        .await
    }

    async fn get(
        &self,
        owner: &str,
        provider_id: &str,
        day: &str,
        operation: OperationType,
    ) -> Result<Option<UsageRecord>> {
        query_helpers::query_one(
            &self.executor,
            r"
            SELECT * FROM usage
            WHERE owner = ? AND provider_id = ? AND day = ? AND operation_type = ?
            ",
            &[
                SqlParam::String(owner.to_owned()),
                SqlParam::String(provider_id.to_owned()),
                SqlParam::String(day.to_owned()),
                SqlParam::String(operation.as_str().to_owned()),
            ],
            row_convert::row_to_usage,
        )
        .await
    }
}
