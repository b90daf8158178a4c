//! `SQLite` prompt metrics repository.

use std::sync::Arc;

use async_trait::async_trait;
use binlift_domain::entities::PromptMetrics;
use binlift_domain::error::Result;
use binlift_domain::ports::{DatabaseExecutor, PromptMetricsRepository, SqlParam};

use super::query_helpers;
use super::row_convert;

/// `SQLite`-backed implementation of the [`PromptMetricsRepository`] port.
pub struct SqlitePromptMetricsRepository {
    executor: Arc<dyn DatabaseExecutor>,
}

impl SqlitePromptMetricsRepository {
    /// Create a repository that uses the given executor.
    #[must_use]
    pub fn new(executor: Arc<dyn DatabaseExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl PromptMetricsRepository for SqlitePromptMetricsRepository {
    async fn record(
        &self,
        template_id: &str,
        provider_id: &str,
        success: bool,
        quality: Option<f64>,
        latency_ms: u64,
    ) -> Result<()> {
        self.executor
            .execute(
                r"
                INSERT INTO prompt_metrics (template_id, provider_id, total_uses, successes,
                                            quality_sum, quality_count, latency_sum_ms)
                VALUES (?, ?, 1, ?, ?, ?, ?)
                ON CONFLICT(template_id, provider_id) DO UPDATE SET
                    total_uses = total_uses + 1,
                    successes = successes + excluded.successes,
                    quality_sum = quality_sum + excluded.quality_sum,
                    quality_count = quality_count + excluded.quality_count,
                    latency_sum_ms = latency_sum_ms + excluded.latency_sum_ms
                ",
                &[
                    SqlParam::String(template_id.to_owned()),
                    SqlParam::String(provider_id.to_owned()),
                    SqlParam::I64(i64::from(success)),
                    SqlParam::F64(quality.unwrap_or(0.0)),
                    SqlParam::I64(i64::from(quality.is_some())),
                    SqlParam::I64(latency_ms as i64),
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, template_id: &str, provider_id: &str) -> Result<Option<PromptMetrics>> {
        query_helpers::query_one(
            &self.executor,
            "SELECT * FROM prompt_metrics WHERE template_id = ? AND provider_id = ?",
            &[
                SqlParam::String(template_id.to_owned()),
                SqlParam::String(provider_id.to_owned()),
            ],
            row_convert::row_to_prompt_metrics,
        )
        .await
    }
}
