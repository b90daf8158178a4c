//! `SQLite` API key repository (read-only from the core's point of view).

use std::sync::Arc;

use async_trait::async_trait;
use binlift_domain::entities::ApiKey;
use binlift_domain::error::Result;
use binlift_domain::ports::{ApiKeyRepository, DatabaseExecutor, SqlParam};

use super::query_helpers;
use super::row_convert;

/// `SQLite`-backed implementation of the [`ApiKeyRepository`] port.
pub struct SqliteApiKeyRepository {
    executor: Arc<dyn DatabaseExecutor>,
}

impl SqliteApiKeyRepository {
    /// Create a repository that uses the given executor.
    #[must_use]
    pub fn new(executor: Arc<dyn DatabaseExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ApiKeyRepository for SqliteApiKeyRepository {
    async fn get(&self, id: &str) -> Result<Option<ApiKey>> {
        query_helpers::query_one(
            &self.executor,
            "SELECT * FROM api_keys WHERE id = ?",
            &[SqlParam::String(id.to_owned())],
            row_convert::row_to_api_key,
        )
        .await
    }

    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>> {
        query_helpers::query_one(
            &self.executor,
            "SELECT * FROM api_keys WHERE key_hash = ? AND active = 1",
            &[SqlParam::String(key_hash.to_owned())],
            row_convert::row_to_api_key,
        )
        .await
    }

    async fn tier_for_owner(&self, owner: &str) -> Result<Option<String>> {
        let row = self
            .executor
            .query_one(
                r"
                SELECT tier FROM api_keys
                WHERE owner = ? AND active = 1
                ORDER BY created_at DESC
                LIMIT 1
                ",
                &[SqlParam::String(owner.to_owned())],
            )
            .await?;
        Ok(row.and_then(|r| r.try_get_string("tier").ok().flatten()))
    }
}
