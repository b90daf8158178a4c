//! `SQLite` upload session repository.

use std::sync::Arc;

use async_trait::async_trait;
use binlift_domain::entities::UploadSession;
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::{DatabaseExecutor, SqlParam, UploadSessionRepository};
use binlift_domain::value_objects::UploadSessionId;

use super::query_helpers;
use super::row_convert;

/// `SQLite`-backed implementation of the [`UploadSessionRepository`] port.
pub struct SqliteUploadSessionRepository {
    executor: Arc<dyn DatabaseExecutor>,
}

impl SqliteUploadSessionRepository {
    /// Create a repository that uses the given executor.
    #[must_use]
    pub fn new(executor: Arc<dyn DatabaseExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl UploadSessionRepository for SqliteUploadSessionRepository {
    async fn insert(&self, session: &UploadSession) -> Result<()> {
        self.executor
            .execute(
                r"
                INSERT INTO upload_sessions (id, owner, created_at, expires_at, accepted_refs_json)
                VALUES (?, ?, ?, ?, ?)
                ",
                &[
                    SqlParam::String(session.id.to_string()),
                    SqlParam::String(session.owner.clone()),
                    SqlParam::I64(session.created_at),
                    SqlParam::I64(session.expires_at),
                    SqlParam::String(serde_json::to_string(&session.accepted_file_refs)?),
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: &UploadSessionId) -> Result<Option<UploadSession>> {
        query_helpers::query_one(
            &self.executor,
            "SELECT * FROM upload_sessions WHERE id = ?",
            &[SqlParam::String(id.to_string())],
            row_convert::row_to_upload_session,
        )
        .await
    }

    async fn add_file_ref(&self, id: &UploadSessionId, sha256: &str) -> Result<()> {
        // json_insert appends only when the value is not already present at
        // the computed index, keeping the list duplicate-free per session.
        let affected = self
            .executor
            .execute(
                r"
                UPDATE upload_sessions
                SET accepted_refs_json = json_insert(
                        accepted_refs_json,
                        '$[' || json_array_length(accepted_refs_json) || ']',
                        ?
                    )
                WHERE id = ?
                ",
                &[
                    SqlParam::String(sha256.to_owned()),
                    SqlParam::String(id.to_string()),
                ],
            )
            .await?;
        if affected == 0 {
            return Err(Error::not_found(format!("upload session {id}")));
        }
        Ok(())
    }

    async fn expired(&self, now: i64, limit: usize) -> Result<Vec<UploadSession>> {
        query_helpers::query_all(
            &self.executor,
            "SELECT * FROM upload_sessions WHERE expires_at <= ? LIMIT ?",
            &[SqlParam::I64(now), SqlParam::I64(limit as i64)],
            row_convert::row_to_upload_session,
            "upload session",
        )
        .await
    }

    async fn delete(&self, id: &UploadSessionId) -> Result<()> {
        self.executor
            .execute(
                "DELETE FROM upload_sessions WHERE id = ?",
                &[SqlParam::String(id.to_string())],
            )
            .await?;
        Ok(())
    }
}
