//! `SQLite` artifact repository.
//!
//! Artifacts are deduplicated by content hash and reference-counted by the
//! jobs that use them; both directions of the count move through single
//! upsert/update statements.

use std::sync::Arc;

use async_trait::async_trait;
use binlift_domain::entities::{BinaryArtifact, BinaryFormat};
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::{ArtifactRepository, DatabaseExecutor, SqlParam};

use super::query_helpers;
use super::row_convert;

/// `SQLite`-backed implementation of the [`ArtifactRepository`] port.
pub struct SqliteArtifactRepository {
    executor: Arc<dyn DatabaseExecutor>,
}

impl SqliteArtifactRepository {
    /// Create a repository that uses the given executor.
    #[must_use]
    pub fn new(executor: Arc<dyn DatabaseExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ArtifactRepository for SqliteArtifactRepository {
    async fn upsert_reference(&self, artifact: &BinaryArtifact) -> Result<BinaryArtifact> {
        self.executor
            .execute(
                r"
                INSERT INTO artifacts (sha256, size, format, architecture, platform,
                                       path_in_store, ref_count, created_at)
                VALUES (?, ?, ?, ?, ?, ?, 1, ?)
                ON CONFLICT(sha256) DO UPDATE SET
                    ref_count = ref_count + 1,
                    last_unreferenced_at = NULL
                ",
                &[
                    SqlParam::String(artifact.sha256.clone()),
                    SqlParam::I64(artifact.size as i64),
                    SqlParam::String(artifact.format.to_string()),
                    SqlParam::String(artifact.architecture.clone()),
                    SqlParam::String(artifact.platform.clone()),
                    SqlParam::String(artifact.path_in_store.clone()),
                    SqlParam::I64(artifact.created_at),
                ],
            )
            .await?;
        self.get(&artifact.sha256)
            .await?
            .ok_or_else(|| Error::storage_tx("artifact vanished after upsert"))
    }

    async fn insert_unreferenced(&self, artifact: &BinaryArtifact, now: i64) -> Result<()> {
        self.executor
            .execute(
                r"
                INSERT INTO artifacts (sha256, size, format, architecture, platform,
                                       path_in_store, ref_count, created_at,
                                       last_unreferenced_at)
                VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
                ON CONFLICT(sha256) DO NOTHING
                ",
                &[
                    SqlParam::String(artifact.sha256.clone()),
                    SqlParam::I64(artifact.size as i64),
                    SqlParam::String(artifact.format.to_string()),
                    SqlParam::String(artifact.architecture.clone()),
                    SqlParam::String(artifact.platform.clone()),
                    SqlParam::String(artifact.path_in_store.clone()),
                    SqlParam::I64(artifact.created_at),
                    SqlParam::I64(now),
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, sha256: &str) -> Result<Option<BinaryArtifact>> {
        query_helpers::query_one(
            &self.executor,
            "SELECT * FROM artifacts WHERE sha256 = ?",
            &[SqlParam::String(sha256.to_owned())],
            row_convert::row_to_artifact,
        )
        .await
    }

    async fn set_analysis(
        &self,
        sha256: &str,
        format: BinaryFormat,
        architecture: &str,
        platform: &str,
    ) -> Result<()> {
        self.executor
            .execute(
                "UPDATE artifacts SET format = ?, architecture = ?, platform = ? WHERE sha256 = ?",
                &[
                    SqlParam::String(format.to_string()),
                    SqlParam::String(architecture.to_owned()),
                    SqlParam::String(platform.to_owned()),
                    SqlParam::String(sha256.to_owned()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn release_reference(&self, sha256: &str, now: i64) -> Result<()> {
        self.executor
            .execute(
                r"
                UPDATE artifacts
                SET ref_count = MAX(ref_count - 1, 0),
                    last_unreferenced_at = CASE
                        WHEN ref_count - 1 <= 0 THEN ?
                        ELSE last_unreferenced_at
                    END
                WHERE sha256 = ?
                ",
                &[SqlParam::I64(now), SqlParam::String(sha256.to_owned())],
            )
            .await?;
        Ok(())
    }

    async fn unreferenced_before(&self, cutoff: i64, limit: usize) -> Result<Vec<BinaryArtifact>> {
        query_helpers::query_all(
            &self.executor,
            r"
            SELECT * FROM artifacts
            WHERE ref_count = 0
              AND last_unreferenced_at IS NOT NULL
              AND last_unreferenced_at < ?
            LIMIT ?
            ",
            &[SqlParam::I64(cutoff), SqlParam::I64(limit as i64)],
            row_convert::row_to_artifact,
            "artifact",
        )
        .await
    }

    async fn delete(&self, sha256: &str) -> Result<()> {
        self.executor
            .execute(
                "DELETE FROM artifacts WHERE sha256 = ?",
                &[SqlParam::String(sha256.to_owned())],
            )
            .await?;
        Ok(())
    }
}
