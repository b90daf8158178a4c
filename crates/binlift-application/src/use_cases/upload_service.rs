//! Upload session service.
//!
//! A session is a bounded window during which a client hands over binaries
//! before submitting jobs against them. Accepted artifacts start with no
//! job references; if nothing submits against them, the janitor collects
//! them once the grace period passes.

use std::sync::Arc;

use binlift_domain::constants::storage::{session_key, upload_key};
use binlift_domain::entities::{BinaryArtifact, UploadSession, content_hash};
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::{ArtifactRepository, BlobStore, UploadSessionRepository};
use binlift_domain::value_objects::UploadSessionId;
use tracing::info;

use crate::services::clock::Clock;

/// Upload service tuning.
#[derive(Debug, Clone)]
pub struct UploadServiceConfig {
    /// Session lifetime in seconds.
    pub session_ttl_secs: i64,
    /// Upload size ceiling in bytes.
    pub max_file_size_bytes: u64,
}

impl Default for UploadServiceConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 30 * 60,
            max_file_size_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Session-scoped binary intake.
pub struct UploadService {
    sessions: Arc<dyn UploadSessionRepository>,
    artifacts: Arc<dyn ArtifactRepository>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    config: UploadServiceConfig,
}

impl UploadService {
    /// Create the service.
    #[must_use]
    pub fn new(
        sessions: Arc<dyn UploadSessionRepository>,
        artifacts: Arc<dyn ArtifactRepository>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        config: UploadServiceConfig,
    ) -> Self {
        Self {
            sessions,
            artifacts,
            blobs,
            clock,
            config,
        }
    }

    /// Open a session for `owner`.
    pub async fn open_session(&self, owner: &str) -> Result<UploadSession> {
        if owner.trim().is_empty() {
            return Err(Error::validation("owner must not be empty"));
        }
        let now = self.clock.now();
        let session = UploadSession {
            id: UploadSessionId::new(),
            owner: owner.to_owned(),
            created_at: now,
            expires_at: now + self.config.session_ttl_secs,
            accepted_file_refs: Vec::new(),
        };
        self.sessions.insert(&session).await?;
        self.blobs
            .put(&session_key(&session.id), &serde_json::to_vec(&session)?)
            .await?;
        info!(session_id = %session.id, owner, "upload session opened");
        Ok(session)
    }

    /// Accept one binary into the session; returns its content hash.
    ///
    /// # Errors
    ///
    /// Rejects expired sessions and files past the size ceiling (a file of
    /// exactly the ceiling passes).
    pub async fn accept(&self, session_id: &UploadSessionId, bytes: &[u8]) -> Result<String> {
        let now = self.clock.now();
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("upload session {session_id}")))?;
        if session.is_expired(now) {
            return Err(Error::validation(format!(
                "upload session {session_id} has expired"
            )));
        }
        if bytes.is_empty() {
            return Err(Error::validation("uploaded file is empty"));
        }
        if bytes.len() as u64 > self.config.max_file_size_bytes {
            return Err(Error::validation(format!(
                "file of {} bytes exceeds the limit of {} bytes",
                bytes.len(),
                self.config.max_file_size_bytes
            )));
        }

        let sha256 = content_hash(bytes);
        let key = upload_key(&sha256);
        if !self.blobs.exists(&key).await? {
            self.blobs.put(&key, bytes).await?;
        }
        let artifact = BinaryArtifact::new(sha256.clone(), bytes.len() as u64, now);
        self.artifacts.insert_unreferenced(&artifact, now).await?;
        self.sessions.add_file_ref(session_id, &sha256).await?;
        info!(session_id = %session_id, sha256, size = bytes.len(), "upload accepted");
        Ok(sha256)
    }
}
