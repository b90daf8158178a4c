//! Job lifecycle service.
//!
//! # Overview
//! Implements the [`JobQueue`] port: submission with artifact dedup and
//! idempotency, collision-free claiming, lease heartbeats with cancellation
//! signalling, and terminal transitions with retry backoff. All state moves
//! through the job repository's conditional updates; this service decides,
//! the statement enforces.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use binlift_domain::constants::limits::{DEFAULT_JOB_LEASE_SECS, DEFAULT_MAX_ATTEMPTS};
use binlift_domain::constants::storage::{
    decomp_result_key, translation_result_key, upload_key,
};
use binlift_domain::entities::{
    BinaryArtifact, FileRef, Job, JobError, JobSpec, JobStatus, content_hash,
};
use binlift_domain::error::{Error, Result};
use binlift_domain::events::{Outcome, TelemetryEvent, TelemetrySink};
use binlift_domain::ports::{
    ApiKeyRepository, ArtifactRepository, BlobStore, HeartbeatSignal, JobQueue, JobRepository,
};
use binlift_domain::value_objects::{JobId, WorkerId};
use tracing::{info, warn};

use crate::services::clock::Clock;

/// Tuning for the job service.
#[derive(Debug, Clone)]
pub struct JobServiceConfig {
    /// Lease duration granted per claim/heartbeat.
    pub lease_secs: i64,
    /// Attempt ceiling for retryable failures.
    pub max_attempts: u32,
    /// Upload size ceiling in bytes; a file of exactly this size passes.
    pub max_file_size_bytes: u64,
    /// Pending-job cap per tier name.
    pub pending_caps: HashMap<String, u64>,
    /// Cap applied to owners without a tier.
    pub default_pending_cap: u64,
    /// First retry backoff step in seconds; doubles per attempt.
    pub retry_backoff_base_secs: i64,
}

impl Default for JobServiceConfig {
    fn default() -> Self {
        Self {
            lease_secs: DEFAULT_JOB_LEASE_SECS as i64,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_file_size_bytes: 100 * 1024 * 1024,
            pending_caps: HashMap::new(),
            default_pending_cap: 10,
            retry_backoff_base_secs: 30,
        }
    }
}

/// The job manager.
pub struct JobService {
    jobs: Arc<dyn JobRepository>,
    artifacts: Arc<dyn ArtifactRepository>,
    api_keys: Arc<dyn ApiKeyRepository>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn TelemetrySink>,
    config: JobServiceConfig,
}

impl JobService {
    /// Create the service.
    #[must_use]
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        artifacts: Arc<dyn ArtifactRepository>,
        api_keys: Arc<dyn ApiKeyRepository>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn TelemetrySink>,
        config: JobServiceConfig,
    ) -> Self {
        Self {
            jobs,
            artifacts,
            api_keys,
            blobs,
            clock,
            telemetry,
            config,
        }
    }

    fn validate_spec(&self, spec: &JobSpec) -> Result<()> {
        if spec.owner.trim().is_empty() {
            return Err(Error::validation("owner must not be empty"));
        }
        match &spec.file_ref {
            FileRef::Sha256(hash) => {
                if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(Error::validation(format!(
                        "file_ref '{hash}' is not a sha256 hash"
                    )));
                }
            }
            FileRef::Inline { bytes, .. } => {
                if bytes.is_empty() {
                    return Err(Error::validation("inline file is empty"));
                }
                if bytes.len() as u64 > self.config.max_file_size_bytes {
                    return Err(Error::validation(format!(
                        "file of {} bytes exceeds the limit of {} bytes",
                        bytes.len(),
                        self.config.max_file_size_bytes
                    )));
                }
            }
        }
        Ok(())
    }

    async fn enforce_pending_cap(&self, owner: &str) -> Result<()> {
        let tier = self.api_keys.tier_for_owner(owner).await?;
        let cap = tier
            .as_deref()
            .and_then(|t| self.config.pending_caps.get(t).copied())
            .unwrap_or(self.config.default_pending_cap);
        let active = self.jobs.count_active_for_owner(owner).await?;
        if active >= cap {
            return Err(Error::validation(format!(
                "owner '{owner}' has {active} pending jobs (cap {cap})"
            )));
        }
        Ok(())
    }

    /// Resolve the spec's file reference to a stored artifact, hashing and
    /// storing inline bytes on first sight.
    async fn resolve_artifact(&self, spec: &JobSpec, now: i64) -> Result<String> {
        match &spec.file_ref {
            FileRef::Sha256(hash) => {
                let existing = self
                    .artifacts
                    .get(hash)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("artifact {hash}")))?;
                self.artifacts.upsert_reference(&existing).await?;
                Ok(hash.clone())
            }
            FileRef::Inline { bytes, .. } => {
                let hash = content_hash(bytes);
                let key = upload_key(&hash);
                if !self.blobs.exists(&key).await? {
                    self.blobs.put(&key, bytes).await?;
                }
                let artifact = BinaryArtifact::new(hash.clone(), bytes.len() as u64, now);
                self.artifacts.upsert_reference(&artifact).await?;
                Ok(hash)
            }
        }
    }

    fn backoff_visible_at(&self, now: i64, attempts: u32) -> i64 {
        let factor = 1i64 << attempts.min(10);
        now + self.config.retry_backoff_base_secs.saturating_mul(factor)
    }
}

#[async_trait]
impl JobQueue for JobService {
    async fn submit(&self, spec: JobSpec) -> Result<JobId> {
        self.validate_spec(&spec)?;
        let now = self.clock.now();

        if let Some(key) = &spec.idempotency_key {
            if let Some(existing) = self.jobs.find_by_idempotency(&spec.owner, key).await? {
                return Ok(existing.id);
            }
        }
        self.enforce_pending_cap(&spec.owner).await?;

        let sha256 = self.resolve_artifact(&spec, now).await?;
        let mut job = Job::new(JobId::new(), &spec, sha256, now);
        job.max_attempts = self.config.max_attempts;
        self.jobs.insert(&job).await?;

        info!(job_id = %job.id, owner = %job.owner, "job submitted");
        self.telemetry.emit(
            TelemetryEvent::new("job_submitted", Outcome::Success)
                .job(job.id)
                .owner(&job.owner),
        );
        Ok(job.id)
    }

    async fn claim(&self, worker: WorkerId, max: usize) -> Result<Vec<Job>> {
        let now = self.clock.now();
        let lease_expires = now + self.config.lease_secs;
        // Over-fetch candidates: some will be claimed by rival workers
        // between the scan and our conditional update.
        let candidates = self.jobs.claimable(now, max.saturating_mul(2).max(8)).await?;

        let mut claimed = Vec::with_capacity(max);
        for candidate in candidates {
            if claimed.len() == max {
                break;
            }
            if self
                .jobs
                .try_claim(&candidate.id, &worker, now, lease_expires)
                .await?
            {
                // Re-read for the updated lease fields.
                if let Some(job) = self.jobs.get(&candidate.id).await? {
                    self.telemetry.emit(
                        TelemetryEvent::new("job_claimed", Outcome::Success)
                            .job(job.id)
                            .owner(&job.owner),
                    );
                    claimed.push(job);
                }
            }
        }
        Ok(claimed)
    }

    async fn heartbeat(
        &self,
        job_id: JobId,
        worker: WorkerId,
        progress: f64,
    ) -> Result<HeartbeatSignal> {
        let now = self.clock.now();
        let lease_expires = now + self.config.lease_secs;
        if self
            .jobs
            .try_extend_lease(&job_id, &worker, progress.clamp(0.0, 1.0), lease_expires)
            .await?
        {
            return Ok(HeartbeatSignal::Continue);
        }

        let job = self
            .jobs
            .get(&job_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("job {job_id}")))?;
        match job.status {
            JobStatus::Cancelled => Ok(HeartbeatSignal::Cancelled),
            JobStatus::Running => Err(Error::validation(format!(
                "job {job_id} is held by another worker"
            ))),
            _ => Err(Error::validation(format!(
                "job {job_id} is {} and cannot be heartbeat",
                job.status
            ))),
        }
    }

    async fn complete(&self, job_id: JobId, worker: WorkerId, result_blob_key: &str) -> Result<()> {
        let expected_decomp = decomp_result_key(&job_id);
        let expected_translation = translation_result_key(&job_id);
        if result_blob_key != expected_decomp && result_blob_key != expected_translation {
            return Err(Error::invalid_argument(format!(
                "result key '{result_blob_key}' does not belong to job {job_id}"
            )));
        }

        let now = self.clock.now();
        if self.jobs.try_complete(&job_id, &worker, now).await? {
            info!(job_id = %job_id, "job completed");
            self.telemetry
                .emit(TelemetryEvent::new("job_completed", Outcome::Success).job(job_id));
            if let Some(job) = self.jobs.get(&job_id).await? {
                self.artifacts.release_reference(&job.file_sha256, now).await?;
            }
            return Ok(());
        }

        let job = self
            .jobs
            .get(&job_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("job {job_id}")))?;
        // Completing an already-completed job with its own key is a no-op.
        if job.status == JobStatus::Completed {
            return Ok(());
        }
        Err(Error::validation(format!(
            "job {job_id} is {} and cannot complete",
            job.status
        )))
    }

    async fn fail(
        &self,
        job_id: JobId,
        worker: WorkerId,
        error: JobError,
        retryable: bool,
    ) -> Result<()> {
        let now = self.clock.now();
        let job = self
            .jobs
            .get(&job_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("job {job_id}")))?;

        if retryable && job.attempts + 1 < job.max_attempts {
            let visible_at = self.backoff_visible_at(now, job.attempts);
            if self
                .jobs
                .try_requeue(&job_id, Some(&worker), visible_at, &error, now)
                .await?
            {
                warn!(job_id = %job_id, code = %error.code, visible_at, "job requeued for retry");
                self.telemetry
                    .emit(TelemetryEvent::new("job_requeued", Outcome::Failure).job(job_id));
                return Ok(());
            }
        } else if self.jobs.try_fail(&job_id, Some(&worker), &error, now).await? {
            warn!(job_id = %job_id, code = %error.code, "job failed terminally");
            self.telemetry
                .emit(TelemetryEvent::new("job_failed", Outcome::Failure).job(job_id));
            self.artifacts.release_reference(&job.file_sha256, now).await?;
            return Ok(());
        }

        // The conditional update lost: the job is no longer running under
        // this worker (cancelled, reclaimed, or already terminal).
        let current = self.jobs.get(&job_id).await?;
        match current.map(|j| j.status) {
            Some(status) if status.is_terminal() => Ok(()),
            Some(status) => Err(Error::validation(format!(
                "job {job_id} is {status} under another worker"
            ))),
            None => Err(Error::not_found(format!("job {job_id}"))),
        }
    }

    async fn cancel(&self, job_id: JobId, owner: &str) -> Result<()> {
        let now = self.clock.now();
        if self.jobs.try_cancel(&job_id, owner, now).await? {
            info!(job_id = %job_id, owner, "job cancelled");
            self.telemetry.emit(
                TelemetryEvent::new("job_cancelled", Outcome::Cancelled)
                    .job(job_id)
                    .owner(owner),
            );
            if let Some(job) = self.jobs.get(&job_id).await? {
                self.artifacts.release_reference(&job.file_sha256, now).await?;
            }
            return Ok(());
        }

        let job = self
            .jobs
            .get(&job_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("job {job_id}")))?;
        if job.owner != owner {
            return Err(Error::validation(format!(
                "job {job_id} does not belong to '{owner}'"
            )));
        }
        if job.status == JobStatus::Cancelled {
            return Ok(());
        }
        Err(Error::validation(format!(
            "job {job_id} is already {}",
            job.status
        )))
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>> {
        self.jobs.get(&job_id).await
    }
}
