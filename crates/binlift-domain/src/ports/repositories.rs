//! Repository ports for data persistence.
//!
//! All job-state transitions are conditional updates (`… WHERE status =
//! expected`) executed as single statements; the boolean returns report
//! whether the caller won the race.

use async_trait::async_trait;

use crate::entities::{
    ApiKey, BinaryArtifact, BinaryFormat, Job, JobError, OperationType, PromptMetrics,
    UploadSession, UsageRecord,
};
use crate::error::Result;
use crate::value_objects::{JobId, UploadSessionId, WorkerId};

// ============================================================================
// Jobs
// ============================================================================

/// Persistence for [`Job`] rows.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new queued job.
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Fetch one job by id.
    async fn get(&self, id: &JobId) -> Result<Option<Job>>;

    /// Find a prior submission by idempotency key.
    async fn find_by_idempotency(&self, owner: &str, key: &str) -> Result<Option<Job>>;

    /// Count the owner's non-terminal jobs (pending-cap enforcement).
    async fn count_active_for_owner(&self, owner: &str) -> Result<u64>;

    /// Claimable candidates: `queued`, visible, ordered by
    /// `(priority desc, created_at asc)`.
    async fn claimable(&self, now: i64, limit: usize) -> Result<Vec<Job>>;

    /// Atomically claim one job for `worker`. Returns `false` when another
    /// worker won.
    async fn try_claim(
        &self,
        id: &JobId,
        worker: &WorkerId,
        now: i64,
        lease_expires: i64,
    ) -> Result<bool>;

    /// Extend the lease and update progress, conditional on `worker` holding
    /// the job in `running`. Returns `false` when the condition failed.
    async fn try_extend_lease(
        &self,
        id: &JobId,
        worker: &WorkerId,
        progress: f64,
        lease_expires: i64,
    ) -> Result<bool>;

    /// Transition `running → completed` with `result_present = true`,
    /// conditional on the worker. Returns `false` when the condition failed.
    async fn try_complete(&self, id: &JobId, worker: &WorkerId, now: i64) -> Result<bool>;

    /// Return a running job to `queued` with backoff, incrementing
    /// `attempts`. `worker` of `None` matches any holder (janitor path,
    /// conditional on the lease having expired before `now`).
    async fn try_requeue(
        &self,
        id: &JobId,
        worker: Option<&WorkerId>,
        visible_at: i64,
        error: &JobError,
        now: i64,
    ) -> Result<bool>;

    /// Transition `running → failed` terminally. Returns `false` when the
    /// condition failed.
    async fn try_fail(
        &self,
        id: &JobId,
        worker: Option<&WorkerId>,
        error: &JobError,
        now: i64,
    ) -> Result<bool>;

    /// Transition `running → failed` regardless of lease state (janitor
    /// wall-clock timeout enforcement).
    async fn force_fail(&self, id: &JobId, error: &JobError, now: i64) -> Result<bool>;

    /// Transition a non-terminal job to `cancelled` for its owner.
    async fn try_cancel(&self, id: &JobId, owner: &str, now: i64) -> Result<bool>;

    /// Running jobs whose lease expired before `now` (janitor scan).
    async fn expired_running(&self, now: i64, limit: usize) -> Result<Vec<Job>>;

    /// Running jobs that first started before `cutoff` (wall-clock timeout
    /// scan).
    async fn running_started_before(&self, cutoff: i64, limit: usize) -> Result<Vec<Job>>;

    /// Terminal jobs with `result_present = true` completed before `cutoff`
    /// (TTL sweep scan).
    async fn completed_before(&self, cutoff: i64, limit: usize) -> Result<Vec<Job>>;

    /// Record that a job's result payloads were swept.
    async fn clear_result_present(&self, id: &JobId) -> Result<()>;

    /// All job ids currently present (orphan-blob sweep).
    async fn all_ids(&self) -> Result<Vec<JobId>>;
}

// ============================================================================
// Artifacts
// ============================================================================

/// Persistence for [`BinaryArtifact`] rows, reference-counted by job usage.
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Insert a new artifact, or atomically increment the reference count of
    /// an existing row with the same hash. Returns the stored artifact.
    async fn upsert_reference(&self, artifact: &BinaryArtifact) -> Result<BinaryArtifact>;

    /// Insert an artifact with no job references yet (upload path); the GC
    /// grace period starts immediately. Existing rows are left untouched.
    async fn insert_unreferenced(&self, artifact: &BinaryArtifact, now: i64) -> Result<()>;

    /// Fetch by content hash.
    async fn get(&self, sha256: &str) -> Result<Option<BinaryArtifact>>;

    /// Record the engine's format detection for an artifact.
    async fn set_analysis(
        &self,
        sha256: &str,
        format: BinaryFormat,
        architecture: &str,
        platform: &str,
    ) -> Result<()>;

    /// Drop one reference; stamps `last_unreferenced_at` when the count
    /// reaches zero.
    async fn release_reference(&self, sha256: &str, now: i64) -> Result<()>;

    /// Artifacts with zero references whose grace period elapsed before
    /// `cutoff`.
    async fn unreferenced_before(&self, cutoff: i64, limit: usize) -> Result<Vec<BinaryArtifact>>;

    /// Delete an artifact row.
    async fn delete(&self, sha256: &str) -> Result<()>;
}

// ============================================================================
// Usage ledger
// ============================================================================

/// Persistence for the monotonic [`UsageRecord`] ledger.
#[async_trait]
pub trait UsageRepository: Send + Sync {
    /// Atomically add tokens/requests/cost to the `(owner, provider, day,
    /// operation)` row, creating it if absent.
    async fn add(
        &self,
        owner: &str,
        provider_id: &str,
        day: &str,
        operation: OperationType,
        tokens: u64,
        requests: u64,
        cost: f64,
    ) -> Result<()>;

    /// Sum of cost for one day across operations.
    async fn cost_for_day(&self, owner: &str, provider_id: &str, day: &str) -> Result<f64>;

    /// Sum of cost for one month (`YYYY-MM` prefix) across operations.
    async fn cost_for_month(&self, owner: &str, provider_id: &str, month: &str) -> Result<f64>;

    /// Fetch one ledger row.
    async fn get(
        &self,
        owner: &str,
        provider_id: &str,
        day: &str,
        operation: OperationType,
    ) -> Result<Option<UsageRecord>>;
}

// ============================================================================
// Rate windows
// ============================================================================

/// Persistence for sliding-window counters.
#[async_trait]
pub trait RateWindowRepository: Send + Sync {
    /// Atomically increment the `(subject, endpoint, window_start)` bucket
    /// and return its new count (single statement).
    async fn increment(&self, subject: &str, endpoint: &str, window_start: i64) -> Result<i64>;

    /// Sum of counts in buckets with `window_start > since`.
    async fn window_sum(&self, subject: &str, endpoint: &str, since: i64) -> Result<i64>;

    /// Oldest contributing bucket start with `window_start > since`.
    async fn oldest_in_window(
        &self,
        subject: &str,
        endpoint: &str,
        since: i64,
    ) -> Result<Option<i64>>;

    /// Delete buckets with `window_start <= cutoff`. Returns rows removed.
    async fn prune_before(&self, cutoff: i64) -> Result<u64>;
}

// ============================================================================
// Upload sessions
// ============================================================================

/// Persistence for [`UploadSession`] rows.
#[async_trait]
pub trait UploadSessionRepository: Send + Sync {
    /// Insert a new session.
    async fn insert(&self, session: &UploadSession) -> Result<()>;

    /// Fetch one session.
    async fn get(&self, id: &UploadSessionId) -> Result<Option<UploadSession>>;

    /// Append an accepted file hash to the session.
    async fn add_file_ref(&self, id: &UploadSessionId, sha256: &str) -> Result<()>;

    /// Sessions expired before `now`.
    async fn expired(&self, now: i64, limit: usize) -> Result<Vec<UploadSession>>;

    /// Delete a session row.
    async fn delete(&self, id: &UploadSessionId) -> Result<()>;
}

// ============================================================================
// API keys
// ============================================================================

/// Read-only access to boundary-managed API keys.
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    /// Fetch one key by id.
    async fn get(&self, id: &str) -> Result<Option<ApiKey>>;

    /// Resolve a key by its stored hash.
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>>;

    /// Tier of the owner's newest active key, when any exists.
    async fn tier_for_owner(&self, owner: &str) -> Result<Option<String>>;
}

// ============================================================================
// Prompt metrics
// ============================================================================

/// Persistence for rolling prompt-effectiveness counters.
#[async_trait]
pub trait PromptMetricsRepository: Send + Sync {
    /// Atomically fold one outcome into the `(template_id, provider_id)`
    /// row, creating it if absent.
    async fn record(
        &self,
        template_id: &str,
        provider_id: &str,
        success: bool,
        quality: Option<f64>,
        latency_ms: u64,
    ) -> Result<()>;

    /// Fetch one metrics row.
    async fn get(&self, template_id: &str, provider_id: &str) -> Result<Option<PromptMetrics>>;
}
