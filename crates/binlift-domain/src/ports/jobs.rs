//! Job queue domain port.
//!
//! The public contract of the job manager: atomic enqueue/claim/complete
//! over the structured store with worker-crash recovery. Implemented by the
//! application layer's `JobService`.

use async_trait::async_trait;

use crate::entities::{Job, JobError, JobSpec};
use crate::error::Result;
use crate::value_objects::{JobId, WorkerId};

/// What a worker should do after a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatSignal {
    /// Lease extended; keep working.
    Continue,
    /// The owner cancelled the job; finalise at the next task boundary.
    Cancelled,
}

/// Job lifecycle operations.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Validate a spec, store its artifact if inline, and enqueue a job.
    ///
    /// Idempotent per `(owner, idempotency_key)` when the boundary supplies
    /// a key. Rejects when the owner exceeds the per-tier pending-job cap.
    async fn submit(&self, spec: JobSpec) -> Result<JobId>;

    /// Atomically claim up to `max` queued jobs for `worker`.
    ///
    /// Claim order is `(priority desc, created_at asc)`; two concurrent
    /// claims never both receive the same job.
    async fn claim(&self, worker: WorkerId, max: usize) -> Result<Vec<Job>>;

    /// Extend the lease and publish monotonic progress.
    ///
    /// Fails when `worker` does not hold the job. Returns
    /// [`HeartbeatSignal::Cancelled`] when the owner cancelled mid-run.
    async fn heartbeat(
        &self,
        job_id: JobId,
        worker: WorkerId,
        progress: f64,
    ) -> Result<HeartbeatSignal>;

    /// Mark the job completed with its result payload key.
    ///
    /// Idempotent: completing an already-completed job with the same key is
    /// a no-op; a different key is rejected.
    async fn complete(&self, job_id: JobId, worker: WorkerId, result_blob_key: &str) -> Result<()>;

    /// Record a failure; retryable failures requeue with backoff until the
    /// attempt ceiling, then become terminal.
    async fn fail(
        &self,
        job_id: JobId,
        worker: WorkerId,
        error: JobError,
        retryable: bool,
    ) -> Result<()>;

    /// Cancel a non-terminal job on behalf of its owner.
    async fn cancel(&self, job_id: JobId, owner: &str) -> Result<()>;

    /// Fetch one job.
    async fn get(&self, job_id: JobId) -> Result<Option<Job>>;
}
