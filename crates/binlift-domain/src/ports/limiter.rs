//! Admission and budget ports.

use async_trait::async_trait;

use crate::entities::OperationType;
use crate::error::Result;

/// Outcome of a sliding-window admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admission {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// Requests left in the window after this one (zero when rejected).
    pub remaining: i64,
    /// Seconds until capacity frees up; set only on rejection.
    pub retry_after_secs: Option<u64>,
}

/// Sliding-window admission control per `(subject, endpoint)`.
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    /// Count this request against the subject's window and decide.
    ///
    /// The count-and-read is one atomic operation against the backing
    /// store; rejected requests are still counted.
    async fn check(&self, subject: &str, tier: &str, endpoint: &str) -> Result<Admission>;
}

/// Per-owner, per-provider cost ceilings over the usage ledger.
#[async_trait]
pub trait BudgetGate: Send + Sync {
    /// Verify that `estimated_cost` fits under both the daily and monthly
    /// ceilings.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::CostLimitExceeded`] when either
    /// ceiling would be breached.
    async fn reserve(&self, owner: &str, provider_id: &str, estimated_cost: f64) -> Result<()>;

    /// Commit actual post-call usage. May exceed the reserved estimate; a
    /// completed call is never retroactively rejected.
    async fn commit(
        &self,
        owner: &str,
        provider_id: &str,
        operation: OperationType,
        tokens: u64,
        actual_cost: f64,
    ) -> Result<()>;
}
