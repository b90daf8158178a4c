//! Usage accounting and rate-limit window entities.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::prompt::OperationType;

/// Daily usage ledger row per `(owner, provider, day, operation)`.
///
/// Monotonic: only the translation pipeline increases it, never decreases.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UsageRecord {
    /// Owner the usage is billed to.
    pub owner: String,
    /// Provider the calls went to.
    pub provider_id: String,
    /// UTC day bucket, `YYYY-MM-DD`.
    pub day: String,
    /// Operation type the tokens were spent on.
    pub operation_type: OperationType,
    /// Total tokens consumed.
    pub tokens_used: u64,
    /// Number of provider calls.
    pub requests: u64,
    /// Accumulated cost in USD.
    pub cost: f64,
}

/// One sliding-window counter bucket per `(subject, endpoint, window_start)`.
///
/// Buckets older than the window width are pruned opportunistically.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RateWindow {
    /// Rate-limited subject (owner or API key id).
    pub subject: String,
    /// Logical endpoint the request hit.
    pub endpoint: String,
    /// Bucket start (Unix epoch seconds, aligned to the resolution).
    pub window_start: i64,
    /// Admitted requests counted into this bucket.
    pub count: i64,
}

/// UTC day bucket string for a Unix timestamp.
#[must_use]
pub fn day_bucket(epoch_secs: i64) -> String {
    use chrono::{DateTime, Utc};
    DateTime::<Utc>::from_timestamp(epoch_secs, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "1970-01-01".to_owned())
}

/// UTC month prefix (`YYYY-MM`) for a Unix timestamp, used for monthly
/// budget sums over the daily ledger.
#[must_use]
pub fn month_bucket(epoch_secs: i64) -> String {
    use chrono::{DateTime, Utc};
    DateTime::<Utc>::from_timestamp(epoch_secs, 0)
        .map(|dt| dt.format("%Y-%m").to_string())
        .unwrap_or_else(|| "1970-01".to_owned())
}
