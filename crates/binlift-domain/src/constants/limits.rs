//! Default limits and timing constants.
//!
//! Every value here is a default; the corresponding `AppConfig` field wins
//! when set.

/// Default result payload TTL (24h).
pub const DEFAULT_RESULT_TTL_SECS: u64 = 24 * 60 * 60;

/// Minimum sweeper interval; shorter configured values are clamped up.
pub const MIN_SWEEP_INTERVAL_SECS: u64 = 60;

/// Grace period before an unreferenced artifact becomes eligible for GC.
pub const ARTIFACT_GC_GRACE_SECS: u64 = 60 * 60;

/// Default job lease duration.
pub const DEFAULT_JOB_LEASE_SECS: u64 = 120;

/// Default job attempt ceiling before a retryable failure becomes terminal.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default wall-clock timeout for one job.
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 2 * 60 * 60;

/// Default sliding-window width for rate limiting.
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 60;

/// Sliding-window bucket resolution (window is divided into W/R buckets).
pub const RATE_WINDOW_RESOLUTION_SECS: u64 = 5;

/// Default per-call provider timeout.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Hard ceiling on the per-call provider timeout.
pub const MAX_PROVIDER_TIMEOUT_SECS: u64 = 300;

/// Cap on server-suggested `retry_after` before we stop honouring it.
pub const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Default per-invocation engine timeout.
pub const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 1200;

/// Default engine session restart ceiling.
pub const DEFAULT_ENGINE_MAX_RESTARTS: u32 = 2;

/// Default translation pipeline fan-out bound.
pub const DEFAULT_PIPELINE_CONCURRENCY: usize = 4;

/// Default cap on individually translated functions per job.
pub const DEFAULT_MAX_FUNCTIONS: usize = 100;

/// Default fraction of translation tasks that must succeed for
/// `status = completed` (below it the result is `partial`).
pub const DEFAULT_SUCCESS_FRACTION: f64 = 0.8;

/// Health probe cache TTL for the provider factory.
pub const HEALTH_PROBE_TTL_SECS: u64 = 30;

/// Fraction of functions allowed to report address zero before the
/// extraction is rejected as invalid.
pub const MAX_ZERO_ADDRESS_FRACTION: f64 = 0.01;
