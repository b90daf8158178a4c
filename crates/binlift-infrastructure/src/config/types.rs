//! Application configuration types.
//!
//! Loaded once at startup, validated, then passed by value to the factory.
//! There is no process-wide mutable configuration; components hold the
//! sections they need.

use std::collections::HashMap;
use std::path::PathBuf;

use binlift_domain::constants::limits::{
    DEFAULT_ENGINE_MAX_RESTARTS, DEFAULT_ENGINE_TIMEOUT_SECS, DEFAULT_JOB_LEASE_SECS,
    DEFAULT_JOB_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_FUNCTIONS,
    DEFAULT_PIPELINE_CONCURRENCY, DEFAULT_PROVIDER_TIMEOUT_SECS, DEFAULT_RATE_WINDOW_SECS,
    DEFAULT_RESULT_TTL_SECS, DEFAULT_SUCCESS_FRACTION,
};
use binlift_domain::ports::ProviderKind;
use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Root directory of the blob store.
    pub storage_root: PathBuf,
    /// Structured store URL (`sqlite:path` form).
    pub structured_store_url: String,
    /// Number of job workers.
    #[serde(default = "defaults::worker_count")]
    pub worker_count: usize,
    /// Job lease duration in seconds.
    #[serde(default = "defaults::job_lease_seconds")]
    pub job_lease_seconds: u64,
    /// Retryable-failure attempt ceiling per job.
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,
    /// Wall-clock ceiling for one job in seconds.
    #[serde(default = "defaults::job_timeout_seconds")]
    pub job_timeout_seconds: u64,
    /// Upload size ceiling in bytes.
    #[serde(default = "defaults::max_file_size_bytes")]
    pub max_file_size_bytes: u64,
    /// Result payload TTL in seconds.
    #[serde(default = "defaults::result_ttl_seconds")]
    pub result_ttl_seconds: u64,
    /// Sweeper pass interval in seconds (clamped to at least 60).
    #[serde(default = "defaults::sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
    /// Rate limiting section.
    #[serde(default)]
    pub rate_limit: RateLimitSection,
    /// Configured LLM providers in preference order.
    #[serde(default)]
    pub providers: Vec<ProviderSection>,
    /// Circuit breaker section.
    #[serde(default)]
    pub breaker: BreakerSection,
    /// Translation pipeline section.
    #[serde(default)]
    pub pipeline: PipelineSection,
    /// Provider selection section.
    #[serde(default)]
    pub selection: SelectionSection,
    /// Reverse-engineering engine section.
    #[serde(default)]
    pub engine: EngineSection,
    /// Logging section.
    #[serde(default)]
    pub logging: LoggingSection,
}

/// One tier's limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierSection {
    /// Requests allowed per sliding window.
    pub requests_per_window: i64,
    /// Concurrent pending-job cap.
    pub max_pending_jobs: u64,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSection {
    /// Sliding window width in seconds.
    pub window_seconds: u64,
    /// Named tiers.
    pub tiers: HashMap<String, TierSection>,
    /// Window limit for owners without a tier.
    pub default_requests_per_window: i64,
    /// Pending-job cap for owners without a tier.
    pub default_max_pending_jobs: u64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            window_seconds: DEFAULT_RATE_WINDOW_SECS,
            tiers: HashMap::new(),
            default_requests_per_window: 60,
            default_max_pending_jobs: 10,
        }
    }
}

/// One configured provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSection {
    /// Stable provider id.
    pub id: String,
    /// API dialect.
    pub kind: ProviderKind,
    /// Base URL override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// API key (empty for unauthenticated local backends).
    #[serde(default)]
    pub api_key: String,
    /// Default model.
    pub default_model: String,
    /// Context window in tokens.
    #[serde(default = "defaults::context_window")]
    pub context_window: u32,
    /// Per-call timeout in seconds.
    #[serde(default = "defaults::provider_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Daily per-owner budget in USD.
    #[serde(default = "defaults::daily_budget_usd")]
    pub daily_budget_usd: f64,
    /// Monthly per-owner budget in USD.
    #[serde(default = "defaults::monthly_budget_usd")]
    pub monthly_budget_usd: f64,
    /// Prompt-side price per 1 000 tokens in USD.
    #[serde(default = "defaults::cost_per_1k_input")]
    pub cost_per_1k_input_usd: f64,
    /// Completion-side price per 1 000 tokens in USD.
    #[serde(default = "defaults::cost_per_1k_output")]
    pub cost_per_1k_output_usd: f64,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakerSection {
    /// Rolling outcome window in seconds.
    pub window: u64,
    /// Failure ratio above which the breaker opens.
    pub failure_ratio: f64,
    /// Minimum samples before the ratio is meaningful.
    pub min_samples: usize,
    /// Cooldown before a probe is allowed, in seconds.
    pub cooldown_seconds: u64,
}

impl Default for BreakerSection {
    fn default() -> Self {
        Self {
            window: 60,
            failure_ratio: 0.5,
            min_samples: 5,
            cooldown_seconds: 30,
        }
    }
}

/// Translation pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSection {
    /// Tasks in flight at once.
    pub max_concurrency: usize,
    /// Individually translated function cap.
    pub max_functions: usize,
    /// Success fraction for `completed` status.
    pub success_fraction: f64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_PIPELINE_CONCURRENCY,
            max_functions: DEFAULT_MAX_FUNCTIONS,
            success_fraction: DEFAULT_SUCCESS_FRACTION,
        }
    }
}

/// Provider selection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SelectionSection {
    /// Sort candidates by estimated cost instead of preference order.
    pub cost_optimization: bool,
}

/// Reverse-engineering engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// Path to the radare2 binary.
    pub binary_path: PathBuf,
    /// Timeout for ordinary extraction commands, in seconds.
    pub command_timeout_seconds: u64,
    /// Timeout for the analysis pass, in seconds.
    pub analysis_timeout_seconds: u64,
    /// Session restarts tolerated per extraction.
    pub max_restarts: u32,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("r2"),
            command_timeout_seconds: 60,
            analysis_timeout_seconds: DEFAULT_ENGINE_TIMEOUT_SECS,
            max_restarts: DEFAULT_ENGINE_MAX_RESTARTS,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Enable JSON output format.
    pub json_format: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json_format: false,
        }
    }
}

mod defaults {
    use super::{
        DEFAULT_JOB_LEASE_SECS, DEFAULT_JOB_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS,
        DEFAULT_PROVIDER_TIMEOUT_SECS, DEFAULT_RESULT_TTL_SECS,
    };

    pub fn worker_count() -> usize {
        2
    }

    pub fn job_lease_seconds() -> u64 {
        DEFAULT_JOB_LEASE_SECS
    }

    pub fn max_attempts() -> u32 {
        DEFAULT_MAX_ATTEMPTS
    }

    pub fn job_timeout_seconds() -> u64 {
        DEFAULT_JOB_TIMEOUT_SECS
    }

    pub fn max_file_size_bytes() -> u64 {
        100 * 1024 * 1024
    }

    pub fn result_ttl_seconds() -> u64 {
        DEFAULT_RESULT_TTL_SECS
    }

    pub fn sweep_interval_seconds() -> u64 {
        300
    }

    pub fn context_window() -> u32 {
        128_000
    }

    pub fn provider_timeout_seconds() -> u64 {
        DEFAULT_PROVIDER_TIMEOUT_SECS
    }

    pub fn daily_budget_usd() -> f64 {
        10.0
    }

    pub fn monthly_budget_usd() -> f64 {
        100.0
    }

    pub fn cost_per_1k_input() -> f64 {
        0.000_15
    }

    pub fn cost_per_1k_output() -> f64 {
        0.000_60
    }
}
