//! Configuration validation.

use std::collections::HashSet;

use binlift_domain::constants::limits::MAX_PROVIDER_TIMEOUT_SECS;
use binlift_domain::error::{Error, Result};

use super::types::AppConfig;

/// Validate a loaded configuration before the factory sees it.
///
/// # Errors
///
/// Returns a configuration error naming the first invalid value.
pub fn validate(config: &AppConfig) -> Result<()> {
    if config.structured_store_url.trim().is_empty() {
        return Err(Error::config("structured_store_url must not be empty"));
    }
    if config.worker_count == 0 {
        return Err(Error::config("worker_count must be at least 1"));
    }
    if config.job_lease_seconds < 15 {
        return Err(Error::config(
            "job_lease_seconds must be at least 15 (heartbeats run at a third of the lease)",
        ));
    }
    if config.max_file_size_bytes == 0 {
        return Err(Error::config("max_file_size_bytes must be positive"));
    }
    if config.result_ttl_seconds < 60 {
        return Err(Error::config("result_ttl_seconds must be at least 60"));
    }

    let fraction = config.pipeline.success_fraction;
    if !(0.0..=1.0).contains(&fraction) || fraction == 0.0 {
        return Err(Error::config(format!(
            "pipeline.success_fraction must be in (0, 1], got {fraction}"
        )));
    }
    if config.pipeline.max_concurrency == 0 {
        return Err(Error::config("pipeline.max_concurrency must be at least 1"));
    }

    if !(0.0..=1.0).contains(&config.breaker.failure_ratio) {
        return Err(Error::config(format!(
            "breaker.failure_ratio must be in [0, 1], got {}",
            config.breaker.failure_ratio
        )));
    }
    if config.breaker.min_samples == 0 {
        return Err(Error::config("breaker.min_samples must be at least 1"));
    }

    let mut seen = HashSet::new();
    for provider in &config.providers {
        if provider.id.trim().is_empty() {
            return Err(Error::config("provider id must not be empty"));
        }
        if !seen.insert(provider.id.as_str()) {
            return Err(Error::config(format!(
                "duplicate provider id '{}'",
                provider.id
            )));
        }
        if provider.default_model.trim().is_empty() {
            return Err(Error::config(format!(
                "provider '{}' has no default_model",
                provider.id
            )));
        }
        if provider.timeout_seconds == 0 || provider.timeout_seconds > MAX_PROVIDER_TIMEOUT_SECS {
            return Err(Error::config(format!(
                "provider '{}' timeout_seconds must be in [1, {MAX_PROVIDER_TIMEOUT_SECS}]",
                provider.id
            )));
        }
        if provider.daily_budget_usd < 0.0 || provider.monthly_budget_usd < 0.0 {
            return Err(Error::config(format!(
                "provider '{}' budgets must not be negative",
                provider.id
            )));
        }
    }
    Ok(())
}
