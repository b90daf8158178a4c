//! Sliding-window admission control.
//!
//! Window of width W at resolution R: each admission lands in the bucket
//! `floor(now / R) * R` via one atomic upsert-increment, then the in-window
//! bucket sum is compared to the subject's tier limit. Rejected requests are
//! still counted, and expired buckets are pruned opportunistically on the
//! way through.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use binlift_domain::constants::limits::{
    DEFAULT_RATE_WINDOW_SECS, RATE_WINDOW_RESOLUTION_SECS,
};
use binlift_domain::error::Result;
use binlift_domain::ports::{Admission, AdmissionControl, RateWindowRepository};
use tracing::debug;

use super::clock::Clock;

/// Tier limits for the sliding window.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Window width W in seconds.
    pub window_secs: i64,
    /// Bucket resolution R in seconds.
    pub resolution_secs: i64,
    /// Requests allowed per window, per tier name.
    pub tier_limits: HashMap<String, i64>,
    /// Limit applied to unknown tiers.
    pub default_limit: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_RATE_WINDOW_SECS as i64,
            resolution_secs: RATE_WINDOW_RESOLUTION_SECS as i64,
            tier_limits: HashMap::new(),
            default_limit: 60,
        }
    }
}

/// Admission control over the rate-window repository.
pub struct RateLimitService {
    windows: Arc<dyn RateWindowRepository>,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
}

impl RateLimitService {
    /// Create the service.
    #[must_use]
    pub fn new(
        windows: Arc<dyn RateWindowRepository>,
        clock: Arc<dyn Clock>,
        config: RateLimitConfig,
    ) -> Self {
        Self {
            windows,
            clock,
            config,
        }
    }

    fn limit_for(&self, tier: &str) -> i64 {
        self.config
            .tier_limits
            .get(tier)
            .copied()
            .unwrap_or(self.config.default_limit)
    }
}

#[async_trait]
impl AdmissionControl for RateLimitService {
    async fn check(&self, subject: &str, tier: &str, endpoint: &str) -> Result<Admission> {
        let now = self.clock.now();
        let bucket_start = (now / self.config.resolution_secs) * self.config.resolution_secs;
        let since = now - self.config.window_secs;

        self.windows.increment(subject, endpoint, bucket_start).await?;
        let in_window = self.windows.window_sum(subject, endpoint, since).await?;
        // Buckets two windows old can never contribute again.
        self.windows
            .prune_before(now - 2 * self.config.window_secs)
            .await?;

        let limit = self.limit_for(tier);
        if in_window <= limit {
            return Ok(Admission {
                allowed: true,
                remaining: limit - in_window,
                retry_after_secs: None,
            });
        }

        let oldest = self
            .windows
            .oldest_in_window(subject, endpoint, since)
            .await?
            .unwrap_or(bucket_start);
        let retry_after = (oldest + self.config.window_secs - now).max(1) as u64;
        debug!(subject, endpoint, in_window, limit, retry_after, "admission rejected");
        Ok(Admission {
            allowed: false,
            remaining: 0,
            retry_after_secs: Some(retry_after),
        })
    }
}
