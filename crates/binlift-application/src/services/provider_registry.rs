//! Provider registry: id → instance map with cached health probes.

use std::sync::Arc;
use std::time::Duration;

use binlift_domain::constants::limits::HEALTH_PROBE_TTL_SECS;
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::{LlmProvider, ProviderHealth};
use moka::future::Cache;

use crate::decorators::{BreakerRegistry, CircuitBreaker};

/// Registry of constructed providers in configured preference order.
///
/// Health probes are cached for at most [`HEALTH_PROBE_TTL_SECS`] so the
/// selector never hammers an unhealthy backend with probes.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn LlmProvider>>,
    breakers: Arc<BreakerRegistry>,
    health_cache: Cache<String, ProviderHealth>,
}

impl ProviderRegistry {
    /// Create an empty registry sharing `breakers`.
    #[must_use]
    pub fn new(breakers: Arc<BreakerRegistry>) -> Self {
        Self {
            providers: Vec::new(),
            breakers,
            health_cache: Cache::builder()
                .time_to_live(Duration::from_secs(HEALTH_PROBE_TTL_SECS))
                .max_capacity(64)
                .build(),
        }
    }

    /// Append a provider; registration order is preference order.
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.push(provider);
    }

    /// Provider by id.
    pub fn get(&self, id: &str) -> Result<Arc<dyn LlmProvider>> {
        self.providers
            .iter()
            .find(|p| p.id() == id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("provider '{id}'")))
    }

    /// All providers in preference order.
    #[must_use]
    pub fn all(&self) -> &[Arc<dyn LlmProvider>] {
        &self.providers
    }

    /// The breaker for `id`.
    pub fn breaker(&self, id: &str) -> Arc<CircuitBreaker> {
        self.breakers.breaker(id)
    }

    /// Cached health probe for `id`. A probe that errors counts as
    /// unhealthy, not as a failure of the registry.
    pub async fn health(&self, id: &str) -> Result<ProviderHealth> {
        let provider = self.get(id)?;
        Ok(self
            .health_cache
            .get_with(id.to_owned(), async move {
                match provider.health_check().await {
                    Ok(health) => health,
                    Err(e) => ProviderHealth {
                        healthy: false,
                        latency_ms: 0,
                        reason: Some(e.to_string()),
                    },
                }
            })
            .await)
    }

    /// Drop the cached probe for `id` (admin reset path).
    pub async fn invalidate_health(&self, id: &str) {
        self.health_cache.invalidate(id).await;
    }
}
