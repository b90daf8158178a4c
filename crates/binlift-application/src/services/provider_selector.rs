//! Budget- and health-aware provider selection.
//!
//! Selection when the caller did not pin a provider: keep the providers
//! whose cached health probe passes and whose breaker is not open, drop the
//! ones the owner has no budget left for, then order by estimated cost (if
//! cost optimization is on) or configured preference. The caller walks the
//! resulting chain, moving on only for retryable failures.

use std::sync::Arc;

use binlift_domain::error::{Error, Result};
use binlift_domain::ports::{BreakerState, BudgetGate, LlmProvider};
use tracing::debug;

use super::provider_registry::ProviderRegistry;

/// Selector tuning.
#[derive(Debug, Clone, Default)]
pub struct SelectorConfig {
    /// Sort candidates by estimated call cost instead of preference order.
    pub cost_optimization: bool,
}

/// Fallback-chain selector over the provider registry.
pub struct ProviderSelector {
    registry: Arc<ProviderRegistry>,
    budget: Arc<dyn BudgetGate>,
    config: SelectorConfig,
}

impl ProviderSelector {
    /// Create the selector.
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        budget: Arc<dyn BudgetGate>,
        config: SelectorConfig,
    ) -> Self {
        Self {
            registry,
            budget,
            config,
        }
    }

    /// Candidates for one call, best first.
    ///
    /// A pinned provider short-circuits selection: it is returned alone when
    /// its breaker permits calls, otherwise the call fails immediately with
    /// `ProviderUnavailable`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderUnavailable` when no provider survives filtering.
    pub async fn candidates(
        &self,
        owner: &str,
        pinned: Option<&str>,
        estimated_input_tokens: u64,
        estimated_output_tokens: u64,
    ) -> Result<Vec<Arc<dyn LlmProvider>>> {
        if let Some(id) = pinned {
            let provider = self.registry.get(id)?;
            if self.registry.breaker(id).state() == BreakerState::Open {
                return Err(Error::ProviderUnavailable {
                    provider: id.to_owned(),
                });
            }
            return Ok(vec![provider]);
        }

        let mut candidates = Vec::new();
        for provider in self.registry.all() {
            let id = provider.id();
            if self.registry.breaker(id).state() == BreakerState::Open {
                debug!(provider = id, "skipped: breaker open");
                continue;
            }
            let health = self.registry.health(id).await?;
            if !health.healthy {
                debug!(provider = id, reason = ?health.reason, "skipped: unhealthy");
                continue;
            }
            let estimated_cost =
                provider.estimate_cost(estimated_input_tokens, estimated_output_tokens);
            if let Err(e) = self.budget.reserve(owner, id, estimated_cost).await {
                debug!(provider = id, error = %e, "skipped: over budget");
                continue;
            }
            candidates.push((estimated_cost, Arc::clone(provider)));
        }

        if candidates.is_empty() {
            return Err(Error::ProviderUnavailable {
                provider: "any".to_owned(),
            });
        }
        if self.config.cost_optimization {
            candidates.sort_by(|(a, _), (b, _)| a.total_cmp(b));
        }
        Ok(candidates.into_iter().map(|(_, p)| p).collect())
    }
}
