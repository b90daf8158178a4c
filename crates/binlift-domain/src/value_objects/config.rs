//! Provider configuration value objects.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::limits::DEFAULT_PROVIDER_TIMEOUT_SECS;
use crate::ports::ProviderKind;

/// Everything needed to construct and account for one LLM provider.
///
/// Built by the configuration layer and passed by value to the provider
/// factory at startup.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LlmProviderConfig {
    /// Stable provider id (selection, accounting and breaker key).
    pub id: String,
    /// API dialect this provider speaks.
    pub kind: ProviderKind,
    /// Base URL override; required for self-hosted OpenAI-compatible
    /// gateways, optional elsewhere.
    pub base_url: Option<String>,
    /// API key; empty for unauthenticated local backends.
    pub api_key: String,
    /// Model dispatched by default.
    pub default_model: String,
    /// Context window of the model, in tokens.
    pub context_window: u32,
    /// Per-call timeout in seconds (clamped to
    /// [`MAX_PROVIDER_TIMEOUT_SECS`](crate::constants::limits::MAX_PROVIDER_TIMEOUT_SECS)).
    pub timeout_secs: u64,
    /// Daily per-owner cost ceiling in USD.
    pub daily_budget_usd: f64,
    /// Monthly per-owner cost ceiling in USD.
    pub monthly_budget_usd: f64,
    /// Prompt-side price per 1 000 tokens in USD.
    pub cost_per_1k_input_usd: f64,
    /// Completion-side price per 1 000 tokens in USD.
    pub cost_per_1k_output_usd: f64,
}

impl LlmProviderConfig {
    /// A minimal config for one provider id and model; callers override the
    /// rest as needed.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: ProviderKind, default_model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            base_url: None,
            api_key: String::new(),
            default_model: default_model.into(),
            context_window: 128_000,
            timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            daily_budget_usd: 10.0,
            monthly_budget_usd: 100.0,
            cost_per_1k_input_usd: 0.000_15,
            cost_per_1k_output_usd: 0.000_60,
        }
    }

    /// USD cost of a call at this provider's configured prices.
    #[must_use]
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.cost_per_1k_input_usd
            + (output_tokens as f64 / 1000.0) * self.cost_per_1k_output_usd
    }
}
