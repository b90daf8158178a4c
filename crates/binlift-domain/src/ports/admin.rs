//! Administrative interfaces for provider monitoring and control.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ports::providers::ProviderHealth;

/// Circuit breaker state for one provider.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Calls pass through; outcomes are tracked.
    #[display("closed")]
    Closed,
    /// Calls short-circuit until the cooldown elapses.
    #[display("open")]
    Open,
    /// One probe call is permitted.
    #[display("half_open")]
    HalfOpen,
}

/// Combined health + breaker view of one provider.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProviderAdminState {
    /// Provider id.
    pub provider_id: String,
    /// Model the provider dispatches to.
    pub model: String,
    /// Most recent health probe result.
    pub health: ProviderHealth,
    /// Current breaker state.
    pub breaker_state: BreakerState,
}

/// Admin operations exposed to the boundary.
#[async_trait]
pub trait ProviderAdmin: Send + Sync {
    /// Health + breaker state for one provider.
    async fn provider_state(&self, provider_id: &str) -> Result<ProviderAdminState>;

    /// Health + breaker state for every configured provider.
    async fn list_providers(&self) -> Result<Vec<ProviderAdminState>>;

    /// Reset a provider's breaker to `closed` and clear its window.
    async fn reset(&self, provider_id: &str) -> Result<()>;

    /// Force a provider's breaker `open` until reset.
    async fn force_open(&self, provider_id: &str) -> Result<()>;
}
