//! Provider admin surface: health + breaker state, reset, force-open.

use std::sync::Arc;

use async_trait::async_trait;
use binlift_domain::error::Result;
use binlift_domain::ports::{ProviderAdmin, ProviderAdminState};
use tracing::info;

use super::provider_registry::ProviderRegistry;

/// Admin operations over the provider registry.
pub struct AdminService {
    registry: Arc<ProviderRegistry>,
}

impl AdminService {
    /// Create the service.
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ProviderAdmin for AdminService {
    async fn provider_state(&self, provider_id: &str) -> Result<ProviderAdminState> {
        let provider = self.registry.get(provider_id)?;
        let health = self.registry.health(provider_id).await?;
        Ok(ProviderAdminState {
            provider_id: provider_id.to_owned(),
            model: provider.model().to_owned(),
            health,
            breaker_state: self.registry.breaker(provider_id).state(),
        })
    }

    async fn list_providers(&self) -> Result<Vec<ProviderAdminState>> {
        let mut states = Vec::new();
        for provider in self.registry.all() {
            states.push(self.provider_state(provider.id()).await?);
        }
        Ok(states)
    }

    async fn reset(&self, provider_id: &str) -> Result<()> {
        self.registry.get(provider_id)?;
        self.registry.breaker(provider_id).reset();
        self.registry.invalidate_health(provider_id).await;
        info!(provider = provider_id, "admin reset");
        Ok(())
    }

    async fn force_open(&self, provider_id: &str) -> Result<()> {
        self.registry.get(provider_id)?;
        self.registry.breaker(provider_id).force_open();
        info!(provider = provider_id, "admin force-open");
        Ok(())
    }
}
