//! Shared HTTP client pool for API-backed providers.

use std::time::Duration;

use binlift_domain::error::{Error, Result};
use binlift_domain::ports::HttpClientConfig;
use reqwest::Client;

/// Builds and holds the pooled [`reqwest::Client`] used by every provider.
#[derive(Debug, Clone)]
pub struct HttpClientPool {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClientPool {
    /// Build a pool from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the TLS backend cannot be
    /// initialized.
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(config.idle_timeout)
            .tcp_keepalive(config.keepalive)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::config_with_source("build HTTP client", e))?;
        Ok(Self { client, config })
    }

    /// The pooled client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The configuration the pool was built from.
    #[must_use]
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// A client sharing the pool settings but with a per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the client cannot be built.
    pub fn client_with_timeout(&self, timeout: Duration) -> Result<Client> {
        Client::builder()
            .pool_max_idle_per_host(self.config.max_idle_per_host)
            .pool_idle_timeout(self.config.idle_timeout)
            .tcp_keepalive(self.config.keepalive)
            .timeout(timeout)
            .user_agent(self.config.user_agent.clone())
            .build()
            .map_err(|e| Error::config_with_source("build HTTP client", e))
    }
}

impl Default for HttpClientPool {
    fn default() -> Self {
        // The default config always produces a buildable client.
        Self::new(HttpClientConfig::default()).unwrap_or_else(|_| {
            let config = HttpClientConfig::default();
            Self {
                client: Client::new(),
                config,
            }
        })
    }
}
