//! Retry decorator for LLM providers.
//!
//! Rate limits honour the server-suggested delay (capped); timeouts and
//! server errors back off exponentially with jitter; auth and bad-request
//! failures are fatal and propagate on the first attempt. Applied beneath
//! the circuit breaker so the breaker scores each call sequence once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use binlift_domain::constants::limits::MAX_RETRY_AFTER_SECS;
use binlift_domain::entities::{
    DecompilationMetadata, FunctionRecord, FunctionTranslation, ImportExplanation, ImportRecord,
    OverallSummary, RenderedPrompt,
};
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::{LlmProvider, ProviderHealth};
use rand::Rng;
use tracing::debug;

/// Tuning for the retry loop.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// First backoff step; doubles per attempt.
    pub base_delay: Duration,
    /// Ceiling for one backoff step.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay);
        let jitter_ms = rand::rng().random_range(0..=capped.as_millis().max(1) as u64 / 2);
        capped + Duration::from_millis(jitter_ms)
    }
}

/// Decorator retrying transient provider failures.
pub struct RetryingProvider {
    inner: Arc<dyn LlmProvider>,
    config: RetryConfig,
}

impl RetryingProvider {
    /// Wrap `inner` with the given retry policy.
    #[must_use]
    pub fn new(inner: Arc<dyn LlmProvider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    async fn call_with_retry<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if attempt >= self.config.max_attempts {
                return Err(err);
            }
            let delay = match &err {
                Error::ProviderRateLimit {
                    retry_after_secs, ..
                } => {
                    // retry_after = 0 means "go again now"; anything longer
                    // is honoured up to the cap.
                    let suggested = retry_after_secs.unwrap_or(1).min(MAX_RETRY_AFTER_SECS);
                    Duration::from_secs(suggested)
                }
                Error::ProviderTimeout { .. } | Error::ProviderServerError { .. } => {
                    self.config.backoff(attempt)
                }
                _ => return Err(err),
            };
            debug!(
                provider = self.inner.id(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying provider call"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[async_trait]
impl LlmProvider for RetryingProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    fn context_window(&self) -> u32 {
        self.inner.context_window()
    }

    async fn translate_function(
        &self,
        func: &FunctionRecord,
        prompt: &RenderedPrompt,
    ) -> Result<FunctionTranslation> {
        self.call_with_retry(|| self.inner.translate_function(func, prompt))
            .await
    }

    async fn explain_imports(
        &self,
        library: &str,
        imports: &[ImportRecord],
        prompt: &RenderedPrompt,
    ) -> Result<ImportExplanation> {
        self.call_with_retry(|| self.inner.explain_imports(library, imports, prompt))
            .await
    }

    async fn generate_summary(
        &self,
        metadata: &DecompilationMetadata,
        prompt: &RenderedPrompt,
    ) -> Result<OverallSummary> {
        self.call_with_retry(|| self.inner.generate_summary(metadata, prompt))
            .await
    }

    fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        self.inner.estimate_cost(input_tokens, output_tokens)
    }

    async fn health_check(&self) -> Result<ProviderHealth> {
        self.inner.health_check().await
    }
}
