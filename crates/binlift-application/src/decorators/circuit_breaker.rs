//! Circuit breaker decorator for LLM providers.
//!
//! Per-provider `closed/open/half-open` state machine over a rolling outcome
//! window. Wraps any [`LlmProvider`]; open circuits short-circuit with
//! `ProviderUnavailable` before a request leaves the process.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use binlift_domain::entities::{
    DecompilationMetadata, FunctionRecord, FunctionTranslation, ImportExplanation, ImportRecord,
    OverallSummary, RenderedPrompt,
};
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::{BreakerState, LlmProvider, ProviderHealth};
use dashmap::DashMap;
use tracing::{info, warn};

/// Tuning for one breaker.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Rolling window width for outcome tracking.
    pub window: Duration,
    /// Failure ratio above which the breaker opens.
    pub failure_ratio: f64,
    /// Minimum outcomes in the window before the ratio is meaningful.
    pub min_samples: usize,
    /// Time an open breaker waits before permitting a probe.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            failure_ratio: 0.5,
            min_samples: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    outcomes: VecDeque<(Instant, bool)>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    forced_open: bool,
}

/// One provider's breaker. Shared between the wrapping decorator, the
/// selector and the admin surface.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider_id: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a closed breaker for `provider_id`.
    #[must_use]
    pub fn new(provider_id: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            provider_id: provider_id.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                outcomes: VecDeque::new(),
                opened_at: None,
                probe_in_flight: false,
                forced_open: false,
            }),
        }
    }

    /// Current state, advancing `open → half-open` when the cooldown has
    /// elapsed.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.advance(&mut inner);
        inner.state
    }

    /// Gate one call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderUnavailable`] while open, and while
    /// half-open for every call but the single probe.
    pub fn try_acquire(&self) -> Result<()> {
        let mut inner = self.lock();
        self.advance(&mut inner);
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::HalfOpen if !inner.probe_in_flight => {
                inner.probe_in_flight = true;
                Ok(())
            }
            BreakerState::HalfOpen | BreakerState::Open => Err(Error::ProviderUnavailable {
                provider: self.provider_id.clone(),
            }),
        }
    }

    /// Record a successful call admitted by [`Self::try_acquire`].
    pub fn record_success(&self) {
        self.record(true, None);
    }

    /// Record a failed call admitted by [`Self::try_acquire`].
    pub fn record_failure(&self, precipitating: &Error) {
        self.record(false, Some(precipitating));
    }

    /// Release an admitted call whose outcome says nothing about provider
    /// health (cancellation, local budget rejection). Frees a pending probe
    /// without recording an outcome.
    pub fn release(&self) {
        let mut inner = self.lock();
        inner.probe_in_flight = false;
    }

    fn record(&self, success: bool, precipitating: Option<&Error>) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.probe_in_flight = false;
                if success {
                    inner.state = BreakerState::Closed;
                    inner.outcomes.clear();
                    inner.opened_at = None;
                    info!(provider = %self.provider_id, "circuit breaker closed after successful probe");
                } else {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    warn!(
                        provider = %self.provider_id,
                        error = %precipitating.map(ToString::to_string).unwrap_or_default(),
                        "circuit breaker reopened after failed probe"
                    );
                }
            }
            BreakerState::Closed => {
                let now = Instant::now();
                inner.outcomes.push_back((now, success));
                let horizon = self.config.window;
                while inner
                    .outcomes
                    .front()
                    .is_some_and(|(at, _)| now.duration_since(*at) > horizon)
                {
                    inner.outcomes.pop_front();
                }
                let total = inner.outcomes.len();
                let failures = inner.outcomes.iter().filter(|(_, ok)| !ok).count();
                if total >= self.config.min_samples
                    && failures as f64 / total as f64 > self.config.failure_ratio
                {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(now);
                    warn!(
                        provider = %self.provider_id,
                        failures,
                        total,
                        error = %precipitating.map(ToString::to_string).unwrap_or_default(),
                        "circuit breaker opened"
                    );
                }
            }
            // Late results from calls admitted before a force-open.
            BreakerState::Open => {}
        }
    }

    /// Close the breaker and clear its window (admin operation).
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = BreakerState::Closed;
        inner.outcomes.clear();
        inner.opened_at = None;
        inner.probe_in_flight = false;
        inner.forced_open = false;
        info!(provider = %self.provider_id, "circuit breaker reset");
    }

    /// Hold the breaker open until reset (admin operation).
    pub fn force_open(&self) {
        let mut inner = self.lock();
        inner.state = BreakerState::Open;
        inner.opened_at = Some(Instant::now());
        inner.forced_open = true;
        warn!(provider = %self.provider_id, "circuit breaker forced open");
    }

    fn advance(&self, inner: &mut Inner) {
        if inner.state == BreakerState::Open
            && !inner.forced_open
            && inner
                .opened_at
                .is_some_and(|at| at.elapsed() >= self.config.cooldown)
        {
            inner.state = BreakerState::HalfOpen;
            inner.probe_in_flight = false;
            info!(provider = %self.provider_id, "circuit breaker half-open");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Mutex poisoning cannot leave Inner inconsistent: every mutation is
        // completed before the guard drops.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Shared map of breakers, one per provider id.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: BreakerConfig,
}

impl BreakerRegistry {
    /// Create a registry handing out breakers with `config`.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    /// The breaker for `provider_id`, created on first use.
    pub fn breaker(&self, provider_id: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(provider_id.to_owned())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(provider_id, self.config.clone()))
            })
            .clone()
    }
}

/// Decorator gating every translation call through the breaker.
///
/// Health checks bypass the breaker: probing an unhealthy provider is the
/// selector's job and must not be short-circuited.
pub struct CircuitBreakerProvider {
    inner: Arc<dyn LlmProvider>,
    breaker: Arc<CircuitBreaker>,
}

impl CircuitBreakerProvider {
    /// Wrap `inner` with `breaker`.
    #[must_use]
    pub fn new(inner: Arc<dyn LlmProvider>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { inner, breaker }
    }

    fn observe<T>(&self, result: &Result<T>) {
        match result {
            Ok(_) => self.breaker.record_success(),
            Err(e) if e.is_provider_failure() => self.breaker.record_failure(e),
            // Non-provider errors say nothing about provider health.
            Err(_) => self.breaker.release(),
        }
    }
}

#[async_trait]
impl LlmProvider for CircuitBreakerProvider {
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
        self.breaker.try_acquire()?;
        let result = self.inner.translate_function(func, prompt).await;
        self.observe(&result);
        result
    }

    async fn explain_imports(
        &self,
        library: &str,
        imports: &[ImportRecord],
        prompt: &RenderedPrompt,
    ) -> Result<ImportExplanation> {
        self.breaker.try_acquire()?;
        let result = self.inner.explain_imports(library, imports, prompt).await;
        self.observe(&result);
        result
    }

    async fn generate_summary(
        &self,
        metadata: &DecompilationMetadata,
        prompt: &RenderedPrompt,
    ) -> Result<OverallSummary> {
        self.breaker.try_acquire()?;
        let result = self.inner.generate_summary(metadata, prompt).await;
        self.observe(&result);
        result
    }

    fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        self.inner.estimate_cost(input_tokens, output_tokens)
    }

    async fn health_check(&self) -> Result<ProviderHealth> {
        self.inner.health_check().await
    }
}
