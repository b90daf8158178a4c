//! Config-driven composition root.
//!
//! Builds the full object graph once at startup: store connections,
//! repositories, decorated providers, services, pipeline and orchestrator.
//! Components receive their dependencies by value; nothing resolves
//! anything at runtime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use binlift_application::decorators::{
    BreakerConfig, BreakerRegistry, CircuitBreakerProvider, RetryConfig, RetryingProvider,
};
use binlift_application::services::{
    AdminService, BudgetService, Clock, ProviderBudget, ProviderRegistry, ProviderSelector,
    RateLimitConfig, RateLimitService, SelectorConfig, SystemClock,
};
use binlift_application::use_cases::{
    DecompilationOrchestrator, JobService, JobServiceConfig, OrchestratorConfig, PipelineConfig,
    PromptManager, ResultsService, TranslationPipeline, UploadService, UploadServiceConfig,
};
use binlift_domain::constants::limits::{
    MAX_PROVIDER_TIMEOUT_SECS, RATE_WINDOW_RESOLUTION_SECS,
};
use binlift_domain::constants::storage::TMP_PREFIX;
use binlift_domain::error::Result;
use binlift_domain::events::TelemetrySink;
use binlift_domain::ports::{
    AdmissionControl, ApiKeyRepository, ArtifactRepository, BlobStore, BudgetGate,
    DatabaseProvider, EngineProvider, HttpClientConfig, JobQueue, JobRepository, LlmProvider,
    ProviderKind, RateWindowRepository, UploadSessionRepository, UsageRepository,
};
use binlift_domain::value_objects::LlmProviderConfig;
use binlift_providers::database::sqlite::{
    SqliteApiKeyRepository, SqliteArtifactRepository, SqliteDatabaseProvider, SqliteJobRepository,
    SqlitePromptMetricsRepository, SqliteRateWindowRepository, SqliteUploadSessionRepository,
    SqliteUsageRepository,
};
use binlift_providers::engine::{Radare2Config, Radare2EngineProvider};
use binlift_providers::llm::{
    AnthropicProvider, GeminiProvider, HttpClientPool, OllamaProvider, OpenAiCompatibleProvider,
};
use binlift_providers::storage::FilesystemBlobStore;
use tracing::info;

use crate::config::{AppConfig, ProviderSection};
use crate::telemetry::TracingTelemetrySink;

/// The composed application.
pub struct AppContext {
    pub config: AppConfig,
    pub clock: Arc<dyn Clock>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub blobs: Arc<dyn BlobStore>,
    pub jobs: Arc<dyn JobRepository>,
    pub artifacts: Arc<dyn ArtifactRepository>,
    pub usage: Arc<dyn UsageRepository>,
    pub rate_windows: Arc<dyn RateWindowRepository>,
    pub upload_sessions: Arc<dyn UploadSessionRepository>,
    pub api_keys: Arc<dyn ApiKeyRepository>,
    pub queue: Arc<dyn JobQueue>,
    pub admission: Arc<dyn AdmissionControl>,
    pub budget: Arc<dyn BudgetGate>,
    pub registry: Arc<ProviderRegistry>,
    pub selector: Arc<ProviderSelector>,
    pub prompts: Arc<PromptManager>,
    pub pipeline: Arc<TranslationPipeline>,
    pub orchestrator: Arc<DecompilationOrchestrator>,
    pub results: Arc<ResultsService>,
    pub uploads: Arc<UploadService>,
    pub admin: Arc<AdminService>,
}

/// Build the application from validated configuration.
///
/// # Errors
///
/// Returns storage or configuration errors from store connection, schema
/// application or provider construction.
pub async fn build_context(config: AppConfig) -> Result<AppContext> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let telemetry: Arc<dyn TelemetrySink> = Arc::new(TracingTelemetrySink);

    // Stores.
    let executor = SqliteDatabaseProvider
        .connect(&config.structured_store_url)
        .await?;
    let blobs: Arc<dyn BlobStore> = Arc::new(FilesystemBlobStore::new(&config.storage_root));
    let jobs: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(Arc::clone(&executor)));
    let artifacts: Arc<dyn ArtifactRepository> =
        Arc::new(SqliteArtifactRepository::new(Arc::clone(&executor)));
    let usage: Arc<dyn UsageRepository> =
        Arc::new(SqliteUsageRepository::new(Arc::clone(&executor)));
    let rate_windows: Arc<dyn RateWindowRepository> =
        Arc::new(SqliteRateWindowRepository::new(Arc::clone(&executor)));
    let upload_sessions: Arc<dyn UploadSessionRepository> =
        Arc::new(SqliteUploadSessionRepository::new(Arc::clone(&executor)));
    let api_keys: Arc<dyn ApiKeyRepository> =
        Arc::new(SqliteApiKeyRepository::new(Arc::clone(&executor)));
    let prompt_metrics = Arc::new(SqlitePromptMetricsRepository::new(executor));

    // Admission and budget.
    let admission: Arc<dyn AdmissionControl> = Arc::new(RateLimitService::new(
        Arc::clone(&rate_windows),
        Arc::clone(&clock),
        RateLimitConfig {
            window_secs: config.rate_limit.window_seconds as i64,
            resolution_secs: RATE_WINDOW_RESOLUTION_SECS as i64,
            tier_limits: config
                .rate_limit
                .tiers
                .iter()
                .map(|(name, tier)| (name.clone(), tier.requests_per_window))
                .collect(),
            default_limit: config.rate_limit.default_requests_per_window,
        },
    ));
    let budgets: HashMap<String, ProviderBudget> = config
        .providers
        .iter()
        .map(|p| {
            (
                p.id.clone(),
                ProviderBudget {
                    daily_usd: p.daily_budget_usd,
                    monthly_usd: p.monthly_budget_usd,
                },
            )
        })
        .collect();
    let budget: Arc<dyn BudgetGate> = Arc::new(BudgetService::new(
        Arc::clone(&usage),
        Arc::clone(&clock),
        budgets,
    ));

    // Providers wrapped in retry + circuit breaker.
    let breakers = Arc::new(BreakerRegistry::new(BreakerConfig {
        window: Duration::from_secs(config.breaker.window),
        failure_ratio: config.breaker.failure_ratio,
        min_samples: config.breaker.min_samples,
        cooldown: Duration::from_secs(config.breaker.cooldown_seconds),
    }));
    let pool = HttpClientPool::new(HttpClientConfig {
        timeout: Duration::from_secs(MAX_PROVIDER_TIMEOUT_SECS),
        user_agent: "binlift/provider-client".to_owned(),
        ..HttpClientConfig::default()
    })?;
    let mut registry = ProviderRegistry::new(Arc::clone(&breakers));
    for section in &config.providers {
        let base = build_base_provider(section, &pool);
        let retried = Arc::new(RetryingProvider::new(base, RetryConfig::default()));
        let guarded = Arc::new(CircuitBreakerProvider::new(
            retried,
            breakers.breaker(&section.id),
        ));
        info!(provider = %section.id, kind = %section.kind, model = %section.default_model, "provider registered");
        registry.register(guarded);
    }
    let registry = Arc::new(registry);
    let selector = Arc::new(ProviderSelector::new(
        Arc::clone(&registry),
        Arc::clone(&budget),
        SelectorConfig {
            cost_optimization: config.selection.cost_optimization,
        },
    ));
    let admin = Arc::new(AdminService::new(Arc::clone(&registry)));

    // Prompting and the pipeline.
    let prompts = Arc::new(PromptManager::new(prompt_metrics)?);
    let pipeline = Arc::new(TranslationPipeline::new(
        Arc::clone(&registry),
        Arc::clone(&selector),
        Arc::clone(&prompts),
        Arc::clone(&budget),
        Arc::clone(&telemetry),
        PipelineConfig {
            max_concurrency: config.pipeline.max_concurrency,
            max_functions: config.pipeline.max_functions,
            success_fraction: config.pipeline.success_fraction,
        },
    ));

    // Job manager and orchestrator.
    let queue: Arc<dyn JobQueue> = Arc::new(JobService::new(
        Arc::clone(&jobs),
        Arc::clone(&artifacts),
        Arc::clone(&api_keys),
        Arc::clone(&blobs),
        Arc::clone(&clock),
        Arc::clone(&telemetry),
        JobServiceConfig {
            lease_secs: config.job_lease_seconds as i64,
            max_attempts: config.max_attempts,
            max_file_size_bytes: config.max_file_size_bytes,
            pending_caps: config
                .rate_limit
                .tiers
                .iter()
                .map(|(name, tier)| (name.clone(), tier.max_pending_jobs))
                .collect(),
            default_pending_cap: config.rate_limit.default_max_pending_jobs,
            retry_backoff_base_secs: 30,
        },
    ));
    let engine: Arc<dyn EngineProvider> = Arc::new(Radare2EngineProvider::new(Radare2Config {
        binary_path: config.engine.binary_path.clone(),
        command_timeout: Duration::from_secs(config.engine.command_timeout_seconds),
        analysis_timeout: Duration::from_secs(config.engine.analysis_timeout_seconds),
    }));
    let orchestrator = Arc::new(DecompilationOrchestrator::new(
        Arc::clone(&queue),
        Arc::clone(&artifacts),
        Arc::clone(&blobs),
        engine,
        Arc::clone(&pipeline),
        Arc::clone(&telemetry),
        OrchestratorConfig {
            scratch_dir: config.storage_root.join(TMP_PREFIX),
            engine_max_restarts: config.engine.max_restarts,
            heartbeat_interval: Duration::from_secs((config.job_lease_seconds / 3).max(1)),
        },
    ));

    let results = Arc::new(ResultsService::new(Arc::clone(&jobs), Arc::clone(&blobs)));
    let uploads = Arc::new(UploadService::new(
        Arc::clone(&upload_sessions),
        Arc::clone(&artifacts),
        Arc::clone(&blobs),
        Arc::clone(&clock),
        UploadServiceConfig {
            max_file_size_bytes: config.max_file_size_bytes,
            ..UploadServiceConfig::default()
        },
    ));

    Ok(AppContext {
        config,
        clock,
        telemetry,
        blobs,
        jobs,
        artifacts,
        usage,
        rate_windows,
        upload_sessions,
        api_keys,
        queue,
        admission,
        budget,
        registry,
        selector,
        prompts,
        pipeline,
        orchestrator,
        results,
        uploads,
        admin,
    })
}

fn build_base_provider(section: &ProviderSection, pool: &HttpClientPool) -> Arc<dyn LlmProvider> {
    let provider_config = LlmProviderConfig {
        id: section.id.clone(),
        kind: section.kind,
        base_url: section.base_url.clone(),
        api_key: section.api_key.clone(),
        default_model: section.default_model.clone(),
        context_window: section.context_window,
        timeout_secs: section.timeout_seconds.min(MAX_PROVIDER_TIMEOUT_SECS),
        daily_budget_usd: section.daily_budget_usd,
        monthly_budget_usd: section.monthly_budget_usd,
        cost_per_1k_input_usd: section.cost_per_1k_input_usd,
        cost_per_1k_output_usd: section.cost_per_1k_output_usd,
    };
    match section.kind {
        ProviderKind::OpenAiCompatible => {
            Arc::new(OpenAiCompatibleProvider::new(provider_config, pool.clone()))
        }
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(provider_config, pool.clone())),
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(provider_config, pool.clone())),
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(provider_config, pool.clone())),
    }
}
