//! Translation pipeline fan-out, fallback, aggregation and cancellation.

use std::collections::HashMap;
use std::sync::Arc;

use binlift_application::decorators::BreakerConfig;
use binlift_application::services::ProviderBudget;
use binlift_application::use_cases::{PipelineConfig, TranslationPipeline};
use binlift_domain::entities::{
    BinaryFormat, DecompilationMetadata, DecompilationResult, DecompilationStatus, ImportRecord,
    TranslationSpec, TranslationStatus,
};
use binlift_domain::events::NullTelemetrySink;
use binlift_domain::ports::LlmProvider;
use binlift_domain::value_objects::{FunctionAddress, JobId};
use tokio_util::sync::CancellationToken;

use crate::support::{MockFailure, MockOutcome, MockProvider, ProviderStack, function, provider_stack};

fn decomp() -> DecompilationResult {
    // Deliberately out of address order to prove output ordering.
    let functions = vec![
        function(0x3000, "helper_b"),
        function(0x1000, "entry0"),
        function(0x2000, "main"),
    ];
    let imports = vec![
        ImportRecord {
            library: "kernel32.dll".to_owned(),
            symbol: "CreateFileW".to_owned(),
            address: None,
            ordinal: None,
        },
        ImportRecord {
            library: "kernel32.dll".to_owned(),
            symbol: "ReadFile".to_owned(),
            address: None,
            ordinal: None,
        },
        ImportRecord {
            library: "user32.dll".to_owned(),
            symbol: "MessageBoxW".to_owned(),
            address: None,
            ordinal: None,
        },
    ];
    DecompilationResult {
        job_id: JobId::new(),
        metadata: DecompilationMetadata {
            sha256: "ab".repeat(32),
            format: BinaryFormat::Pe,
            architecture: "x86_64".to_owned(),
            platform: "windows".to_owned(),
            function_count: functions.len(),
            import_count: imports.len(),
            string_count: 0,
            duration_ms: 10,
        },
        functions,
        imports,
        strings: Vec::new(),
        status: DecompilationStatus::Completed,
        errors: Vec::new(),
    }
}

fn pipeline(stack: &ProviderStack, config: PipelineConfig) -> TranslationPipeline {
    TranslationPipeline::new(
        Arc::clone(&stack.registry),
        Arc::clone(&stack.selector),
        Arc::clone(&stack.prompts),
        Arc::clone(&stack.budget),
        Arc::new(NullTelemetrySink),
        config,
    )
}

fn spec() -> TranslationSpec {
    TranslationSpec {
        max_concurrency: Some(1),
        ..TranslationSpec::default()
    }
}

// 3 function tasks + 2 import groups + 1 summary.
const TOTAL_TASKS: usize = 6;

#[tokio::test]
async fn happy_path_completes_with_address_ordered_output() {
    let provider = MockProvider::new("a");
    let stack = provider_stack(
        vec![Arc::clone(&provider) as Arc<dyn LlmProvider>],
        BreakerConfig::default(),
        false,
        HashMap::new(),
    );
    let result = pipeline(&stack, PipelineConfig::default())
        .run(JobId::new(), "u1", &decomp(), &spec(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, TranslationStatus::Completed);
    assert_eq!(result.provider_id, "a");
    assert_eq!(result.model, "mock-model");
    assert!(result.errors.is_empty());
    let addresses: Vec<_> = result
        .function_translations
        .iter()
        .map(|t| t.address)
        .collect();
    assert_eq!(
        addresses,
        vec![
            FunctionAddress::new(0x1000),
            FunctionAddress::new(0x2000),
            FunctionAddress::new(0x3000),
        ]
    );
    assert_eq!(result.import_explanations.len(), 2);
    assert!(result.overall_summary.is_some());
    assert_eq!(result.tokens_used, 3 * 100 + 2 * 40 + 60);
    assert!(result.estimated_cost > 0.0);
    assert_eq!(provider.call_count() as usize, TOTAL_TASKS);
}

#[tokio::test]
async fn fatal_task_failures_degrade_to_partial() {
    let provider = MockProvider::new("a");
    provider.script([
        MockOutcome::Fail(MockFailure::BadRequest),
        MockOutcome::Fail(MockFailure::BadRequest),
        MockOutcome::Success,
    ]);
    let stack = provider_stack(
        vec![Arc::clone(&provider) as Arc<dyn LlmProvider>],
        BreakerConfig::default(),
        false,
        HashMap::new(),
    );
    let result = pipeline(&stack, PipelineConfig::default())
        .run(JobId::new(), "u1", &decomp(), &spec(), &CancellationToken::new())
        .await
        .unwrap();

    // 4 of 6 tasks succeeded: below the 0.8 completed threshold.
    assert_eq!(result.status, TranslationStatus::Partial);
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors.iter().all(|e| e.code == "provider_bad_request"));
    assert_eq!(result.function_translations.len(), 1);
}

#[tokio::test]
async fn nothing_succeeding_is_failed_with_one_error_per_task() {
    let provider = MockProvider::new("a");
    provider.always_fail(MockFailure::BadRequest);
    let stack = provider_stack(
        vec![provider as Arc<dyn LlmProvider>],
        BreakerConfig::default(),
        false,
        HashMap::new(),
    );
    let result = pipeline(&stack, PipelineConfig::default())
        .run(JobId::new(), "u1", &decomp(), &spec(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, TranslationStatus::Failed);
    assert_eq!(result.errors.len(), TOTAL_TASKS);
    assert!(result.overall_summary.is_none());
    assert_eq!(result.tokens_used, 0);
}

#[tokio::test]
async fn retryable_failures_fall_back_to_the_next_provider() {
    let a = MockProvider::new("a");
    a.always_fail(MockFailure::ServerError);
    let b = MockProvider::new("b");
    let stack = provider_stack(
        vec![
            Arc::clone(&a) as Arc<dyn LlmProvider>,
            Arc::clone(&b) as Arc<dyn LlmProvider>,
        ],
        BreakerConfig::default(),
        false,
        HashMap::new(),
    );
    let result = pipeline(&stack, PipelineConfig::default())
        .run(JobId::new(), "u1", &decomp(), &spec(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, TranslationStatus::Completed);
    assert_eq!(result.provider_id, "b");
    assert!(result
        .function_translations
        .iter()
        .all(|t| t.provider_id == "b"));
    assert!(a.call_count() > 0);
    assert_eq!(b.call_count() as usize, TOTAL_TASKS);
}

#[tokio::test]
async fn provider_outage_opens_the_breaker_and_fallback_serves() {
    use binlift_application::decorators::CircuitBreakerProvider;
    use binlift_domain::ports::BreakerState;
    use std::time::Duration;

    let a = MockProvider::new("a");
    a.always_fail(MockFailure::ServerError);
    let b = MockProvider::new("b");
    let breaker_config = BreakerConfig {
        window: Duration::from_secs(60),
        failure_ratio: 0.5,
        min_samples: 3,
        cooldown: Duration::from_secs(60),
    };
    // One shared breaker registry between the decorators and the selector,
    // the way the factory wires production providers.
    let breakers = Arc::new(binlift_application::decorators::BreakerRegistry::new(
        breaker_config.clone(),
    ));
    let wrapped_a: Arc<dyn LlmProvider> = Arc::new(CircuitBreakerProvider::new(
        Arc::clone(&a) as Arc<dyn LlmProvider>,
        breakers.breaker("a"),
    ));
    let wrapped_b: Arc<dyn LlmProvider> = Arc::new(CircuitBreakerProvider::new(
        Arc::clone(&b) as Arc<dyn LlmProvider>,
        breakers.breaker("b"),
    ));
    let stack = provider_stack(Vec::new(), breaker_config, false, HashMap::new());
    let mut registry =
        binlift_application::services::ProviderRegistry::new(Arc::clone(&breakers));
    registry.register(wrapped_a);
    registry.register(wrapped_b);
    let registry = Arc::new(registry);
    let selector = Arc::new(binlift_application::services::ProviderSelector::new(
        Arc::clone(&registry),
        Arc::clone(&stack.budget),
        binlift_application::services::SelectorConfig::default(),
    ));
    let pipeline = TranslationPipeline::new(
        Arc::clone(&registry),
        selector,
        Arc::clone(&stack.prompts),
        Arc::clone(&stack.budget),
        Arc::new(NullTelemetrySink),
        PipelineConfig::default(),
    );

    let result = pipeline
        .run(JobId::new(), "u1", &decomp(), &spec(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, TranslationStatus::Completed);
    assert_eq!(result.provider_id, "b");
    assert_eq!(b.call_count() as usize, TOTAL_TASKS);
    // The flaky provider's breaker opened inside the run; the tail of the
    // task stream never reached it.
    assert_eq!(registry.breaker("a").state(), BreakerState::Open);
    assert!((a.call_count() as usize) < TOTAL_TASKS);
}

#[tokio::test]
async fn budget_exhaustion_fails_every_task() {
    let provider = MockProvider::with_cost("a", 1.0);
    let budgets = HashMap::from([(
        "a".to_owned(),
        ProviderBudget {
            daily_usd: 0.000_001,
            monthly_usd: 0.000_001,
        },
    )]);
    let stack = provider_stack(
        vec![Arc::clone(&provider) as Arc<dyn LlmProvider>],
        BreakerConfig::default(),
        false,
        budgets,
    );
    let result = pipeline(&stack, PipelineConfig::default())
        .run(JobId::new(), "u1", &decomp(), &spec(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, TranslationStatus::Failed);
    assert_eq!(result.errors.len(), TOTAL_TASKS);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn pre_cancelled_pipeline_reports_cancelled() {
    let provider = MockProvider::new("a");
    let stack = provider_stack(
        vec![Arc::clone(&provider) as Arc<dyn LlmProvider>],
        BreakerConfig::default(),
        false,
        HashMap::new(),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = pipeline(&stack, PipelineConfig::default())
        .run(JobId::new(), "u1", &decomp(), &spec(), &cancel)
        .await
        .unwrap();

    assert_eq!(result.status, TranslationStatus::Cancelled);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn excess_functions_are_summarised_in_aggregate() {
    let provider = MockProvider::new("a");
    let stack = provider_stack(
        vec![Arc::clone(&provider) as Arc<dyn LlmProvider>],
        BreakerConfig::default(),
        false,
        HashMap::new(),
    );
    let config = PipelineConfig {
        max_functions: 2,
        ..PipelineConfig::default()
    };
    let result = pipeline(&stack, config)
        .run(JobId::new(), "u1", &decomp(), &spec(), &CancellationToken::new())
        .await
        .unwrap();

    // Only two functions are translated individually.
    assert_eq!(result.function_translations.len(), 2);
    let summary = result.overall_summary.expect("summary present");
    assert!(summary.excess_functions.is_some());
}
