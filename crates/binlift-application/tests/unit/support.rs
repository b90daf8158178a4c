//! Shared test doubles for the application suite.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use binlift_application::decorators::{BreakerConfig, BreakerRegistry};
use binlift_application::services::{
    BudgetService, Clock, ManualClock, ProviderRegistry, ProviderSelector, SelectorConfig,
};
use binlift_application::use_cases::PromptManager;
use binlift_domain::entities::{
    DecompilationMetadata, FunctionRecord, FunctionTranslation, ImportExplanation, ImportRecord,
    OverallSummary, PromptMetrics, RenderedPrompt, StringRecord,
};
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::{
    BinaryInfo, BudgetGate, EngineProvider, EngineSession, LlmProvider, PromptMetricsRepository,
    ProviderHealth,
};
use binlift_domain::value_objects::FunctionAddress;

// ============================================================================
// LLM provider double
// ============================================================================

/// Scripted failure shapes for [`MockProvider`].
#[derive(Debug, Clone)]
pub enum MockFailure {
    RateLimit(Option<u64>),
    Auth,
    BadRequest,
    ServerError,
    Timeout,
}

impl MockFailure {
    fn to_error(&self, provider: &str) -> Error {
        match self {
            Self::RateLimit(retry_after_secs) => Error::ProviderRateLimit {
                provider: provider.to_owned(),
                retry_after_secs: *retry_after_secs,
            },
            Self::Auth => Error::provider_auth(provider, "bad key"),
            Self::BadRequest => Error::provider_bad_request(provider, "malformed"),
            Self::ServerError => Error::provider_server(provider, "upstream 503"),
            Self::Timeout => Error::ProviderTimeout {
                provider: provider.to_owned(),
                timeout_secs: 30,
            },
        }
    }
}

/// Scripted outcome for one provider call.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Success,
    Fail(MockFailure),
}

/// Scriptable in-memory provider.
pub struct MockProvider {
    id: String,
    script: Mutex<VecDeque<MockOutcome>>,
    pub calls: AtomicU64,
    healthy: AtomicBool,
    cost_per_1k: f64,
}

impl MockProvider {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_owned(),
            script: Mutex::new(VecDeque::new()),
            calls: AtomicU64::new(0),
            healthy: AtomicBool::new(true),
            cost_per_1k: 0.001,
        })
    }

    pub fn with_cost(id: &str, cost_per_1k: f64) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_owned(),
            script: Mutex::new(VecDeque::new()),
            calls: AtomicU64::new(0),
            healthy: AtomicBool::new(true),
            cost_per_1k,
        })
    }

    /// Queue outcomes; once the script drains, calls succeed.
    pub fn script(&self, outcomes: impl IntoIterator<Item = MockOutcome>) {
        self.script.lock().unwrap().extend(outcomes);
    }

    /// Make every call fail with the given failure forever.
    pub fn always_fail(&self, failure: MockFailure) {
        self.script
            .lock()
            .unwrap()
            .extend(std::iter::repeat_n(MockOutcome::Fail(failure), 10_000));
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            None | Some(MockOutcome::Success) => Ok(()),
            Some(MockOutcome::Fail(failure)) => Err(failure.to_error(&self.id)),
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn context_window(&self) -> u32 {
        128_000
    }

    async fn translate_function(
        &self,
        func: &FunctionRecord,
        _prompt: &RenderedPrompt,
    ) -> Result<FunctionTranslation> {
        self.next()?;
        Ok(FunctionTranslation {
            address: func.address,
            name: func.name.clone(),
            natural_language: format!("explains {}", func.name),
            tokens_used: 100,
            provider_id: self.id.clone(),
        })
    }

    async fn explain_imports(
        &self,
        library: &str,
        imports: &[ImportRecord],
        _prompt: &RenderedPrompt,
    ) -> Result<ImportExplanation> {
        self.next()?;
        Ok(ImportExplanation {
            library: library.to_owned(),
            symbols: imports.iter().map(|i| i.symbol.clone()).collect(),
            explanation: format!("explains {library}"),
            tokens_used: 40,
        })
    }

    async fn generate_summary(
        &self,
        _metadata: &DecompilationMetadata,
        _prompt: &RenderedPrompt,
    ) -> Result<OverallSummary> {
        self.next()?;
        Ok(OverallSummary {
            text: "a small utility".to_owned(),
            excess_functions: None,
            tokens_used: 60,
        })
    }

    fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens + output_tokens) as f64 / 1000.0 * self.cost_per_1k
    }

    async fn health_check(&self) -> Result<ProviderHealth> {
        Ok(ProviderHealth {
            healthy: self.healthy.load(Ordering::SeqCst),
            latency_ms: 5,
            reason: None,
        })
    }
}

// ============================================================================
// Engine double
// ============================================================================

/// Scriptable engine whose sessions return fixed extraction data.
pub struct MockEngine {
    pub functions: Vec<FunctionRecord>,
    pub imports: Vec<ImportRecord>,
    pub strings: Vec<StringRecord>,
    /// Sessions that crash before this many opens have happened.
    pub crashes_before: u32,
    pub opens: AtomicU64,
}

impl MockEngine {
    pub fn new(functions: Vec<FunctionRecord>) -> Arc<Self> {
        Arc::new(Self {
            functions,
            imports: Vec::new(),
            strings: Vec::new(),
            crashes_before: 0,
            opens: AtomicU64::new(0),
        })
    }

    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }
}

pub struct MockSession {
    functions: Vec<FunctionRecord>,
    imports: Vec<ImportRecord>,
    strings: Vec<StringRecord>,
    crash: bool,
}

#[async_trait]
impl EngineProvider for MockEngine {
    async fn open(&self, _path: &std::path::Path) -> Result<Box<dyn EngineSession>> {
        let opened = self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            functions: self.functions.clone(),
            imports: self.imports.clone(),
            strings: self.strings.clone(),
            crash: opened < u64::from(self.crashes_before),
        }))
    }
}

#[async_trait]
impl EngineSession for MockSession {
    async fn analyze(&mut self) -> Result<()> {
        if self.crash {
            return Err(Error::EngineCrashed {
                message: "scripted crash".to_owned(),
            });
        }
        Ok(())
    }

    async fn binary_info(&mut self) -> Result<BinaryInfo> {
        Ok(BinaryInfo {
            format: binlift_domain::entities::BinaryFormat::Elf,
            architecture: "x86_64".to_owned(),
            platform: "linux".to_owned(),
            entry_point: self.functions.first().map(|f| f.address),
            size: 4096,
        })
    }

    async fn functions(&mut self) -> Result<Vec<FunctionRecord>> {
        Ok(self.functions.clone())
    }

    async fn imports(&mut self) -> Result<Vec<ImportRecord>> {
        Ok(self.imports.clone())
    }

    async fn strings(&mut self) -> Result<Vec<StringRecord>> {
        Ok(self.strings.clone())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Metrics + fixtures
// ============================================================================

pub struct NullMetrics;

#[async_trait]
impl PromptMetricsRepository for NullMetrics {
    async fn record(
        &self,
        _template_id: &str,
        _provider_id: &str,
        _success: bool,
        _quality: Option<f64>,
        _latency_ms: u64,
    ) -> Result<()> {
        Ok(())
    }

    async fn get(&self, _t: &str, _p: &str) -> Result<Option<PromptMetrics>> {
        Ok(None)
    }
}

pub fn function(addr: u64, name: &str) -> FunctionRecord {
    FunctionRecord {
        name: name.to_owned(),
        address: FunctionAddress::new(addr),
        size: 64,
        assembly_block: "push rbp\nmov rbp, rsp\nret\n".to_owned(),
        calls_to: Vec::new(),
        called_by: Vec::new(),
        is_entry: false,
        is_imported: false,
    }
}

/// A registry + selector + pipeline-ready stack over the given providers,
/// with no budget ceilings.
pub struct ProviderStack {
    pub registry: Arc<ProviderRegistry>,
    pub selector: Arc<ProviderSelector>,
    pub prompts: Arc<PromptManager>,
    pub budget: Arc<dyn BudgetGate>,
    pub clock: Arc<ManualClock>,
}

pub fn provider_stack(
    providers: Vec<Arc<dyn LlmProvider>>,
    breaker_config: BreakerConfig,
    cost_optimization: bool,
    budgets: std::collections::HashMap<String, binlift_application::services::ProviderBudget>,
) -> ProviderStack {
    let clock = ManualClock::at(1_773_662_400);
    let breakers = Arc::new(BreakerRegistry::new(breaker_config));
    let mut registry = ProviderRegistry::new(breakers);
    for provider in providers {
        registry.register(provider);
    }
    let registry = Arc::new(registry);

    let usage = Arc::new(MemoryUsage::default());
    let budget: Arc<dyn BudgetGate> = Arc::new(BudgetService::new(
        usage,
        clock.clone() as Arc<dyn Clock>,
        budgets,
    ));
    let selector = Arc::new(ProviderSelector::new(
        Arc::clone(&registry),
        Arc::clone(&budget),
        SelectorConfig { cost_optimization },
    ));
    let prompts = Arc::new(PromptManager::new(Arc::new(NullMetrics)).expect("builtin templates"));
    ProviderStack {
        registry,
        selector,
        prompts,
        budget,
        clock,
    }
}

/// In-memory usage ledger.
#[derive(Default)]
pub struct MemoryUsage {
    rows: Mutex<std::collections::HashMap<(String, String, String), (u64, f64)>>,
}

#[async_trait]
impl binlift_domain::ports::UsageRepository for MemoryUsage {
    async fn add(
        &self,
        owner: &str,
        provider_id: &str,
        day: &str,
        _operation: binlift_domain::entities::OperationType,
        tokens: u64,
        _requests: u64,
        cost: f64,
    ) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let entry = rows
            .entry((owner.to_owned(), provider_id.to_owned(), day.to_owned()))
            .or_insert((0, 0.0));
        entry.0 += tokens;
        entry.1 += cost;
        Ok(())
    }

    async fn cost_for_day(&self, owner: &str, provider_id: &str, day: &str) -> Result<f64> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|((o, p, d), _)| o == owner && p == provider_id && d == day)
            .map(|(_, (_, cost))| cost)
            .sum())
    }

    async fn cost_for_month(&self, owner: &str, provider_id: &str, month: &str) -> Result<f64> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|((o, p, d), _)| o == owner && p == provider_id && d.starts_with(month))
            .map(|(_, (_, cost))| cost)
            .sum())
    }

    async fn get(
        &self,
        _owner: &str,
        _provider_id: &str,
        _day: &str,
        _operation: binlift_domain::entities::OperationType,
    ) -> Result<Option<binlift_domain::entities::UsageRecord>> {
        Ok(None)
    }
}
