//! Translation pipeline.
//!
//! # Overview
//! Fans one decompilation result out into per-function, per-library and
//! summary translation tasks, runs them under a bounded semaphore, and
//! aggregates whatever succeeded. Each task renders its prompt, reserves
//! budget, calls the selected provider through the breaker/retry decorators,
//! and commits actual usage on success. Partial success is a first-class
//! outcome; the pipeline only reports `failed` when nothing succeeded.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use binlift_domain::constants::limits::{
    DEFAULT_MAX_FUNCTIONS, DEFAULT_PIPELINE_CONCURRENCY, DEFAULT_SUCCESS_FRACTION,
};
use binlift_domain::entities::{
    DecompilationResult, FunctionRecord, ImportRecord, OperationType, TaskError,
    TranslationResult, TranslationSpec, TranslationStatus,
};
use binlift_domain::error::{Error, Result};
use binlift_domain::events::{Outcome, TelemetryEvent, TelemetrySink};
use binlift_domain::ports::{BudgetGate, LlmProvider, estimate_tokens};
use binlift_domain::value_objects::JobId;
use futures::future::join_all;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::prompt_service::PromptManager;
use crate::services::provider_registry::ProviderRegistry;
use crate::services::provider_selector::ProviderSelector;

/// Upper bound on assembly text shipped per prompt; everything past it is
/// elided so one enormous function cannot blow the provider context window.
const MAX_ASSEMBLY_CHARS: usize = 24_000;

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Tasks in flight at once.
    pub max_concurrency: usize,
    /// Functions translated individually; the rest fold into the summary.
    pub max_functions: usize,
    /// Success fraction at or above which the result is `completed`.
    pub success_fraction: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_PIPELINE_CONCURRENCY,
            max_functions: DEFAULT_MAX_FUNCTIONS,
            success_fraction: DEFAULT_SUCCESS_FRACTION,
        }
    }
}

enum TaskKind {
    Function(FunctionRecord),
    Imports {
        library: String,
        imports: Vec<ImportRecord>,
    },
    Summary {
        context: serde_json::Value,
        metadata: binlift_domain::entities::DecompilationMetadata,
    },
}

struct Task {
    label: String,
    kind: TaskKind,
}

enum TaskOutput {
    Function(binlift_domain::entities::FunctionTranslation),
    Imports(binlift_domain::entities::ImportExplanation),
    Summary(binlift_domain::entities::OverallSummary),
}

struct TaskOutcome {
    label: String,
    provider_id: Option<String>,
    result: Result<(TaskOutput, f64)>,
}

/// The translation fan-out.
pub struct TranslationPipeline {
    registry: Arc<ProviderRegistry>,
    selector: Arc<ProviderSelector>,
    prompts: Arc<PromptManager>,
    budget: Arc<dyn BudgetGate>,
    telemetry: Arc<dyn TelemetrySink>,
    config: PipelineConfig,
}

impl TranslationPipeline {
    /// Create the pipeline.
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        selector: Arc<ProviderSelector>,
        prompts: Arc<PromptManager>,
        budget: Arc<dyn BudgetGate>,
        telemetry: Arc<dyn TelemetrySink>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            selector,
            prompts,
            budget,
            telemetry,
            config,
        }
    }

    /// Run the full translation for one decompilation result.
    ///
    /// Cancellation is observed between tasks and before each provider
    /// call; in-flight calls complete and their usage is committed.
    pub async fn run(
        &self,
        job_id: JobId,
        owner: &str,
        decomp: &DecompilationResult,
        spec: &TranslationSpec,
        cancel: &CancellationToken,
    ) -> Result<TranslationResult> {
        let tasks = self.build_tasks(decomp, spec);
        let total_tasks = tasks.len();
        let concurrency = spec
            .max_concurrency
            .unwrap_or(self.config.max_concurrency)
            .max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        info!(
            job_id = %job_id,
            tasks = total_tasks,
            concurrency,
            "translation pipeline started"
        );

        let futures = tasks.into_iter().map(|task| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                // Semaphore closure is not part of this pipeline's lifecycle.
                let Ok(_permit) = semaphore.acquire().await else {
                    return TaskOutcome {
                        label: task.label.clone(),
                        provider_id: None,
                        result: Err(Error::internal("pipeline semaphore closed")),
                    };
                };
                if cancel.is_cancelled() {
                    return TaskOutcome {
                        label: task.label.clone(),
                        provider_id: None,
                        result: Err(Error::cancelled(task.label.clone())),
                    };
                }
                self.execute_task(job_id, owner, spec, task, cancel).await
            }
        });
        let outcomes = join_all(futures).await;

        Ok(self.aggregate(job_id, spec, decomp, outcomes, total_tasks, cancel))
    }

    fn build_tasks(&self, decomp: &DecompilationResult, spec: &TranslationSpec) -> Vec<Task> {
        let mut functions: Vec<&FunctionRecord> = decomp.functions.iter().collect();
        functions.sort_by_key(|f| f.address);

        let capped: Vec<&FunctionRecord> =
            functions.iter().copied().take(self.config.max_functions).collect();
        let excess: Vec<&FunctionRecord> = functions
            .iter()
            .copied()
            .skip(self.config.max_functions)
            .collect();

        let mut tasks: Vec<Task> = capped
            .iter()
            .map(|f| Task {
                label: format!("function:{}", f.address),
                kind: TaskKind::Function((*f).clone()),
            })
            .collect();

        let mut groups: BTreeMap<String, Vec<ImportRecord>> = BTreeMap::new();
        for import in &decomp.imports {
            let library = if import.library.is_empty() {
                "unknown".to_owned()
            } else {
                import.library.clone()
            };
            groups.entry(library).or_default().push(import.clone());
        }
        for (library, imports) in groups {
            tasks.push(Task {
                label: format!("imports:{library}"),
                kind: TaskKind::Imports { library, imports },
            });
        }

        let excess_note = if excess.is_empty() {
            None
        } else {
            Some(format!(
                "{} functions beyond the per-function cap were summarised in aggregate: {}",
                excess.len(),
                excess
                    .iter()
                    .take(20)
                    .map(|f| format!("{} ({})", f.name, f.address))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        };
        tasks.push(Task {
            label: "summary".to_owned(),
            kind: TaskKind::Summary {
                context: summary_context(decomp, spec, &excess_note),
                metadata: decomp.metadata.clone(),
            },
        });
        tasks
    }

    async fn execute_task(
        &self,
        job_id: JobId,
        owner: &str,
        spec: &TranslationSpec,
        task: Task,
        cancel: &CancellationToken,
    ) -> TaskOutcome {
        let label = task.label.clone();
        let (operation, context) = match &task.kind {
            TaskKind::Function(func) => (
                OperationType::FunctionTranslation,
                function_context(func, spec),
            ),
            TaskKind::Imports { library, imports } => {
                (OperationType::ImportExplanation, imports_context(library, imports))
            }
            TaskKind::Summary { context, .. } => (OperationType::OverallSummary, context.clone()),
        };

        let estimated_input = estimate_tokens(&context.to_string());
        let candidates = match self
            .selector
            .candidates(owner, spec.provider_pref.as_deref(), estimated_input, 1024)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                return TaskOutcome {
                    label,
                    provider_id: None,
                    result: Err(e),
                };
            }
        };

        let mut last_error = Error::ProviderUnavailable {
            provider: "any".to_owned(),
        };
        for provider in candidates {
            if cancel.is_cancelled() {
                return TaskOutcome {
                    label: label.clone(),
                    provider_id: None,
                    result: Err(Error::cancelled(label)),
                };
            }
            match self
                .attempt(owner, &task, operation, &context, provider.as_ref())
                .await
            {
                Ok((output, cost)) => {
                    self.telemetry.emit(
                        TelemetryEvent::new("translation_task", Outcome::Success)
                            .job(job_id)
                            .owner(owner)
                            .provider(provider.id()),
                    );
                    return TaskOutcome {
                        label,
                        provider_id: Some(provider.id().to_owned()),
                        result: Ok((output, cost)),
                    };
                }
                // Retryable failures walk the fallback chain; fatal ones
                // fail the task without touching further providers.
                Err(e) if e.is_retryable_provider() || matches!(e, Error::CostLimitExceeded { .. }) => {
                    debug!(task = %label, provider = provider.id(), error = %e, "falling back");
                    last_error = e;
                }
                Err(e) => {
                    self.telemetry.emit(
                        TelemetryEvent::new("translation_task", Outcome::Failure)
                            .job(job_id)
                            .owner(owner)
                            .provider(provider.id()),
                    );
                    return TaskOutcome {
                        label,
                        provider_id: Some(provider.id().to_owned()),
                        result: Err(e),
                    };
                }
            }
        }
        self.telemetry.emit(
            TelemetryEvent::new("translation_task", Outcome::Failure)
                .job(job_id)
                .owner(owner),
        );
        TaskOutcome {
            label,
            provider_id: None,
            result: Err(last_error),
        }
    }

    async fn attempt(
        &self,
        owner: &str,
        task: &Task,
        operation: OperationType,
        context: &serde_json::Value,
        provider: &dyn LlmProvider,
    ) -> Result<(TaskOutput, f64)> {
        let prompt = self.prompts.render(operation, provider.id(), context, None)?;
        let estimated_input = estimate_tokens(&prompt.system) + estimate_tokens(&prompt.user);
        let estimated_cost =
            provider.estimate_cost(estimated_input, u64::from(prompt.params.max_tokens));
        self.budget.reserve(owner, provider.id(), estimated_cost).await?;

        let started = Instant::now();
        let outcome = match &task.kind {
            TaskKind::Function(func) => provider
                .translate_function(func, &prompt)
                .await
                .map(TaskOutput::Function),
            TaskKind::Imports { library, imports } => provider
                .explain_imports(library, imports, &prompt)
                .await
                .map(TaskOutput::Imports),
            TaskKind::Summary { metadata, .. } => provider
                .generate_summary(metadata, &prompt)
                .await
                .map(TaskOutput::Summary),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                let tokens = output_tokens(&output);
                // Actual cost follows reported usage; it may exceed the
                // reserved estimate and is committed regardless. Reported
                // counts are prompt + completion combined.
                let completion_tokens = tokens.saturating_sub(estimated_input);
                let actual_cost = provider.estimate_cost(estimated_input, completion_tokens);
                self.budget
                    .commit(owner, provider.id(), operation, tokens, actual_cost)
                    .await?;
                self.prompts
                    .record_outcome(&prompt.template_id, provider.id(), true, None, latency_ms)
                    .await?;
                Ok((output, actual_cost))
            }
            Err(e) => {
                self.prompts
                    .record_outcome(&prompt.template_id, provider.id(), false, None, latency_ms)
                    .await?;
                Err(e)
            }
        }
    }

    fn aggregate(
        &self,
        job_id: JobId,
        spec: &TranslationSpec,
        decomp: &DecompilationResult,
        outcomes: Vec<TaskOutcome>,
        total_tasks: usize,
        cancel: &CancellationToken,
    ) -> TranslationResult {
        let mut function_translations = Vec::new();
        let mut import_explanations = Vec::new();
        let mut overall_summary = None;
        let mut errors: Vec<TaskError> = Vec::new();
        let mut tokens_used = 0u64;
        let mut estimated_cost = 0f64;
        let mut succeeded = 0usize;
        let mut provider_votes: BTreeMap<String, usize> = BTreeMap::new();

        let excess_note = excess_note_of(decomp, self.config.max_functions);
        for outcome in outcomes {
            match outcome.result {
                Ok((output, cost)) => {
                    succeeded += 1;
                    estimated_cost += cost;
                    tokens_used += output_tokens(&output);
                    if let Some(provider_id) = outcome.provider_id {
                        *provider_votes.entry(provider_id).or_default() += 1;
                    }
                    match output {
                        TaskOutput::Function(t) => function_translations.push(t),
                        TaskOutput::Imports(t) => import_explanations.push(t),
                        TaskOutput::Summary(mut s) => {
                            s.excess_functions = excess_note.clone();
                            overall_summary = Some(s);
                        }
                    }
                }
                Err(e) => {
                    errors.push(TaskError {
                        task: outcome.label,
                        code: e.code().to_owned(),
                        message: e.to_string(),
                    });
                }
            }
        }

        function_translations.sort_by_key(|t| t.address);

        let status = if cancel.is_cancelled() {
            TranslationStatus::Cancelled
        } else if succeeded == 0 {
            TranslationStatus::Failed
        } else if succeeded as f64 / total_tasks as f64 >= self.config.success_fraction {
            TranslationStatus::Completed
        } else {
            TranslationStatus::Partial
        };

        let provider_id = spec
            .provider_pref
            .clone()
            .filter(|id| provider_votes.is_empty() || provider_votes.contains_key(id))
            .or_else(|| {
                provider_votes
                    .iter()
                    .max_by_key(|(_, votes)| **votes)
                    .map(|(id, _)| id.clone())
            })
            .unwrap_or_else(|| "none".to_owned());
        let model = spec.model_pref.clone().unwrap_or_else(|| {
            self.registry
                .get(&provider_id)
                .map(|p| p.model().to_owned())
                .unwrap_or_default()
        });

        info!(
            job_id = %job_id,
            status = %status,
            succeeded,
            total_tasks,
            tokens_used,
            "translation pipeline finished"
        );
        TranslationResult {
            job_id,
            provider_id,
            model,
            detail_level: spec.detail_level,
            function_translations,
            import_explanations,
            overall_summary,
            tokens_used,
            estimated_cost,
            status,
            errors,
        }
    }
}

fn output_tokens(output: &TaskOutput) -> u64 {
    match output {
        TaskOutput::Function(t) => t.tokens_used,
        TaskOutput::Imports(t) => t.tokens_used,
        TaskOutput::Summary(t) => t.tokens_used,
    }
}

fn truncate_assembly(assembly: &str) -> String {
    if assembly.len() <= MAX_ASSEMBLY_CHARS {
        return assembly.to_owned();
    }
    let mut cut = MAX_ASSEMBLY_CHARS;
    while !assembly.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n; [listing truncated]", &assembly[..cut])
}

fn address_list(addresses: &[binlift_domain::value_objects::FunctionAddress]) -> String {
    if addresses.is_empty() {
        return "nothing".to_owned();
    }
    addresses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn function_context(func: &FunctionRecord, spec: &TranslationSpec) -> serde_json::Value {
    json!({
        "name": func.name,
        "address": func.address.to_string(),
        "size": func.size,
        "detail_level": spec.detail_level.to_string(),
        "calls_to": address_list(&func.calls_to),
        "called_by": address_list(&func.called_by),
        "assembly": truncate_assembly(&func.assembly_block),
    })
}

fn imports_context(library: &str, imports: &[ImportRecord]) -> serde_json::Value {
    json!({
        "library": library,
        "symbols": imports
            .iter()
            .map(|i| i.symbol.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

fn summary_context(
    decomp: &DecompilationResult,
    _spec: &TranslationSpec,
    excess_note: &Option<String>,
) -> serde_json::Value {
    let mut by_size: Vec<&FunctionRecord> = decomp.functions.iter().collect();
    by_size.sort_by_key(|f| std::cmp::Reverse(f.size));
    let mut function_overview = by_size
        .iter()
        .take(15)
        .map(|f| format!("- {} at {} ({} bytes)", f.name, f.address, f.size))
        .collect::<Vec<_>>()
        .join("\n");
    if let Some(note) = excess_note {
        function_overview.push('\n');
        function_overview.push_str(note);
    }
    let string_overview = decomp
        .strings
        .iter()
        .take(25)
        .map(|s| format!("- {:?}", s.value))
        .collect::<Vec<_>>()
        .join("\n");
    json!({
        "format": decomp.metadata.format.to_string(),
        "architecture": decomp.metadata.architecture,
        "platform": decomp.metadata.platform,
        "function_count": decomp.metadata.function_count,
        "import_count": decomp.metadata.import_count,
        "string_count": decomp.metadata.string_count,
        "function_overview": function_overview,
        "string_overview": string_overview,
    })
}

fn excess_note_of(decomp: &DecompilationResult, max_functions: usize) -> Option<String> {
    let excess = decomp.functions.len().saturating_sub(max_functions);
    (excess > 0).then(|| format!("{excess} functions summarised in aggregate"))
}
