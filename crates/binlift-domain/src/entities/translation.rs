//! Translation result entities: LLM explanations keyed to a decompilation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::value_objects::{FunctionAddress, JobId};

/// How much detail the translation should carry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    JsonSchema,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    /// One or two sentences per function.
    #[display("brief")]
    Brief,
    /// A paragraph per function plus behaviour notes.
    #[default]
    #[display("standard")]
    Standard,
    /// Full walkthrough including calling convention and side effects.
    #[display("detailed")]
    Detailed,
}

/// Caller request for the translation stage of a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TranslationSpec {
    /// Requested detail level.
    pub detail_level: DetailLevel,
    /// Pinned provider id; `None` lets the selector choose.
    pub provider_pref: Option<String>,
    /// Pinned model; `None` uses the provider's default.
    pub model_pref: Option<String>,
    /// Fan-out bound override; `None` uses `pipeline.max_concurrency`.
    pub max_concurrency: Option<usize>,
}

/// Natural-language explanation of one function.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FunctionTranslation {
    /// Address of the translated function.
    pub address: FunctionAddress,
    /// Function name at translation time.
    pub name: String,
    /// The explanation text.
    pub natural_language: String,
    /// Tokens consumed by this task (prompt + completion).
    pub tokens_used: u64,
    /// Provider that actually served this task (after any fallback).
    pub provider_id: String,
}

/// Explanation of one library's imported symbols.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImportExplanation {
    /// The providing library.
    pub library: String,
    /// Symbols covered by this explanation.
    pub symbols: Vec<String>,
    /// The explanation text.
    pub explanation: String,
    /// Tokens consumed by this task.
    pub tokens_used: u64,
}

/// Whole-binary summary.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OverallSummary {
    /// The summary text.
    pub text: String,
    /// Aggregate note covering functions beyond the per-function cap, if any
    /// were skipped.
    pub excess_functions: Option<String>,
    /// Tokens consumed by this task.
    pub tokens_used: u64,
}

/// Terminal status of a translation run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum TranslationStatus {
    /// At least the configured success fraction of tasks succeeded.
    #[display("completed")]
    Completed,
    /// Some tasks failed but at least one succeeded.
    #[display("partial")]
    Partial,
    /// No task succeeded.
    #[display("failed")]
    Failed,
    /// The pipeline was cancelled; the result holds whatever finished.
    #[display("cancelled")]
    Cancelled,
}

/// Error recorded for one failed or skipped translation task.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaskError {
    /// Task label (`function:0x…`, `imports:kernel32.dll`, `summary`).
    pub task: String,
    /// Stable error code ([`crate::error::Error::code`]).
    pub code: String,
    /// Human-readable detail.
    pub message: String,
}

/// Aggregated LLM translation output for one job.
///
/// At most one exists per `(job_id, provider_id, model)`; immutable once
/// written, stored under `results/translation/{job_id}.json`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TranslationResult {
    /// Job this result belongs to.
    pub job_id: JobId,
    /// Primary provider the run was dispatched against.
    pub provider_id: String,
    /// Model used by the primary provider.
    pub model: String,
    /// Detail level the run was requested at.
    pub detail_level: DetailLevel,
    /// Per-function explanations, ordered by address ascending.
    pub function_translations: Vec<FunctionTranslation>,
    /// Per-library import explanations.
    pub import_explanations: Vec<ImportExplanation>,
    /// Whole-binary summary, when that task succeeded.
    pub overall_summary: Option<OverallSummary>,
    /// Total tokens consumed across all tasks.
    pub tokens_used: u64,
    /// Estimated cost in USD across all tasks.
    pub estimated_cost: f64,
    /// Terminal status of the run.
    pub status: TranslationStatus,
    /// Per-task errors for failed or skipped tasks.
    pub errors: Vec<TaskError>,
}

impl TranslationResult {
    /// Sum of per-task token counts; by construction equals `tokens_used`.
    #[must_use]
    pub fn task_token_sum(&self) -> u64 {
        let functions: u64 = self.function_translations.iter().map(|t| t.tokens_used).sum();
        let imports: u64 = self.import_explanations.iter().map(|t| t.tokens_used).sum();
        let summary = self.overall_summary.as_ref().map_or(0, |s| s.tokens_used);
        functions + imports + summary
    }
}
