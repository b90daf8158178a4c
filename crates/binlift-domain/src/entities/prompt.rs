//! Prompt template entities.
//!
//! Template versions are immutable; publishing a change creates a new
//! version record. Provider adaptations tweak a rendered prompt for one
//! provider without forking the template.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The kind of translation work a template serves.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Translate one function's assembly into prose.
    #[display("function_translation")]
    FunctionTranslation,
    /// Explain one library's imported symbols.
    #[display("import_explanation")]
    ImportExplanation,
    /// Summarize the whole binary.
    #[display("overall_summary")]
    OverallSummary,
}

impl OperationType {
    /// Stable column value for the structured store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FunctionTranslation => "function_translation",
            Self::ImportExplanation => "import_explanation",
            Self::OverallSummary => "overall_summary",
        }
    }
}

/// Sampling parameters attached to a template.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PromptParams {
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion token ceiling.
    pub max_tokens: u32,
}

impl Default for PromptParams {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 1024,
        }
    }
}

/// Per-provider tweak applied after base rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProviderAdaptation {
    /// Text appended to the system prompt.
    pub system_append: Option<String>,
    /// Text appended to the user prompt.
    pub user_append: Option<String>,
    /// Temperature override.
    pub temperature: Option<f64>,
}

/// A versioned prompt template.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PromptTemplate {
    /// Template identity (e.g. `function_translation.default`).
    pub template_id: String,
    /// Monotonic version; a new version is a new record.
    pub version: u32,
    /// Which operation this template serves.
    pub operation_type: OperationType,
    /// System prompt (static text).
    pub system_prompt: String,
    /// User prompt with `{{placeholder}}` substitutions.
    pub user_prompt_template: String,
    /// Per-provider adaptations keyed by provider id.
    pub provider_adaptations: HashMap<String, ProviderAdaptation>,
    /// Default sampling parameters.
    pub default_params: PromptParams,
}

/// A prompt after rendering and provider adaptation, ready to dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderedPrompt {
    /// Template the prompt came from.
    pub template_id: String,
    /// Template version used.
    pub version: u32,
    /// Final system prompt.
    pub system: String,
    /// Final user prompt.
    pub user: String,
    /// Final sampling parameters.
    pub params: PromptParams,
}

/// Rolling per `(template_id, provider_id)` effectiveness counters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PromptMetrics {
    /// Template identity.
    pub template_id: String,
    /// Provider the template was used against.
    pub provider_id: String,
    /// Total renders dispatched.
    pub total_uses: u64,
    /// Dispatches whose translation succeeded.
    pub successes: u64,
    /// Mean caller-reported quality score, when scored.
    pub mean_quality: f64,
    /// Mean provider latency in milliseconds.
    pub mean_latency_ms: f64,
}
