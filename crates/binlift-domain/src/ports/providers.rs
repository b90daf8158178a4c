//! LLM provider ports.
//!
//! One uniform capability set across OpenAI-compatible, Anthropic, Gemini
//! and Ollama backends. Providers are safely callable from multiple workers;
//! per-call state never leaks between invocations.

use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::{
    DecompilationMetadata, FunctionRecord, FunctionTranslation, ImportExplanation, ImportRecord,
    OverallSummary, RenderedPrompt,
};
use crate::error::Result;

/// Which provider API dialect an instance speaks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI chat-completions dialect; covers Azure and self-hosted
    /// gateways via `base_url`.
    #[display("openai_compatible")]
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
    /// Anthropic messages API.
    #[display("anthropic")]
    Anthropic,
    /// Google Gemini `generateContent` API.
    #[display("gemini")]
    Gemini,
    /// Local Ollama server.
    #[display("ollama")]
    Ollama,
}

/// Result of a provider health probe.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProviderHealth {
    /// Whether the probe succeeded.
    pub healthy: bool,
    /// Probe round-trip latency.
    pub latency_ms: u64,
    /// Failure detail when unhealthy.
    pub reason: Option<String>,
}

/// AI translation interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Configured provider id (selection and accounting key).
    fn id(&self) -> &str;

    /// Model the provider dispatches to.
    fn model(&self) -> &str;

    /// Context window of the model, in tokens.
    fn context_window(&self) -> u32;

    /// Translate one function's assembly into natural language.
    async fn translate_function(
        &self,
        func: &FunctionRecord,
        prompt: &RenderedPrompt,
    ) -> Result<FunctionTranslation>;

    /// Explain one library's imported symbols.
    async fn explain_imports(
        &self,
        library: &str,
        imports: &[ImportRecord],
        prompt: &RenderedPrompt,
    ) -> Result<ImportExplanation>;

    /// Summarize the whole binary from its decompilation metadata.
    async fn generate_summary(
        &self,
        metadata: &DecompilationMetadata,
        prompt: &RenderedPrompt,
    ) -> Result<OverallSummary>;

    /// Estimated USD cost for a call of the given token volume.
    fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64;

    /// Probe the provider with a minimal request.
    async fn health_check(&self) -> Result<ProviderHealth>;
}

/// HTTP client configuration shared by API-backed providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Maximum idle connections per host
    pub max_idle_per_host: usize,
    /// Idle connection timeout
    pub idle_timeout: Duration,
    /// TCP keep-alive duration
    pub keepalive: Duration,
    /// Total timeout for requests
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 10,
            idle_timeout: Duration::from_secs(90),
            keepalive: Duration::from_secs(60),
            timeout: Duration::from_secs(30),
            user_agent: "binlift/provider-client".to_owned(),
        }
    }
}

/// Rough token estimate for budgeting before a call is made.
///
/// Four bytes per token is the conservative industry rule of thumb; actual
/// usage reported by the provider replaces this after the call.
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64 / 4).max(1)
}
