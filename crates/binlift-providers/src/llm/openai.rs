//! OpenAI-compatible chat provider.
//!
//! Speaks the chat-completions dialect, which also covers Azure OpenAI and
//! self-hosted gateways through `base_url`.

use std::time::Instant;

use async_trait::async_trait;
use binlift_domain::entities::{
    DecompilationMetadata, FunctionRecord, FunctionTranslation, ImportExplanation, ImportRecord,
    OverallSummary, RenderedPrompt,
};
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::{LlmProvider, ProviderHealth};
use binlift_domain::value_objects::LlmProviderConfig;
use serde_json::json;

use super::common::{self, ChatOutcome};
use super::http::HttpClientPool;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Provider for OpenAI-compatible chat-completions APIs.
pub struct OpenAiCompatibleProvider {
    config: LlmProviderConfig,
    pool: HttpClientPool,
    base_url: String,
}

impl OpenAiCompatibleProvider {
    /// Create a provider from its configuration.
    #[must_use]
    pub fn new(config: LlmProviderConfig, pool: HttpClientPool) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        Self {
            config,
            pool,
            base_url,
        }
    }

    async fn chat(&self, prompt: &RenderedPrompt) -> Result<ChatOutcome> {
        let body = json!({
            "model": self.config.default_model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
            "temperature": prompt.params.temperature,
            "max_tokens": prompt.params.max_tokens,
        });
        let request = self
            .pool
            .client()
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body);
        let response = common::send(request, &self.config.id, self.config.timeout_secs).await?;
        if !response.status().is_success() {
            return Err(common::status_error(response, &self.config.id).await);
        }
        let body = common::json_body(response, &self.config.id).await?;

        let text = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                Error::provider_server(&self.config.id, "response missing message content")
            })?
            .to_owned();
        let input_tokens = body["usage"]["prompt_tokens"].as_u64();
        let output_tokens = body["usage"]["completion_tokens"].as_u64();
        Ok(match (input_tokens, output_tokens) {
            (Some(input_tokens), Some(output_tokens)) => ChatOutcome {
                text,
                input_tokens,
                output_tokens,
            },
            _ => ChatOutcome::with_estimated_usage(text, &format!("{}{}", prompt.system, prompt.user)),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn model(&self) -> &str {
        &self.config.default_model
    }

    fn context_window(&self) -> u32 {
        self.config.context_window
    }

    async fn translate_function(
        &self,
        func: &FunctionRecord,
        prompt: &RenderedPrompt,
    ) -> Result<FunctionTranslation> {
        let outcome = self.chat(prompt).await?;
        common::function_translation(&self.config.id, func, &outcome)
    }

    async fn explain_imports(
        &self,
        library: &str,
        imports: &[ImportRecord],
        prompt: &RenderedPrompt,
    ) -> Result<ImportExplanation> {
        let outcome = self.chat(prompt).await?;
        common::import_explanation(&self.config.id, library, imports, &outcome)
    }

    async fn generate_summary(
        &self,
        _metadata: &DecompilationMetadata,
        prompt: &RenderedPrompt,
    ) -> Result<OverallSummary> {
        let outcome = self.chat(prompt).await?;
        common::overall_summary(&self.config.id, &outcome)
    }

    fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        self.config.cost(input_tokens, output_tokens)
    }

    async fn health_check(&self) -> Result<ProviderHealth> {
        let started = Instant::now();
        let request = self
            .pool
            .client()
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.config.api_key);
        let result = common::send(request, &self.config.id, self.config.timeout_secs).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        Ok(match result {
            Ok(response) if response.status().is_success() => ProviderHealth {
                healthy: true,
                latency_ms,
                reason: None,
            },
            Ok(response) => ProviderHealth {
                healthy: false,
                latency_ms,
                reason: Some(format!("models endpoint returned {}", response.status())),
            },
            Err(e) => ProviderHealth {
                healthy: false,
                latency_ms,
                reason: Some(e.to_string()),
            },
        })
    }
}
