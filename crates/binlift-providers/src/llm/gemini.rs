//! Google Gemini `generateContent` provider.

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

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Provider for the Gemini generative language API.
pub struct GeminiProvider {
    config: LlmProviderConfig,
    pool: HttpClientPool,
    base_url: String,
}

impl GeminiProvider {
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
            "system_instruction": {"parts": [{"text": prompt.system}]},
            "contents": [
                {"role": "user", "parts": [{"text": prompt.user}]},
            ],
            "generationConfig": {
                "temperature": prompt.params.temperature,
                "maxOutputTokens": prompt.params.max_tokens,
            },
        });
        let request = self
            .pool
            .client()
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.config.default_model
            ))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body);
        let response = common::send(request, &self.config.id, self.config.timeout_secs).await?;
        if !response.status().is_success() {
            return Err(common::status_error(response, &self.config.id).await);
        }
        let body = common::json_body(response, &self.config.id).await?;

        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                Error::provider_server(&self.config.id, "response missing candidate text")
            })?
            .to_owned();
        let input_tokens = body["usageMetadata"]["promptTokenCount"].as_u64();
        let output_tokens = body["usageMetadata"]["candidatesTokenCount"].as_u64();
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
impl LlmProvider for GeminiProvider {
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
            .get(format!("{}/v1beta/models", self.base_url))
            .header("x-goog-api-key", &self.config.api_key);
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
