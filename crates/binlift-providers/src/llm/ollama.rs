//! Local Ollama chat provider.
//!
//! No API key and no cost; useful for air-gapped analysis. Usage counts come
//! from Ollama's eval counters.

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

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Provider for a local Ollama server.
pub struct OllamaProvider {
    config: LlmProviderConfig,
    pool: HttpClientPool,
    base_url: String,
}

impl OllamaProvider {
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
            "stream": false,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
            "options": {
                "temperature": prompt.params.temperature,
                "num_predict": prompt.params.max_tokens,
            },
        });
        let request = self
            .pool
            .client()
            .post(format!("{}/api/chat", self.base_url))
            .json(&body);
        let response = common::send(request, &self.config.id, self.config.timeout_secs).await?;
        if !response.status().is_success() {
            return Err(common::status_error(response, &self.config.id).await);
        }
        let body = common::json_body(response, &self.config.id).await?;

        let text = body["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                Error::provider_server(&self.config.id, "response missing message content")
            })?
            .to_owned();
        let input_tokens = body["prompt_eval_count"].as_u64();
        let output_tokens = body["eval_count"].as_u64();
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
impl LlmProvider for OllamaProvider {
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
        // Local inference is free unless the operator prices it.
        self.config.cost(input_tokens, output_tokens)
    }

    async fn health_check(&self) -> Result<ProviderHealth> {
        let started = Instant::now();
        let request = self.pool.client().get(format!("{}/api/tags", self.base_url));
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
                reason: Some(format!("tags endpoint returned {}", response.status())),
            },
            Err(e) => ProviderHealth {
                healthy: false,
                latency_ms,
                reason: Some(e.to_string()),
            },
        })
    }
}
