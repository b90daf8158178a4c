//! Shared plumbing for the API-backed LLM providers.

use std::time::Duration;

use binlift_domain::entities::{
    FunctionRecord, FunctionTranslation, ImportExplanation, ImportRecord, OverallSummary,
};
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::estimate_tokens;
use reqwest::{RequestBuilder, Response, StatusCode};

/// Text plus token accounting from one completed chat call.
#[derive(Debug, Clone)]
pub(crate) struct ChatOutcome {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl ChatOutcome {
    pub(crate) fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Fall back to byte-based estimates when a provider omits usage.
    pub(crate) fn with_estimated_usage(text: String, prompt_text: &str) -> Self {
        let input_tokens = estimate_tokens(prompt_text);
        let output_tokens = estimate_tokens(&text);
        Self {
            text,
            input_tokens,
            output_tokens,
        }
    }
}

/// Send a request and normalize transport errors to the provider taxonomy.
pub(crate) async fn send(
    request: RequestBuilder,
    provider: &str,
    timeout_secs: u64,
) -> Result<Response> {
    request
        .timeout(Duration::from_secs(timeout_secs))
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                Error::ProviderTimeout {
                    provider: provider.to_owned(),
                    timeout_secs,
                }
            } else {
                Error::provider_server(provider, format!("transport: {e}"))
            }
        })
}

/// Map a non-success HTTP status to the provider error taxonomy.
pub(crate) async fn status_error(response: Response, provider: &str) -> Error {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(300).collect();

    match status {
        StatusCode::TOO_MANY_REQUESTS => Error::ProviderRateLimit {
            provider: provider.to_owned(),
            retry_after_secs: retry_after,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::provider_auth(provider, snippet)
        }
        s if s.is_client_error() => Error::provider_bad_request(provider, snippet),
        s => Error::provider_server(provider, format!("{s}: {snippet}")),
    }
}

/// Extract a JSON body, mapping parse failures to server errors (a provider
/// answering 200 with garbage is a provider fault, not ours).
pub(crate) async fn json_body(response: Response, provider: &str) -> Result<serde_json::Value> {
    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| Error::provider_server(provider, format!("malformed response body: {e}")))
}

/// Assemble a function translation from a chat outcome.
pub(crate) fn function_translation(
    provider_id: &str,
    func: &FunctionRecord,
    outcome: &ChatOutcome,
) -> Result<FunctionTranslation> {
    if outcome.text.trim().is_empty() {
        return Err(Error::provider_server(
            provider_id,
            format!("empty translation for function {}", func.address),
        ));
    }
    Ok(FunctionTranslation {
        address: func.address,
        name: func.name.clone(),
        natural_language: outcome.text.trim().to_owned(),
        tokens_used: outcome.total_tokens(),
        provider_id: provider_id.to_owned(),
    })
}

/// Assemble an import explanation from a chat outcome.
pub(crate) fn import_explanation(
    provider_id: &str,
    library: &str,
    imports: &[ImportRecord],
    outcome: &ChatOutcome,
) -> Result<ImportExplanation> {
    if outcome.text.trim().is_empty() {
        return Err(Error::provider_server(
            provider_id,
            format!("empty explanation for library {library}"),
        ));
    }
    Ok(ImportExplanation {
        library: library.to_owned(),
        symbols: imports.iter().map(|i| i.symbol.clone()).collect(),
        explanation: outcome.text.trim().to_owned(),
        tokens_used: outcome.total_tokens(),
    })
}

/// Assemble an overall summary from a chat outcome.
pub(crate) fn overall_summary(provider_id: &str, outcome: &ChatOutcome) -> Result<OverallSummary> {
    if outcome.text.trim().is_empty() {
        return Err(Error::provider_server(provider_id, "empty summary"));
    }
    Ok(OverallSummary {
        text: outcome.text.trim().to_owned(),
        excess_functions: None,
        tokens_used: outcome.total_tokens(),
    })
}
