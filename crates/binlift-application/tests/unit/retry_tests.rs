//! Retry decorator policy.

use std::sync::Arc;
use std::time::Duration;

use binlift_application::decorators::{RetryConfig, RetryingProvider};
use binlift_domain::entities::{PromptParams, RenderedPrompt};
use binlift_domain::ports::LlmProvider;

use crate::support::{MockFailure, MockOutcome, MockProvider, function};

fn prompt() -> RenderedPrompt {
    RenderedPrompt {
        template_id: "function_translation.default".to_owned(),
        version: 1,
        system: "system".to_owned(),
        user: "user".to_owned(),
        params: PromptParams::default(),
    }
}

fn retrying(provider: Arc<MockProvider>) -> RetryingProvider {
    RetryingProvider::new(
        provider,
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
    )
}

#[tokio::test(start_paused = true)]
async fn transient_server_errors_are_retried_to_success() {
    let provider = MockProvider::new("a");
    provider.script([
        MockOutcome::Fail(MockFailure::ServerError),
        MockOutcome::Fail(MockFailure::Timeout),
        MockOutcome::Success,
    ]);
    let result = retrying(Arc::clone(&provider))
        .translate_function(&function(0x1000, "main"), &prompt())
        .await;
    assert!(result.is_ok());
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn attempts_are_capped() {
    let provider = MockProvider::new("a");
    provider.always_fail(MockFailure::ServerError);
    let err = retrying(Arc::clone(&provider))
        .translate_function(&function(0x1000, "main"), &prompt())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "provider_server_error");
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn fatal_errors_never_retry() {
    for failure in [MockFailure::Auth, MockFailure::BadRequest] {
        let provider = MockProvider::new("a");
        provider.script([MockOutcome::Fail(failure)]);
        let err = retrying(Arc::clone(&provider))
            .translate_function(&function(0x1000, "main"), &prompt())
            .await
            .unwrap_err();
        assert!(!err.is_retryable_provider());
        assert_eq!(provider.call_count(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn zero_retry_after_retries_immediately() {
    let provider = MockProvider::new("a");
    provider.script([
        MockOutcome::Fail(MockFailure::RateLimit(Some(0))),
        MockOutcome::Success,
    ]);
    let result = retrying(Arc::clone(&provider))
        .translate_function(&function(0x1000, "main"), &prompt())
        .await;
    assert!(result.is_ok());
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_exhaustion_surfaces_the_rate_limit() {
    let provider = MockProvider::new("a");
    provider.always_fail(MockFailure::RateLimit(Some(1)));
    let err = retrying(Arc::clone(&provider))
        .translate_function(&function(0x1000, "main"), &prompt())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "provider_rate_limit");
    assert_eq!(provider.call_count(), 3);
}
