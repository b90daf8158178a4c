//! Provider selection and fallback ordering.

use std::collections::HashMap;
use std::sync::Arc;

use binlift_application::decorators::BreakerConfig;
use binlift_application::services::ProviderBudget;
use binlift_domain::ports::LlmProvider;

use crate::support::{MockProvider, provider_stack};

#[tokio::test]
async fn preference_order_is_kept_without_cost_optimization() {
    let a = MockProvider::new("a");
    let b = MockProvider::new("b");
    let stack = provider_stack(
        vec![a as Arc<dyn LlmProvider>, b as Arc<dyn LlmProvider>],
        BreakerConfig::default(),
        false,
        HashMap::new(),
    );
    let candidates = stack.selector.candidates("u1", None, 100, 100).await.unwrap();
    let ids: Vec<_> = candidates.iter().map(|p| p.id().to_owned()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn cost_optimization_sorts_cheapest_first() {
    let expensive = MockProvider::with_cost("expensive", 0.01);
    let cheap = MockProvider::with_cost("cheap", 0.000_1);
    let stack = provider_stack(
        vec![
            expensive as Arc<dyn LlmProvider>,
            cheap as Arc<dyn LlmProvider>,
        ],
        BreakerConfig::default(),
        true,
        HashMap::new(),
    );
    let candidates = stack.selector.candidates("u1", None, 100, 100).await.unwrap();
    assert_eq!(candidates[0].id(), "cheap");
}

#[tokio::test]
async fn unhealthy_providers_are_filtered() {
    let a = MockProvider::new("a");
    a.set_healthy(false);
    let b = MockProvider::new("b");
    let stack = provider_stack(
        vec![
            Arc::clone(&a) as Arc<dyn LlmProvider>,
            b as Arc<dyn LlmProvider>,
        ],
        BreakerConfig::default(),
        false,
        HashMap::new(),
    );
    let candidates = stack.selector.candidates("u1", None, 100, 100).await.unwrap();
    let ids: Vec<_> = candidates.iter().map(|p| p.id().to_owned()).collect();
    assert_eq!(ids, vec!["b"]);
}

#[tokio::test]
async fn open_breaker_filters_a_provider() {
    let a = MockProvider::new("a");
    let b = MockProvider::new("b");
    let stack = provider_stack(
        vec![a as Arc<dyn LlmProvider>, b as Arc<dyn LlmProvider>],
        BreakerConfig::default(),
        false,
        HashMap::new(),
    );
    stack.registry.breaker("a").force_open();
    let candidates = stack.selector.candidates("u1", None, 100, 100).await.unwrap();
    let ids: Vec<_> = candidates.iter().map(|p| p.id().to_owned()).collect();
    assert_eq!(ids, vec!["b"]);
}

#[tokio::test]
async fn over_budget_providers_are_filtered() {
    let a = MockProvider::with_cost("a", 1.0);
    let b = MockProvider::with_cost("b", 0.000_01);
    let budgets = HashMap::from([(
        "a".to_owned(),
        ProviderBudget {
            daily_usd: 0.000_001,
            monthly_usd: 100.0,
        },
    )]);
    let stack = provider_stack(
        vec![a as Arc<dyn LlmProvider>, b as Arc<dyn LlmProvider>],
        BreakerConfig::default(),
        false,
        budgets,
    );
    let candidates = stack.selector.candidates("u1", None, 10_000, 10_000).await.unwrap();
    let ids: Vec<_> = candidates.iter().map(|p| p.id().to_owned()).collect();
    assert_eq!(ids, vec!["b"]);
}

#[tokio::test]
async fn nothing_available_is_provider_unavailable() {
    let a = MockProvider::new("a");
    a.set_healthy(false);
    let stack = provider_stack(
        vec![a as Arc<dyn LlmProvider>],
        BreakerConfig::default(),
        false,
        HashMap::new(),
    );
    let err = match stack.selector.candidates("u1", None, 100, 100).await {
        Err(e) => e,
        Ok(_) => panic!("expected an error"),
    };
    assert_eq!(err.code(), "provider_unavailable");
}

#[tokio::test]
async fn pinned_provider_bypasses_selection_but_not_the_breaker() {
    let a = MockProvider::new("a");
    a.set_healthy(false);
    let b = MockProvider::new("b");
    let stack = provider_stack(
        vec![
            Arc::clone(&a) as Arc<dyn LlmProvider>,
            b as Arc<dyn LlmProvider>,
        ],
        BreakerConfig::default(),
        false,
        HashMap::new(),
    );
    // Pinning ignores health filtering; the call itself will surface the
    // provider's failure.
    let candidates = stack.selector.candidates("u1", Some("a"), 100, 100).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].id(), "a");

    stack.registry.breaker("a").force_open();
    let err = match stack.selector.candidates("u1", Some("a"), 100, 100).await {
        Err(e) => e,
        Ok(_) => panic!("expected an error"),
    };
    assert_eq!(err.code(), "provider_unavailable");
}
