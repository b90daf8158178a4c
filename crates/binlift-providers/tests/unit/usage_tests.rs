//! Usage ledger and prompt metrics accumulation.

use binlift_domain::entities::OperationType;
use binlift_domain::ports::{DatabaseProvider, PromptMetricsRepository, UsageRepository};
use binlift_providers::database::sqlite::{
    SqliteDatabaseProvider, SqlitePromptMetricsRepository, SqliteUsageRepository,
};

#[tokio::test]
async fn usage_accumulates_monotonically() {
    let executor = SqliteDatabaseProvider
        .connect_in_memory()
        .await
        .expect("in-memory store");
    let repo = SqliteUsageRepository::new(executor);

    repo.add("u1", "openai", "2026-03-16", OperationType::FunctionTranslation, 100, 1, 0.002)
        .await
        .unwrap();
    repo.add("u1", "openai", "2026-03-16", OperationType::FunctionTranslation, 50, 1, 0.001)
        .await
        .unwrap();
    repo.add("u1", "openai", "2026-03-16", OperationType::OverallSummary, 30, 1, 0.0005)
        .await
        .unwrap();
    repo.add("u1", "openai", "2026-03-02", OperationType::OverallSummary, 10, 1, 0.0001)
        .await
        .unwrap();

    let row = repo
        .get("u1", "openai", "2026-03-16", OperationType::FunctionTranslation)
        .await
        .unwrap()
        .expect("row present");
    assert_eq!(row.tokens_used, 150);
    assert_eq!(row.requests, 2);
    assert!((row.cost - 0.003).abs() < 1e-9);

    let day = repo.cost_for_day("u1", "openai", "2026-03-16").await.unwrap();
    assert!((day - 0.0035).abs() < 1e-9);
    let month = repo.cost_for_month("u1", "openai", "2026-03").await.unwrap();
    assert!((month - 0.0036).abs() < 1e-9);
    assert_eq!(repo.cost_for_day("u1", "anthropic", "2026-03-16").await.unwrap(), 0.0);
}

#[tokio::test]
async fn prompt_metrics_fold_means_on_read() {
    let executor = SqliteDatabaseProvider
        .connect_in_memory()
        .await
        .expect("in-memory store");
    let repo = SqlitePromptMetricsRepository::new(executor);

    repo.record("function_translation.default", "openai", true, Some(0.8), 200)
        .await
        .unwrap();
    repo.record("function_translation.default", "openai", false, None, 400)
        .await
        .unwrap();

    let metrics = repo
        .get("function_translation.default", "openai")
        .await
        .unwrap()
        .expect("metrics present");
    assert_eq!(metrics.total_uses, 2);
    assert_eq!(metrics.successes, 1);
    assert!((metrics.mean_quality - 0.8).abs() < 1e-9);
    assert!((metrics.mean_latency_ms - 300.0).abs() < 1e-9);
}
