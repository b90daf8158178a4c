//! Aggregation invariants for translation results.

use binlift_domain::entities::{
    DetailLevel, FunctionTranslation, ImportExplanation, OverallSummary, TranslationResult,
    TranslationStatus,
};
use binlift_domain::value_objects::{FunctionAddress, JobId};

fn function(addr: u64, tokens: u64) -> FunctionTranslation {
    FunctionTranslation {
        address: FunctionAddress::new(addr),
        name: format!("fcn.{addr:x}"),
        natural_language: "copies the input buffer".to_owned(),
        tokens_used: tokens,
        provider_id: "openai".to_owned(),
    }
}

#[test]
fn task_token_sum_matches_aggregate() {
    let result = TranslationResult {
        job_id: JobId::new(),
        provider_id: "openai".to_owned(),
        model: "gpt-4o-mini".to_owned(),
        detail_level: DetailLevel::Standard,
        function_translations: vec![function(0x1000, 120), function(0x2000, 90)],
        import_explanations: vec![ImportExplanation {
            library: "kernel32.dll".to_owned(),
            symbols: vec!["CreateFileW".to_owned()],
            explanation: "file handle management".to_owned(),
            tokens_used: 40,
        }],
        overall_summary: Some(OverallSummary {
            text: "a small file utility".to_owned(),
            excess_functions: None,
            tokens_used: 60,
        }),
        tokens_used: 310,
        estimated_cost: 0.004,
        status: TranslationStatus::Completed,
        errors: vec![],
    };
    assert_eq!(result.task_token_sum(), result.tokens_used);
    assert!(result.estimated_cost >= 0.0);
}

#[test]
fn function_order_is_address_ascending() {
    let translations = [function(0x1000, 1), function(0x2000, 1), function(0x3000, 1)];
    let mut sorted = translations.to_vec();
    sorted.sort_by_key(|t| t.address);
    assert_eq!(
        translations.iter().map(|t| t.address).collect::<Vec<_>>(),
        sorted.iter().map(|t| t.address).collect::<Vec<_>>(),
    );
}
