//! Configuration loading from YAML.

use binlift_domain::ports::ProviderKind;
use binlift_infrastructure::config::ConfigLoader;

const SAMPLE: &str = r"
settings:
  storage_root: /var/lib/binlift
  structured_store_url: 'sqlite:/var/lib/binlift/store.db'
  worker_count: 4
  job_lease_seconds: 90
  result_ttl_seconds: 86400
  rate_limit:
    window_seconds: 60
    default_requests_per_window: 30
    default_max_pending_jobs: 5
    tiers:
      pro:
        requests_per_window: 300
        max_pending_jobs: 50
  providers:
    - id: openai
      kind: openai_compatible
      api_key: sk-test
      default_model: gpt-4o-mini
      daily_budget_usd: 5.0
      monthly_budget_usd: 50.0
    - id: local
      kind: ollama
      base_url: 'http://127.0.0.1:11434'
      default_model: qwen2.5-coder
      cost_per_1k_input_usd: 0.0
      cost_per_1k_output_usd: 0.0
  breaker:
    window: 120
    failure_ratio: 0.4
    min_samples: 8
    cooldown_seconds: 45
  pipeline:
    max_concurrency: 6
    max_functions: 200
    success_fraction: 0.75
  engine:
    binary_path: /usr/bin/r2
    command_timeout_seconds: 30
    analysis_timeout_seconds: 600
    max_restarts: 1
  logging:
    level: debug
    json_format: true
";

fn write_config(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("test.yaml");
    std::fs::write(&path, content).expect("write config");
    path
}

#[test]
fn loads_a_full_settings_block() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, SAMPLE);
    let config = ConfigLoader::new().with_config_path(&path).load().unwrap();

    assert_eq!(config.worker_count, 4);
    assert_eq!(config.job_lease_seconds, 90);
    assert_eq!(config.rate_limit.tiers["pro"].requests_per_window, 300);
    assert_eq!(config.providers.len(), 2);
    assert_eq!(config.providers[0].kind, ProviderKind::OpenAiCompatible);
    assert_eq!(config.providers[1].kind, ProviderKind::Ollama);
    // Omitted provider fields fall back to defaults.
    assert_eq!(config.providers[0].timeout_seconds, 30);
    assert_eq!(config.breaker.min_samples, 8);
    assert!((config.pipeline.success_fraction - 0.75).abs() < f64::EPSILON);
    assert!(config.logging.json_format);
    // Unset top-level values take their documented defaults.
    assert_eq!(config.max_attempts, 3);
    assert_eq!(config.sweep_interval_seconds, 300);
}

#[test]
fn minimal_config_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r"
settings:
  storage_root: /tmp/binlift
  structured_store_url: 'sqlite:/tmp/binlift.db'
",
    );
    let config = ConfigLoader::new().with_config_path(&path).load().unwrap();
    assert_eq!(config.worker_count, 2);
    assert!(config.providers.is_empty());
    assert_eq!(config.pipeline.max_concurrency, 4);
}

#[test]
fn missing_settings_key_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "storage_root: /tmp/x\n");
    let err = ConfigLoader::new().with_config_path(&path).load().unwrap_err();
    assert_eq!(err.code(), "config_error");
}

#[test]
fn unknown_fields_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r"
settings:
  storage_root: /tmp/binlift
  structured_store_url: 'sqlite:/tmp/binlift.db'
  definitely_not_a_field: true
",
    );
    assert!(ConfigLoader::new().with_config_path(&path).load().is_err());
}

#[test]
fn invalid_values_fail_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r"
settings:
  storage_root: /tmp/binlift
  structured_store_url: 'sqlite:/tmp/binlift.db'
  worker_count: 0
",
    );
    let err = ConfigLoader::new().with_config_path(&path).load().unwrap_err();
    assert_eq!(err.code(), "config_error");
}

#[test]
fn missing_file_is_reported() {
    let err = ConfigLoader::new()
        .with_config_path("/definitely/not/here.yaml")
        .load()
        .unwrap_err();
    assert_eq!(err.code(), "config_error");
}
