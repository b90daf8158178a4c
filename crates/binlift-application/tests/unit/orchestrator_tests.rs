//! End-to-end orchestrator behaviour over mock engines and providers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use binlift_application::decorators::BreakerConfig;
use binlift_application::services::{Clock, ManualClock};
use binlift_application::use_cases::{
    DecompilationOrchestrator, JobService, JobServiceConfig, OrchestratorConfig, PipelineConfig,
    TranslationPipeline,
};
use binlift_domain::constants::storage::{decomp_result_key, translation_result_key};
use binlift_domain::entities::{
    DecompilationResult, FileRef, JobSpec, JobStatus, TranslationResult, TranslationSpec,
    TranslationStatus,
};
use binlift_domain::events::NullTelemetrySink;
use binlift_domain::ports::{
    ArtifactRepository, BlobStore, DatabaseProvider, EngineProvider, JobQueue, LlmProvider,
};
use binlift_domain::value_objects::WorkerId;
use binlift_providers::database::sqlite::{
    SqliteApiKeyRepository, SqliteArtifactRepository, SqliteDatabaseProvider, SqliteJobRepository,
};
use binlift_providers::storage::FilesystemBlobStore;

use crate::support::{MockEngine, MockProvider, function, provider_stack};

struct Harness {
    queue: Arc<JobService>,
    orchestrator: DecompilationOrchestrator,
    blobs: Arc<FilesystemBlobStore>,
    _dir: tempfile::TempDir,
}

async fn harness(engine: Arc<MockEngine>, provider: Arc<MockProvider>, restarts: u32) -> Harness {
    let executor = SqliteDatabaseProvider
        .connect_in_memory()
        .await
        .expect("in-memory store");
    let dir = tempfile::tempdir().expect("tempdir");
    let blobs = Arc::new(FilesystemBlobStore::new(dir.path().join("blobs")));
    let artifacts = Arc::new(SqliteArtifactRepository::new(Arc::clone(&executor)));

    let queue = Arc::new(JobService::new(
        Arc::new(SqliteJobRepository::new(Arc::clone(&executor))),
        Arc::clone(&artifacts) as Arc<dyn ArtifactRepository>,
        Arc::new(SqliteApiKeyRepository::new(executor)),
        Arc::clone(&blobs) as Arc<dyn BlobStore>,
        ManualClock::at(1_000) as Arc<dyn Clock>,
        Arc::new(NullTelemetrySink),
        JobServiceConfig::default(),
    ));

    let stack = provider_stack(
        vec![provider as Arc<dyn LlmProvider>],
        BreakerConfig::default(),
        false,
        HashMap::new(),
    );
    let pipeline = Arc::new(TranslationPipeline::new(
        Arc::clone(&stack.registry),
        Arc::clone(&stack.selector),
        Arc::clone(&stack.prompts),
        Arc::clone(&stack.budget),
        Arc::new(NullTelemetrySink),
        PipelineConfig::default(),
    ));

    let orchestrator = DecompilationOrchestrator::new(
        Arc::clone(&queue) as Arc<dyn JobQueue>,
        artifacts as Arc<dyn ArtifactRepository>,
        Arc::clone(&blobs) as Arc<dyn BlobStore>,
        engine as Arc<dyn EngineProvider>,
        pipeline,
        Arc::new(NullTelemetrySink),
        OrchestratorConfig {
            scratch_dir: dir.path().join("scratch"),
            engine_max_restarts: restarts,
            heartbeat_interval: Duration::from_millis(20),
        },
    );
    Harness {
        queue,
        orchestrator,
        blobs,
        _dir: dir,
    }
}

fn translated_spec(owner: &str) -> JobSpec {
    JobSpec {
        owner: owner.to_owned(),
        file_ref: FileRef::Inline {
            bytes: vec![0x7f, 0x45, 0x4c, 0x46, 0x02, 0x01],
            filename: None,
        },
        translation: Some(TranslationSpec::default()),
        priority: 0,
        idempotency_key: None,
    }
}

fn sample_functions() -> Vec<binlift_domain::entities::FunctionRecord> {
    vec![function(0x1000, "entry0"), function(0x1200, "main")]
}

#[tokio::test]
async fn happy_path_extracts_translates_and_completes() {
    let engine = MockEngine::new(sample_functions());
    let provider = MockProvider::new("openai");
    let h = harness(Arc::clone(&engine), provider, 0).await;

    let job_id = h.queue.submit(translated_spec("u1")).await.unwrap();
    let worker = WorkerId::new();
    let claimed = h.queue.claim(worker, 1).await.unwrap();
    h.orchestrator.execute(&claimed[0], worker).await.unwrap();

    let job = h.queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.result_present);

    let decomp: DecompilationResult = serde_json::from_slice(
        &h.blobs.get(&decomp_result_key(&job_id)).await.unwrap(),
    )
    .unwrap();
    assert_eq!(decomp.functions.len(), 2);
    assert!(decomp.functions.iter().any(|f| f.name == "main"));

    let translation: TranslationResult = serde_json::from_slice(
        &h.blobs.get(&translation_result_key(&job_id)).await.unwrap(),
    )
    .unwrap();
    assert_eq!(translation.status, TranslationStatus::Completed);
    assert_eq!(translation.provider_id, "openai");
    assert!(translation.tokens_used > 0);
    assert!(translation.estimated_cost > 0.0);
    assert!(!translation.function_translations[0].natural_language.is_empty());
}

#[tokio::test]
async fn decompile_only_jobs_complete_with_the_decomp_key() {
    let engine = MockEngine::new(sample_functions());
    let provider = MockProvider::new("openai");
    let h = harness(engine, Arc::clone(&provider), 0).await;

    let mut spec = translated_spec("u1");
    spec.translation = None;
    let job_id = h.queue.submit(spec).await.unwrap();
    let worker = WorkerId::new();
    let claimed = h.queue.claim(worker, 1).await.unwrap();
    h.orchestrator.execute(&claimed[0], worker).await.unwrap();

    let job = h.queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(h.blobs.exists(&decomp_result_key(&job_id)).await.unwrap());
    assert!(!h.blobs.exists(&translation_result_key(&job_id)).await.unwrap());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn resume_skips_extraction_when_a_result_is_persisted() {
    let engine = MockEngine::new(sample_functions());
    let provider = MockProvider::new("openai");
    let h = harness(Arc::clone(&engine), provider, 0).await;

    let job_id = h.queue.submit(translated_spec("u1")).await.unwrap();
    let worker = WorkerId::new();
    let claimed = h.queue.claim(worker, 1).await.unwrap();

    // A previous worker persisted the decompilation before dying.
    let prior = DecompilationResult {
        job_id,
        metadata: binlift_domain::entities::DecompilationMetadata {
            sha256: claimed[0].file_sha256.clone(),
            format: binlift_domain::entities::BinaryFormat::Elf,
            architecture: "x86_64".to_owned(),
            platform: "linux".to_owned(),
            function_count: 2,
            import_count: 0,
            string_count: 0,
            duration_ms: 5,
        },
        functions: sample_functions(),
        imports: Vec::new(),
        strings: Vec::new(),
        status: binlift_domain::entities::DecompilationStatus::Completed,
        errors: Vec::new(),
    };
    h.blobs
        .put(&decomp_result_key(&job_id), &serde_json::to_vec(&prior).unwrap())
        .await
        .unwrap();

    h.orchestrator.execute(&claimed[0], worker).await.unwrap();

    assert_eq!(engine.open_count(), 0);
    let job = h.queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(h.blobs.exists(&translation_result_key(&job_id)).await.unwrap());
}

#[tokio::test]
async fn engine_crashes_are_retried_within_the_session_budget() {
    let mut engine = MockEngine::new(sample_functions());
    Arc::get_mut(&mut engine).unwrap().crashes_before = 2;
    let provider = MockProvider::new("openai");
    let h = harness(Arc::clone(&engine), provider, 2).await;

    let job_id = h.queue.submit(translated_spec("u1")).await.unwrap();
    let worker = WorkerId::new();
    let claimed = h.queue.claim(worker, 1).await.unwrap();
    h.orchestrator.execute(&claimed[0], worker).await.unwrap();

    assert_eq!(engine.open_count(), 3);
    let job = h.queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn persistent_engine_failure_requeues_the_job() {
    let mut engine = MockEngine::new(sample_functions());
    Arc::get_mut(&mut engine).unwrap().crashes_before = 10;
    let provider = MockProvider::new("openai");
    let h = harness(engine, provider, 1).await;

    let job_id = h.queue.submit(translated_spec("u1")).await.unwrap();
    let worker = WorkerId::new();
    let claimed = h.queue.claim(worker, 1).await.unwrap();
    h.orchestrator.execute(&claimed[0], worker).await.unwrap();

    let job = h.queue.get(job_id).await.unwrap().unwrap();
    // Retryable failure: back to the queue with one attempt burned.
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.error.unwrap().code, "engine_crashed");
}

#[tokio::test]
async fn collapsed_addresses_fail_the_job_fatally() {
    let mut functions: Vec<_> = (0..120).map(|_| function(0, "fcn.broken")).collect();
    functions.push(function(0x1000, "main"));
    let engine = MockEngine::new(functions);
    let provider = MockProvider::new("openai");
    let h = harness(engine, provider, 2).await;

    let job_id = h.queue.submit(translated_spec("u1")).await.unwrap();
    let worker = WorkerId::new();
    let claimed = h.queue.claim(worker, 1).await.unwrap();
    h.orchestrator.execute(&claimed[0], worker).await.unwrap();

    let job = h.queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.unwrap().code, "engine_extraction_invalid");
    assert!(!h.blobs.exists(&decomp_result_key(&job_id)).await.unwrap());
}
