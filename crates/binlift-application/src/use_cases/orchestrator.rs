//! Decompilation orchestrator.
//!
//! # Overview
//! Executes one claimed job end to end: load the artifact, drive an engine
//! session to a validated decompilation result, persist it (the restart-safe
//! point), run the translation pipeline when requested, and report the
//! terminal state. A background heartbeat extends the lease at a third of
//! its duration and turns an owner cancellation into a cancellation token
//! the extraction and pipeline observe.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use binlift_domain::constants::storage::{
    decomp_result_key, translation_result_key, upload_key,
};
use binlift_domain::entities::{
    DecompilationMetadata, DecompilationResult, DecompilationStatus, Job, JobError,
    TranslationStatus,
};
use binlift_domain::error::{Error, Result};
use binlift_domain::events::{Outcome, TelemetryEvent, TelemetrySink};
use binlift_domain::ports::{
    ArtifactRepository, BlobStore, EngineProvider, EngineSession, HeartbeatSignal, JobQueue,
};
use binlift_domain::value_objects::WorkerId;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::translation_pipeline::TranslationPipeline;

/// Orchestrator tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Directory for per-job scratch files handed to the engine.
    pub scratch_dir: PathBuf,
    /// Engine session restarts tolerated before the failure propagates.
    pub engine_max_restarts: u32,
    /// Heartbeat cadence; at most a third of the lease duration.
    pub heartbeat_interval: Duration,
}

/// Progress milestones of one job.
const PROGRESS_FORMAT_DETECTED: f64 = 0.1;
const PROGRESS_EXTRACTION_DONE: f64 = 0.5;
const PROGRESS_TRANSLATION_DONE: f64 = 1.0;

/// End-to-end executor for claimed jobs.
pub struct DecompilationOrchestrator {
    queue: Arc<dyn JobQueue>,
    artifacts: Arc<dyn ArtifactRepository>,
    blobs: Arc<dyn BlobStore>,
    engine: Arc<dyn EngineProvider>,
    pipeline: Arc<TranslationPipeline>,
    telemetry: Arc<dyn TelemetrySink>,
    config: OrchestratorConfig,
}

impl DecompilationOrchestrator {
    /// Create the orchestrator.
    #[must_use]
    pub fn new(
        queue: Arc<dyn JobQueue>,
        artifacts: Arc<dyn ArtifactRepository>,
        blobs: Arc<dyn BlobStore>,
        engine: Arc<dyn EngineProvider>,
        pipeline: Arc<TranslationPipeline>,
        telemetry: Arc<dyn TelemetrySink>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            queue,
            artifacts,
            blobs,
            engine,
            pipeline,
            telemetry,
            config,
        }
    }

    /// Execute one claimed job to a terminal state.
    ///
    /// Always reports the outcome through the job queue; the returned error
    /// only reflects a failure to report.
    pub async fn execute(&self, job: &Job, worker: WorkerId) -> Result<()> {
        let started = Instant::now();
        let cancel = CancellationToken::new();
        let progress = Arc::new(AtomicU64::new(0));
        let heartbeat = self.spawn_heartbeat(job, worker, &cancel, &progress);

        let outcome = self.run(job, &cancel, &progress).await;
        heartbeat.abort();

        let duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(result_key) => {
                self.queue.complete(job.id, worker, &result_key).await?;
                self.telemetry.emit(
                    TelemetryEvent::new("job_executed", Outcome::Success)
                        .job(job.id)
                        .owner(&job.owner)
                        .duration_ms(duration_ms),
                );
                Ok(())
            }
            Err(Error::Cancelled { .. }) => {
                // The owner cancelled; the job row is already terminal.
                info!(job_id = %job.id, "job observed cancellation");
                self.telemetry.emit(
                    TelemetryEvent::new("job_executed", Outcome::Cancelled)
                        .job(job.id)
                        .owner(&job.owner)
                        .duration_ms(duration_ms),
                );
                Ok(())
            }
            Err(e) => {
                let retryable = matches!(
                    e,
                    Error::EngineTimeout { .. }
                        | Error::EngineCrashed { .. }
                        | Error::StorageIo { .. }
                        | Error::StorageTx { .. }
                );
                warn!(job_id = %job.id, error = %e, retryable, "job execution failed");
                self.telemetry.emit(
                    TelemetryEvent::new("job_executed", Outcome::Failure)
                        .job(job.id)
                        .owner(&job.owner)
                        .duration_ms(duration_ms),
                );
                self.queue
                    .fail(job.id, worker, JobError::from_error(&e), retryable)
                    .await
            }
        }
    }

    async fn run(
        &self,
        job: &Job,
        cancel: &CancellationToken,
        progress: &Arc<AtomicU64>,
    ) -> Result<String> {
        let decomp = self.load_or_extract(job, cancel, progress).await?;
        set_progress(progress, PROGRESS_EXTRACTION_DONE);

        let Some(spec) = &job.translation else {
            return Ok(decomp_result_key(&job.id));
        };

        if cancel.is_cancelled() {
            return Err(Error::cancelled(format!("job {}", job.id)));
        }
        let translation = self
            .pipeline
            .run(job.id, &job.owner, &decomp, spec, cancel)
            .await?;
        let key = translation_result_key(&job.id);
        self.blobs.put(&key, &serde_json::to_vec(&translation)?).await?;
        if translation.status == TranslationStatus::Cancelled {
            return Err(Error::cancelled(format!("job {}", job.id)));
        }
        set_progress(progress, PROGRESS_TRANSLATION_DONE);
        Ok(key)
    }

    /// Load a previously persisted decompilation (resume after worker
    /// crash) or run the engine to produce one.
    async fn load_or_extract(
        &self,
        job: &Job,
        cancel: &CancellationToken,
        progress: &Arc<AtomicU64>,
    ) -> Result<DecompilationResult> {
        let key = decomp_result_key(&job.id);
        if self.blobs.exists(&key).await? {
            info!(job_id = %job.id, "resuming from persisted decompilation");
            let bytes = self.blobs.get(&key).await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let artifact = self
            .artifacts
            .get(&job.file_sha256)
            .await?
            .ok_or_else(|| Error::validation(format!("artifact {} not found", job.file_sha256)))?;
        let binary = self.blobs.get(&upload_key(&artifact.sha256)).await.map_err(|e| {
            match e {
                Error::NotFound { .. } => {
                    Error::validation(format!("artifact {} has no stored bytes", artifact.sha256))
                }
                other => other,
            }
        })?;

        let scratch = self.config.scratch_dir.join(job.id.to_string());
        tokio::fs::create_dir_all(&scratch)
            .await
            .map_err(|e| Error::storage_io_with_source("create scratch dir", e))?;
        let binary_path = scratch.join("binary");
        tokio::fs::write(&binary_path, &binary)
            .await
            .map_err(|e| Error::storage_io_with_source("write scratch binary", e))?;

        let extraction = self
            .extract_with_restarts(job, &binary_path, cancel, progress)
            .await;
        let _ = tokio::fs::remove_dir_all(&scratch).await;
        let decomp = extraction?;

        decomp.validate()?;
        self.artifacts
            .set_analysis(
                &artifact.sha256,
                decomp.metadata.format,
                &decomp.metadata.architecture,
                &decomp.metadata.platform,
            )
            .await?;
        self.blobs.put(&key, &serde_json::to_vec(&decomp)?).await?;
        info!(
            job_id = %job.id,
            functions = decomp.functions.len(),
            imports = decomp.imports.len(),
            strings = decomp.strings.len(),
            "decompilation persisted"
        );
        Ok(decomp)
    }

    async fn extract_with_restarts(
        &self,
        job: &Job,
        binary_path: &std::path::Path,
        cancel: &CancellationToken,
        progress: &Arc<AtomicU64>,
    ) -> Result<DecompilationResult> {
        let mut last_error = None;
        for attempt in 0..=self.config.engine_max_restarts {
            if cancel.is_cancelled() {
                return Err(Error::cancelled(format!("job {}", job.id)));
            }
            if attempt > 0 {
                warn!(job_id = %job.id, attempt, "restarting engine session");
            }
            match self.extract_once(job, binary_path, progress).await {
                Ok(result) => return Ok(result),
                Err(e @ (Error::EngineTimeout { .. } | Error::EngineCrashed { .. })) => {
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| Error::internal("engine extraction failed")))
    }

    async fn extract_once(
        &self,
        job: &Job,
        binary_path: &std::path::Path,
        progress: &Arc<AtomicU64>,
    ) -> Result<DecompilationResult> {
        let started = Instant::now();
        let mut session = self.engine.open(binary_path).await?;
        let result = self.drive_session(job, session.as_mut(), progress, started).await;
        // Release the child process on success and failure alike.
        let _ = session.close().await;
        result
    }

    async fn drive_session(
        &self,
        job: &Job,
        session: &mut dyn EngineSession,
        progress: &Arc<AtomicU64>,
        started: Instant,
    ) -> Result<DecompilationResult> {
        session.analyze().await?;
        let info = session.binary_info().await?;
        set_progress(progress, PROGRESS_FORMAT_DETECTED);

        let functions = session.functions().await?;
        let imports = session.imports().await?;
        let strings = session.strings().await?;

        Ok(DecompilationResult {
            job_id: job.id,
            metadata: DecompilationMetadata {
                sha256: job.file_sha256.clone(),
                format: info.format,
                architecture: info.architecture,
                platform: info.platform,
                function_count: functions.len(),
                import_count: imports.len(),
                string_count: strings.len(),
                duration_ms: started.elapsed().as_millis() as u64,
            },
            functions,
            imports,
            strings,
            status: DecompilationStatus::Completed,
            errors: Vec::new(),
        })
    }

    fn spawn_heartbeat(
        &self,
        job: &Job,
        worker: WorkerId,
        cancel: &CancellationToken,
        progress: &Arc<AtomicU64>,
    ) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let job_id = job.id;
        let cancel = cancel.clone();
        let progress = Arc::clone(progress);
        let interval = self.config.heartbeat_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let current = progress.load(Ordering::Relaxed) as f64 / 1000.0;
                match queue.heartbeat(job_id, worker, current).await {
                    Ok(HeartbeatSignal::Continue) => {}
                    Ok(HeartbeatSignal::Cancelled) => {
                        info!(job_id = %job_id, "cancellation observed via heartbeat");
                        cancel.cancel();
                        break;
                    }
                    Err(e) => {
                        warn!(job_id = %job_id, error = %e, "heartbeat failed");
                        break;
                    }
                }
            }
        })
    }
}

fn set_progress(progress: &Arc<AtomicU64>, value: f64) {
    let milli = (value * 1000.0) as u64;
    progress.fetch_max(milli, Ordering::Relaxed);
}
