//! Application use cases.

/// Job lifecycle service (submit/claim/heartbeat/complete/fail/cancel)
pub mod job_service;
pub use job_service::{JobService, JobServiceConfig};

/// End-to-end job execution
pub mod orchestrator;
pub use orchestrator::{DecompilationOrchestrator, OrchestratorConfig};

/// Versioned prompt templates and rendering
pub mod prompt_service;
pub use prompt_service::PromptManager;

/// Result read side for the boundary
pub mod results_service;
pub use results_service::ResultsService;

/// Translation fan-out and aggregation
pub mod translation_pipeline;
pub use translation_pipeline::{PipelineConfig, TranslationPipeline};

/// Upload session intake
pub mod upload_service;
pub use upload_service::{UploadService, UploadServiceConfig};
