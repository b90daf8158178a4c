//! Domain Entities
//!
//! Core business entities representing the main concepts of the binlift
//! domain. Entities have identity and are usually persisted in repositories.

/// API key entities for admission decisions
pub mod api_key;
pub use api_key::ApiKey;

/// Binary artifact entities
pub mod artifact;
pub use artifact::{BinaryArtifact, BinaryFormat, content_hash};

/// Decompilation result entities
pub mod decompilation;
pub use decompilation::{
    DecompilationMetadata, DecompilationResult, DecompilationStatus, FunctionRecord, ImportRecord,
    StringRecord,
};

/// Job lifecycle entities
pub mod job;
pub use job::{FileRef, Job, JobError, JobSpec, JobStatus};

/// Prompt template entities
pub mod prompt;
pub use prompt::{
    OperationType, PromptMetrics, PromptParams, PromptTemplate, ProviderAdaptation, RenderedPrompt,
};

/// Translation result entities
pub mod translation;
pub use translation::{
    DetailLevel, FunctionTranslation, ImportExplanation, OverallSummary, TaskError,
    TranslationResult, TranslationSpec, TranslationStatus,
};

/// Upload session entities
pub mod upload;
pub use upload::UploadSession;

/// Usage accounting entities
pub mod usage;
pub use usage::{RateWindow, UsageRecord, day_bucket, month_bucket};
