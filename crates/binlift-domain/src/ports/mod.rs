//! Domain Port Interfaces
//!
//! Defines all boundary contracts between the domain and external layers.
//! High-level modules (domain) declare the interfaces; providers and
//! infrastructure implement them.

/// Administrative interfaces for provider monitoring
mod admin;
/// Reverse-engineering engine ports
mod engine;
/// Job queue port
mod jobs;
/// Admission and budget ports
mod limiter;
/// LLM provider ports
mod providers;
/// Repository ports for data persistence
mod repositories;
/// Storage ports (blob store, SQL execution)
mod storage;

// ============================================================================
// Canonical re-exports — the ONE import surface for all port traits/types.
// Consumers use `binlift_domain::ports::{...}` only.
// ============================================================================

// --- Admin ---
pub use admin::{BreakerState, ProviderAdmin, ProviderAdminState};

// --- Engine ---
pub use engine::{BinaryInfo, EngineProvider, EngineSession};

// --- Jobs ---
pub use jobs::{HeartbeatSignal, JobQueue};

// --- Limiter ---
pub use limiter::{Admission, AdmissionControl, BudgetGate};

// --- Providers ---
pub use providers::{
    HttpClientConfig, LlmProvider, ProviderHealth, ProviderKind, estimate_tokens,
};

// --- Repositories ---
pub use repositories::{
    ApiKeyRepository, ArtifactRepository, JobRepository, PromptMetricsRepository,
    RateWindowRepository, UploadSessionRepository, UsageRepository,
};

// --- Storage ---
pub use storage::{BlobStore, DatabaseExecutor, DatabaseProvider, SqlParam, SqlRow};
