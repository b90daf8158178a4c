//! Job entity: the unit of tracked work from submission to terminal state.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::limits::DEFAULT_MAX_ATTEMPTS;
use crate::entities::translation::TranslationSpec;
use crate::value_objects::{JobId, WorkerId};

/// Lifecycle status of a job.
///
/// Transitions: `queued → running → completed|failed`;
/// `queued|running → cancelled`. Terminal states are immutable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting to be picked up
    #[display("queued")]
    Queued,
    /// Job is currently executing under a worker lease
    #[display("running")]
    Running,
    /// Job completed successfully
    #[display("completed")]
    Completed,
    /// Job terminated with an error
    #[display("failed")]
    Failed,
    /// Job was cancelled by its owner
    #[display("cancelled")]
    Cancelled,
}

impl JobStatus {
    /// Returns `true` if the job is in a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns `true` if the job is still progressing toward a result.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// Stable column value for the structured store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse a stored column value.
    pub fn parse(s: &str) -> crate::error::Result<Self> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(crate::error::Error::invalid_argument(format!(
                "unknown job status '{other}'"
            ))),
        }
    }
}

/// Structured error attached to a failed job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobError {
    /// Stable error code ([`crate::error::Error::code`]).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional operator hint.
    pub hint: Option<String>,
}

impl JobError {
    /// Build a job error from a domain error.
    #[must_use]
    pub fn from_error(err: &crate::error::Error) -> Self {
        Self {
            code: err.code().to_owned(),
            message: err.to_string(),
            hint: None,
        }
    }
}

/// Reference to the binary a job should analyze.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileRef {
    /// Content hash of an already-uploaded artifact.
    Sha256(String),
    /// Raw bytes handed over inline; hashed and stored at submission.
    Inline {
        /// The file contents.
        #[serde(with = "serde_bytes_base64")]
        #[schemars(with = "String")]
        bytes: Vec<u8>,
        /// Optional original filename, kept as metadata only.
        filename: Option<String>,
    },
}

/// Base64 transport for inline bytes so job specs stay JSON-friendly.
mod serde_bytes_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &[u8],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// Submission request for a new job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobSpec {
    /// Owner submitting the job.
    pub owner: String,
    /// The binary to analyze.
    pub file_ref: FileRef,
    /// Optional translation stage request.
    pub translation: Option<TranslationSpec>,
    /// Scheduling priority; higher claims first. Default 0.
    #[serde(default)]
    pub priority: i64,
    /// Boundary-supplied idempotency key; resubmission with the same
    /// `(owner, key)` returns the original job id.
    pub idempotency_key: Option<String>,
}

/// A tracked decompilation job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique identifier.
    pub id: JobId,
    /// Owner who submitted the job.
    pub owner: String,
    /// Content hash of the artifact under analysis.
    pub file_sha256: String,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Progress in `[0, 1]`, monotonic while running.
    pub progress: f64,
    /// Scheduling priority; higher claims first.
    pub priority: i64,
    /// Translation stage request, if any.
    pub translation: Option<TranslationSpec>,
    /// Worker holding the lease while `running`.
    pub worker_id: Option<WorkerId>,
    /// Lease expiry (Unix epoch seconds) while `running`.
    pub claim_expires_at: Option<i64>,
    /// Earliest time the job may be claimed (backoff after retryable
    /// failure).
    pub visible_at: i64,
    /// Claim attempts so far.
    pub attempts: u32,
    /// Attempt ceiling before a retryable failure becomes terminal.
    pub max_attempts: u32,
    /// Structured error for `failed` jobs.
    pub error: Option<JobError>,
    /// Boundary-supplied idempotency key.
    pub idempotency_key: Option<String>,
    /// Whether a result payload currently exists in the blob store.
    pub result_present: bool,
    /// Arbitrary metadata carried from submission.
    pub metadata: HashMap<String, serde_json::Value>,
    /// When the job was created (Unix epoch seconds).
    pub created_at: i64,
    /// When the job first entered `running` (Unix epoch seconds).
    pub started_at: Option<i64>,
    /// When the job reached a terminal state (Unix epoch seconds).
    pub completed_at: Option<i64>,
}

impl Job {
    /// Create a new job in `Queued` status from a validated spec.
    #[must_use]
    pub fn new(id: JobId, spec: &JobSpec, file_sha256: String, now: i64) -> Self {
        Self {
            id,
            owner: spec.owner.clone(),
            file_sha256,
            status: JobStatus::Queued,
            progress: 0.0,
            priority: spec.priority,
            translation: spec.translation.clone(),
            worker_id: None,
            claim_expires_at: None,
            visible_at: now,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            error: None,
            idempotency_key: spec.idempotency_key.clone(),
            result_present: false,
            metadata: HashMap::new(),
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Whether `next` is a legal transition from the current status.
    #[must_use]
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self.status, next) {
            (JobStatus::Queued, JobStatus::Running | JobStatus::Cancelled)
            | (
                JobStatus::Running,
                JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::Queued,
            ) => true,
            _ => false,
        }
    }
}
