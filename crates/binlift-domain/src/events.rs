//! Telemetry event types.
//!
//! Every significant transition emits one structured event to the telemetry
//! boundary. Events carry identifiers and durations only, never PII and
//! never raw bytes from the analyzed binary.

use serde::{Deserialize, Serialize};

use crate::value_objects::JobId;

/// Outcome attached to a telemetry event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The transition succeeded.
    #[display("success")]
    Success,
    /// The transition failed.
    #[display("failure")]
    Failure,
    /// The transition was cancelled.
    #[display("cancelled")]
    Cancelled,
}

/// One structured telemetry event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Event name (`job_submitted`, `job_claimed`, `translation_task`, …).
    pub event: &'static str,
    /// Related job, when applicable.
    pub job_id: Option<JobId>,
    /// Owner on whose behalf the transition ran.
    pub owner: Option<String>,
    /// Provider involved, when applicable.
    pub provider: Option<String>,
    /// Duration of the covered operation in milliseconds.
    pub duration_ms: Option<u64>,
    /// Outcome of the transition.
    pub outcome: Outcome,
}

impl TelemetryEvent {
    /// Start building an event with the given name and outcome.
    #[must_use]
    pub fn new(event: &'static str, outcome: Outcome) -> Self {
        Self {
            event,
            job_id: None,
            owner: None,
            provider: None,
            duration_ms: None,
            outcome,
        }
    }

    /// Attach a job id.
    #[must_use]
    pub fn job(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    /// Attach an owner.
    #[must_use]
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Attach a provider id.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Attach a duration.
    #[must_use]
    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }
}

/// Sink for telemetry events. Infrastructure forwards these to tracing.
pub trait TelemetrySink: Send + Sync {
    /// Emit one event.
    fn emit(&self, event: TelemetryEvent);
}

/// Sink that drops everything (tests, minimal contexts).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    fn emit(&self, _event: TelemetryEvent) {}
}
