//! Telemetry sink forwarding domain events to tracing.
//!
//! Events carry ids, durations and outcomes only. Raw binary bytes and
//! user-identifying payloads never reach this boundary.

use binlift_domain::events::{TelemetryEvent, TelemetrySink};
use tracing::info;

/// Sink emitting one structured `tracing` event per domain event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn emit(&self, event: TelemetryEvent) {
        info!(
            target: "binlift::telemetry",
            event = event.event,
            job_id = event.job_id.map(|id| id.to_string()),
            owner = event.owner,
            provider = event.provider,
            duration_ms = event.duration_ms,
            outcome = %event.outcome,
            "telemetry"
        );
    }
}
