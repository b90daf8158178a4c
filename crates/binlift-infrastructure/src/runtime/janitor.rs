//! Janitor: crash recovery and housekeeping.
//!
//! Reclaims expired job leases (worker-crash recovery), enforces the
//! per-job wall-clock timeout, expires upload sessions, and garbage
//! collects unreferenced artifacts after their grace period.

use std::sync::Arc;
use std::time::Duration;

use binlift_domain::constants::limits::ARTIFACT_GC_GRACE_SECS;
use binlift_domain::constants::storage::{session_key, upload_key};
use binlift_domain::entities::JobError;
use binlift_domain::error::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::factory::AppContext;

const SCAN_BATCH: usize = 50;

/// Spawn the janitor loop; one pass every half lease duration.
#[must_use]
pub fn spawn_janitor(ctx: Arc<AppContext>, shutdown: CancellationToken) -> JoinHandle<()> {
    let interval = Duration::from_secs((ctx.config.job_lease_seconds / 2).max(5));
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "janitor started");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
            if let Err(e) = pass(&ctx).await {
                warn!(error = %e, "janitor pass failed");
            }
        }
        info!("janitor stopped");
    })
}

/// One janitor pass: lease reclaim, wall-clock enforcement, session expiry,
/// artifact GC.
pub async fn pass(ctx: &AppContext) -> Result<()> {
    let now = ctx.clock.now();
    reclaim_expired_leases(ctx, now).await?;
    enforce_wall_clock(ctx, now).await?;
    expire_upload_sessions(ctx, now).await?;
    collect_artifacts(ctx, now).await?;
    Ok(())
}

/// A lease that expired without a heartbeat means the worker died; the job
/// goes back to the queue on the worker's behalf until its attempts run out.
async fn reclaim_expired_leases(ctx: &AppContext, now: i64) -> Result<()> {
    for job in ctx.jobs.expired_running(now, SCAN_BATCH).await? {
        let error = JobError {
            code: "worker_lease_expired".to_owned(),
            message: format!(
                "worker {} stopped heartbeating",
                job.worker_id.map(|w| w.to_string()).unwrap_or_default()
            ),
            hint: Some("the job was returned to the queue".to_owned()),
        };
        let reclaimed = if job.attempts + 1 < job.max_attempts {
            let visible_at = now + 30i64.saturating_mul(1 << job.attempts.min(10));
            ctx.jobs
                .try_requeue(&job.id, None, visible_at, &error, now)
                .await?
        } else {
            ctx.jobs.try_fail(&job.id, None, &error, now).await?
        };
        if reclaimed {
            warn!(job_id = %job.id, attempts = job.attempts, "expired lease reclaimed");
        }
    }
    Ok(())
}

async fn enforce_wall_clock(ctx: &AppContext, now: i64) -> Result<()> {
    let cutoff = now - ctx.config.job_timeout_seconds as i64;
    for job in ctx.jobs.running_started_before(cutoff, SCAN_BATCH).await? {
        let error = JobError {
            code: "job_timeout".to_owned(),
            message: format!(
                "job exceeded the wall-clock limit of {}s",
                ctx.config.job_timeout_seconds
            ),
            hint: None,
        };
        if ctx.jobs.force_fail(&job.id, &error, now).await? {
            warn!(job_id = %job.id, "job failed by wall-clock timeout");
        }
    }
    Ok(())
}

async fn expire_upload_sessions(ctx: &AppContext, now: i64) -> Result<()> {
    for session in ctx.upload_sessions.expired(now, SCAN_BATCH).await? {
        ctx.blobs.delete(&session_key(&session.id)).await?;
        ctx.upload_sessions.delete(&session.id).await?;
        info!(session_id = %session.id, "upload session expired");
    }
    Ok(())
}

/// Artifacts with no referencing job are deleted once the grace period has
/// elapsed, blob first so a metadata row never points at nothing.
async fn collect_artifacts(ctx: &AppContext, now: i64) -> Result<()> {
    let cutoff = now - ARTIFACT_GC_GRACE_SECS as i64;
    for artifact in ctx.artifacts.unreferenced_before(cutoff, SCAN_BATCH).await? {
        ctx.blobs.delete(&upload_key(&artifact.sha256)).await?;
        ctx.artifacts.delete(&artifact.sha256).await?;
        info!(sha256 = %artifact.sha256, "artifact garbage collected");
    }
    Ok(())
}
