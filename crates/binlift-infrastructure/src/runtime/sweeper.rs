//! TTL sweeper for result payloads.
//!
//! Deletes result blobs past their TTL (blob first, metadata second, so a
//! row never points at a missing blob outside a sweep in progress) and
//! prunes orphaned result blobs whose job rows are gone.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use binlift_domain::constants::limits::MIN_SWEEP_INTERVAL_SECS;
use binlift_domain::constants::storage::{
    DECOMP_RESULTS_PREFIX, TRANSLATION_RESULTS_PREFIX, decomp_result_key, translation_result_key,
};
use binlift_domain::error::Result;
use binlift_domain::value_objects::JobId;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::factory::AppContext;

const SWEEP_BATCH: usize = 100;

/// Spawn the sweeper loop.
#[must_use]
pub fn spawn_sweeper(ctx: Arc<AppContext>, shutdown: CancellationToken) -> JoinHandle<()> {
    let interval = Duration::from_secs(
        ctx.config.sweep_interval_seconds.max(MIN_SWEEP_INTERVAL_SECS),
    );
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "sweeper started");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
            if let Err(e) = pass(&ctx).await {
                warn!(error = %e, "sweep pass failed");
            }
        }
        info!("sweeper stopped");
    })
}

/// One sweep pass: TTL expiry then orphan collection.
pub async fn pass(ctx: &AppContext) -> Result<()> {
    expire_results(ctx).await?;
    collect_orphans(ctx).await?;
    Ok(())
}

async fn expire_results(ctx: &AppContext) -> Result<()> {
    let cutoff = ctx.clock.now() - ctx.config.result_ttl_seconds as i64;
    let expired = ctx.jobs.completed_before(cutoff, SWEEP_BATCH).await?;
    for job in expired {
        ctx.blobs.delete(&translation_result_key(&job.id)).await?;
        ctx.blobs.delete(&decomp_result_key(&job.id)).await?;
        ctx.jobs.clear_result_present(&job.id).await?;
        debug!(job_id = %job.id, "result payloads expired");
    }
    Ok(())
}

/// A crash between a result blob write and its row update leaves the blob
/// orphaned; anything under `results/` without a job row gets collected.
async fn collect_orphans(ctx: &AppContext) -> Result<()> {
    let live: HashSet<JobId> = ctx.jobs.all_ids().await?.into_iter().collect();
    for prefix in [DECOMP_RESULTS_PREFIX, TRANSLATION_RESULTS_PREFIX] {
        for key in ctx.blobs.list(prefix).await? {
            let Some(job_id) = job_id_of_key(&key, prefix) else {
                continue;
            };
            if !live.contains(&job_id) {
                ctx.blobs.delete(&key).await?;
                info!(key, "orphaned result blob collected");
            }
        }
    }
    Ok(())
}

fn job_id_of_key(key: &str, prefix: &str) -> Option<JobId> {
    key.strip_prefix(prefix)?
        .strip_suffix(".json")
        .and_then(|stem| JobId::parse(stem).ok())
}
