//! Worker pool: a small fixed set of tasks, each claiming and executing one
//! job at a time to completion.

use std::sync::Arc;
use std::time::Duration;

use binlift_domain::value_objects::WorkerId;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::factory::AppContext;

/// Idle poll cadence when the queue is empty.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Spawn `count` workers driving the orchestrator until `shutdown` fires.
#[must_use]
pub fn spawn_workers(
    ctx: Arc<AppContext>,
    count: usize,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|index| {
            let ctx = Arc::clone(&ctx);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let worker_id = WorkerId::new();
                info!(worker = %worker_id, index, "worker started");
                run_worker(&ctx, worker_id, &shutdown).await;
                info!(worker = %worker_id, index, "worker stopped");
            })
        })
        .collect()
}

async fn run_worker(ctx: &AppContext, worker_id: WorkerId, shutdown: &CancellationToken) {
    loop {
        if shutdown.is_cancelled() {
            break;
        }
        match ctx.queue.claim(worker_id, 1).await {
            Ok(jobs) if !jobs.is_empty() => {
                for job in jobs {
                    info!(worker = %worker_id, job_id = %job.id, "executing job");
                    if let Err(e) = ctx.orchestrator.execute(&job, worker_id).await {
                        error!(worker = %worker_id, job_id = %job.id, error = %e, "job execution could not be reported");
                    }
                }
            }
            Ok(_) => {
                // Jittered idle wait so a worker fleet does not poll in
                // lockstep.
                let jitter = rand::rng().random_range(0..POLL_INTERVAL.as_millis() as u64 / 2);
                let wait = POLL_INTERVAL + Duration::from_millis(jitter);
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(wait) => {}
                }
            }
            Err(e) => {
                warn!(worker = %worker_id, error = %e, "claim failed");
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(POLL_INTERVAL) => {}
                }
            }
        }
    }
}
