//! Janitor crash recovery and housekeeping.

use std::sync::Arc;

use binlift_domain::constants::storage::{session_key, upload_key};
use binlift_domain::entities::{BinaryArtifact, FileRef, JobSpec, JobStatus, UploadSession};
use binlift_domain::value_objects::{UploadSessionId, WorkerId};
use binlift_infrastructure::config::AppConfig;
use binlift_infrastructure::factory::{AppContext, build_context};
use binlift_infrastructure::runtime::janitor;

async fn context() -> (Arc<AppContext>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let yaml = format!(
        r"
storage_root: {root}
structured_store_url: 'sqlite:{root}/store.db'
",
        root = dir.path().display()
    );
    let config: AppConfig = serde_yaml::from_str(&yaml).expect("config");
    let ctx = build_context(config).await.expect("context");
    (Arc::new(ctx), dir)
}

fn spec(owner: &str) -> JobSpec {
    JobSpec {
        owner: owner.to_owned(),
        file_ref: FileRef::Inline {
            bytes: vec![0x4d, 0x5a],
            filename: None,
        },
        translation: None,
        priority: 0,
        idempotency_key: None,
    }
}

#[tokio::test]
async fn expired_leases_are_returned_to_the_queue() {
    let (ctx, _dir) = context().await;
    let job_id = ctx.queue.submit(spec("u1")).await.unwrap();
    let now = ctx.clock.now();

    // A worker that claimed and then died: the lease is already stale.
    let dead_worker = WorkerId::new();
    assert!(ctx
        .jobs
        .try_claim(&job_id, &dead_worker, now - 500, now - 100)
        .await
        .unwrap());

    janitor::pass(&ctx).await.unwrap();

    let job = ctx.queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempts, 1);
    assert!(job.worker_id.is_none());
    assert_eq!(job.error.unwrap().code, "worker_lease_expired");
}

#[tokio::test]
async fn jobs_past_the_wall_clock_limit_are_failed() {
    let (ctx, _dir) = context().await;
    let job_id = ctx.queue.submit(spec("u1")).await.unwrap();
    let now = ctx.clock.now();

    // Started far in the past but still heartbeating (live lease).
    let worker = WorkerId::new();
    let started = now - ctx.config.job_timeout_seconds as i64 - 10;
    assert!(ctx
        .jobs
        .try_claim(&job_id, &worker, started, now + 300)
        .await
        .unwrap());

    janitor::pass(&ctx).await.unwrap();

    let job = ctx.queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.unwrap().code, "job_timeout");
}

#[tokio::test]
async fn expired_upload_sessions_are_removed() {
    let (ctx, _dir) = context().await;
    let now = ctx.clock.now();
    let session = UploadSession {
        id: UploadSessionId::new(),
        owner: "u1".to_owned(),
        created_at: now - 7200,
        expires_at: now - 3600,
        accepted_file_refs: Vec::new(),
    };
    ctx.upload_sessions.insert(&session).await.unwrap();
    ctx.blobs
        .put(&session_key(&session.id), b"{}")
        .await
        .unwrap();

    janitor::pass(&ctx).await.unwrap();

    assert!(ctx.upload_sessions.get(&session.id).await.unwrap().is_none());
    assert!(!ctx.blobs.exists(&session_key(&session.id)).await.unwrap());
}

#[tokio::test]
async fn unreferenced_artifacts_are_collected_after_the_grace_period() {
    let (ctx, _dir) = context().await;
    let now = ctx.clock.now();

    let stale = BinaryArtifact::new("aa".repeat(32), 128, now - 7200);
    ctx.blobs.put(&upload_key(&stale.sha256), b"MZ").await.unwrap();
    ctx.artifacts
        .insert_unreferenced(&stale, now - 7200)
        .await
        .unwrap();

    let fresh = BinaryArtifact::new("bb".repeat(32), 128, now);
    ctx.blobs.put(&upload_key(&fresh.sha256), b"MZ").await.unwrap();
    ctx.artifacts.insert_unreferenced(&fresh, now).await.unwrap();

    janitor::pass(&ctx).await.unwrap();

    assert!(ctx.artifacts.get(&stale.sha256).await.unwrap().is_none());
    assert!(!ctx.blobs.exists(&upload_key(&stale.sha256)).await.unwrap());
    // Inside the grace period: untouched.
    assert!(ctx.artifacts.get(&fresh.sha256).await.unwrap().is_some());
    assert!(ctx.blobs.exists(&upload_key(&fresh.sha256)).await.unwrap());
}
