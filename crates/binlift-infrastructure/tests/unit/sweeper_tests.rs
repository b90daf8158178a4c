//! Sweeper behaviour over a composed context.

use std::sync::Arc;

use binlift_domain::constants::storage::{decomp_result_key, upload_key};
use binlift_domain::entities::{FileRef, JobSpec};
use binlift_domain::value_objects::{JobId, WorkerId};
use binlift_infrastructure::config::AppConfig;
use binlift_infrastructure::factory::{AppContext, build_context};
use binlift_infrastructure::runtime::sweeper;

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
            bytes: vec![0x7f, 0x45, 0x4c, 0x46],
            filename: None,
        },
        translation: None,
        priority: 0,
        idempotency_key: None,
    }
}

#[tokio::test]
async fn orphaned_result_blobs_are_collected() {
    let (ctx, _dir) = context().await;
    // A result blob with no job row: the residue of a crash between the
    // blob write and the row update.
    let orphan = decomp_result_key(&JobId::new());
    ctx.blobs.put(&orphan, b"{}").await.unwrap();

    // A live job's payload must survive the same pass.
    let job_id = ctx.queue.submit(spec("u1")).await.unwrap();
    let live = decomp_result_key(&job_id);
    ctx.blobs.put(&live, b"{}").await.unwrap();

    sweeper::pass(&ctx).await.unwrap();

    assert!(!ctx.blobs.exists(&orphan).await.unwrap());
    assert!(ctx.blobs.exists(&live).await.unwrap());
}

#[tokio::test]
async fn fresh_results_are_not_swept() {
    let (ctx, _dir) = context().await;
    let job_id = ctx.queue.submit(spec("u1")).await.unwrap();
    let worker = WorkerId::new();
    ctx.queue.claim(worker, 1).await.unwrap();

    let key = decomp_result_key(&job_id);
    ctx.blobs.put(&key, b"{}").await.unwrap();
    ctx.queue.complete(job_id, worker, &key).await.unwrap();

    sweeper::pass(&ctx).await.unwrap();

    let job = ctx.queue.get(job_id).await.unwrap().unwrap();
    assert!(job.result_present);
    assert!(ctx.blobs.exists(&key).await.unwrap());
}

#[tokio::test]
async fn swept_results_read_back_as_expired() {
    let (ctx, _dir) = context().await;
    let job_id = ctx.queue.submit(spec("u1")).await.unwrap();
    let worker = WorkerId::new();
    ctx.queue.claim(worker, 1).await.unwrap();
    let key = decomp_result_key(&job_id);
    ctx.blobs.put(&key, b"{}").await.unwrap();
    ctx.queue.complete(job_id, worker, &key).await.unwrap();

    // What a TTL sweep does: blob first, then the metadata flag.
    ctx.blobs.delete(&key).await.unwrap();
    ctx.jobs.clear_result_present(&job_id).await.unwrap();

    let err = ctx.results.decompilation(job_id).await.unwrap_err();
    assert_eq!(err.code(), "expired");
    // The job row itself stays queryable for audit.
    let job = ctx.results.job(job_id).await.unwrap();
    assert!(!job.result_present);

    // This job never requested translation, so that payload was never
    // present to expire.
    let missing = ctx.results.translation(job_id).await.unwrap_err();
    assert_eq!(missing.code(), "not_found");
}

#[tokio::test]
async fn uploads_survive_result_sweeps() {
    let (ctx, _dir) = context().await;
    let job_id = ctx.queue.submit(spec("u1")).await.unwrap();
    let job = ctx.queue.get(job_id).await.unwrap().unwrap();

    sweeper::pass(&ctx).await.unwrap();
    assert!(ctx.blobs.exists(&upload_key(&job.file_sha256)).await.unwrap());
}
