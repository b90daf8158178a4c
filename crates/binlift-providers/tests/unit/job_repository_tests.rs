//! Conditional-update semantics of the `SQLite` job repository.

use std::sync::Arc;

use binlift_domain::entities::{FileRef, Job, JobError, JobSpec};
use binlift_domain::ports::{DatabaseProvider, JobRepository};
use binlift_domain::value_objects::{JobId, WorkerId};
use binlift_providers::database::sqlite::{SqliteDatabaseProvider, SqliteJobRepository};

async fn repository() -> SqliteJobRepository {
    let executor = SqliteDatabaseProvider
        .connect_in_memory()
        .await
        .expect("in-memory store");
    SqliteJobRepository::new(executor)
}

fn job(owner: &str, now: i64) -> Job {
    let spec = JobSpec {
        owner: owner.to_owned(),
        file_ref: FileRef::Sha256("ef".repeat(32)),
        translation: None,
        priority: 0,
        idempotency_key: None,
    };
    Job::new(JobId::new(), &spec, "ef".repeat(32), now)
}

fn error(code: &str) -> JobError {
    JobError {
        code: code.to_owned(),
        message: "boom".to_owned(),
        hint: None,
    }
}

#[tokio::test]
async fn insert_and_get_round_trip() {
    let repo = repository().await;
    let job = job("u1", 100);
    repo.insert(&job).await.unwrap();

    let stored = repo.get(&job.id).await.unwrap().expect("job present");
    assert_eq!(stored.owner, "u1");
    assert_eq!(stored.file_sha256, job.file_sha256);
    assert_eq!(stored.status, job.status);
    assert_eq!(stored.visible_at, 100);
    assert!(repo.get(&JobId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn only_one_worker_wins_a_claim() {
    let repo = repository().await;
    let job = job("u1", 100);
    repo.insert(&job).await.unwrap();

    let w1 = WorkerId::new();
    let w2 = WorkerId::new();
    assert!(repo.try_claim(&job.id, &w1, 100, 220).await.unwrap());
    assert!(!repo.try_claim(&job.id, &w2, 100, 220).await.unwrap());

    let stored = repo.get(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.worker_id, Some(w1));
    assert_eq!(stored.claim_expires_at, Some(220));
    assert_eq!(stored.started_at, Some(100));
}

#[tokio::test]
async fn invisible_jobs_cannot_be_claimed() {
    let repo = repository().await;
    let mut j = job("u1", 100);
    j.visible_at = 500;
    repo.insert(&j).await.unwrap();

    assert!(repo.claimable(100, 10).await.unwrap().is_empty());
    assert!(!repo.try_claim(&j.id, &WorkerId::new(), 100, 220).await.unwrap());
    assert_eq!(repo.claimable(500, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn claim_order_is_priority_then_fifo() {
    let repo = repository().await;
    let mut low_old = job("u1", 100);
    low_old.priority = 0;
    let mut high_late = job("u1", 200);
    high_late.priority = 5;
    let mut low_new = job("u1", 300);
    low_new.priority = 0;
    for j in [&low_old, &high_late, &low_new] {
        repo.insert(j).await.unwrap();
    }

    let order: Vec<_> = repo
        .claimable(1000, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    assert_eq!(order, vec![high_late.id, low_old.id, low_new.id]);
}

#[tokio::test]
async fn lease_extension_requires_the_holding_worker() {
    let repo = repository().await;
    let j = job("u1", 100);
    repo.insert(&j).await.unwrap();
    let holder = WorkerId::new();
    repo.try_claim(&j.id, &holder, 100, 220).await.unwrap();

    assert!(repo.try_extend_lease(&j.id, &holder, 0.5, 300).await.unwrap());
    assert!(!repo
        .try_extend_lease(&j.id, &WorkerId::new(), 0.9, 400)
        .await
        .unwrap());

    let stored = repo.get(&j.id).await.unwrap().unwrap();
    assert_eq!(stored.claim_expires_at, Some(300));
    assert!((stored.progress - 0.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn progress_never_moves_backwards() {
    let repo = repository().await;
    let j = job("u1", 100);
    repo.insert(&j).await.unwrap();
    let holder = WorkerId::new();
    repo.try_claim(&j.id, &holder, 100, 220).await.unwrap();

    repo.try_extend_lease(&j.id, &holder, 0.7, 300).await.unwrap();
    repo.try_extend_lease(&j.id, &holder, 0.4, 320).await.unwrap();
    let stored = repo.get(&j.id).await.unwrap().unwrap();
    assert!((stored.progress - 0.7).abs() < f64::EPSILON);
}

#[tokio::test]
async fn cancelled_jobs_reject_completion() {
    let repo = repository().await;
    let j = job("u1", 100);
    repo.insert(&j).await.unwrap();
    let holder = WorkerId::new();
    repo.try_claim(&j.id, &holder, 100, 220).await.unwrap();

    assert!(repo.try_cancel(&j.id, "u1", 150).await.unwrap());
    assert!(!repo.try_complete(&j.id, &holder, 160).await.unwrap());
    assert!(!repo.try_extend_lease(&j.id, &holder, 0.5, 300).await.unwrap());

    let stored = repo.get(&j.id).await.unwrap().unwrap();
    assert_eq!(stored.status.as_str(), "cancelled");
    assert!(stored.worker_id.is_none());
}

#[tokio::test]
async fn cancel_requires_the_owner() {
    let repo = repository().await;
    let j = job("u1", 100);
    repo.insert(&j).await.unwrap();
    assert!(!repo.try_cancel(&j.id, "someone-else", 150).await.unwrap());
    assert!(repo.try_cancel(&j.id, "u1", 150).await.unwrap());
}

#[tokio::test]
async fn requeue_increments_attempts_and_applies_backoff() {
    let repo = repository().await;
    let j = job("u1", 100);
    repo.insert(&j).await.unwrap();
    let holder = WorkerId::new();
    repo.try_claim(&j.id, &holder, 100, 220).await.unwrap();

    assert!(repo
        .try_requeue(&j.id, Some(&holder), 400, &error("engine_timeout"), 150)
        .await
        .unwrap());
    let stored = repo.get(&j.id).await.unwrap().unwrap();
    assert_eq!(stored.status.as_str(), "queued");
    assert_eq!(stored.attempts, 1);
    assert_eq!(stored.visible_at, 400);
    assert!(stored.worker_id.is_none());
    assert_eq!(stored.error.unwrap().code, "engine_timeout");
}

#[tokio::test]
async fn janitor_requeue_only_touches_expired_leases() {
    let repo = repository().await;
    let j = job("u1", 100);
    repo.insert(&j).await.unwrap();
    repo.try_claim(&j.id, &WorkerId::new(), 100, 220).await.unwrap();

    // Lease still live at t=150.
    assert!(!repo
        .try_requeue(&j.id, None, 300, &error("lease_expired"), 150)
        .await
        .unwrap());
    // Expired at t=221.
    assert!(repo
        .try_requeue(&j.id, None, 300, &error("lease_expired"), 221)
        .await
        .unwrap());
}

#[tokio::test]
async fn expired_running_scan_finds_stale_leases() {
    let repo = repository().await;
    let j = job("u1", 100);
    repo.insert(&j).await.unwrap();
    repo.try_claim(&j.id, &WorkerId::new(), 100, 220).await.unwrap();

    assert!(repo.expired_running(200, 10).await.unwrap().is_empty());
    let stale = repo.expired_running(221, 10).await.unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].id, j.id);
}

#[tokio::test]
async fn idempotency_key_lookup() {
    let repo = repository().await;
    let mut j = job("u1", 100);
    j.idempotency_key = Some("req-42".to_owned());
    repo.insert(&j).await.unwrap();

    let found = repo.find_by_idempotency("u1", "req-42").await.unwrap();
    assert_eq!(found.map(|f| f.id), Some(j.id));
    assert!(repo.find_by_idempotency("u2", "req-42").await.unwrap().is_none());
}

#[tokio::test]
async fn sweep_scan_and_result_clear() {
    let repo = repository().await;
    let j = job("u1", 100);
    repo.insert(&j).await.unwrap();
    let holder = WorkerId::new();
    repo.try_claim(&j.id, &holder, 100, 220).await.unwrap();
    assert!(repo.try_complete(&j.id, &holder, 150).await.unwrap());

    let due = repo.completed_before(200, 10).await.unwrap();
    assert_eq!(due.len(), 1);
    assert!(due[0].result_present);

    repo.clear_result_present(&j.id).await.unwrap();
    assert!(repo.completed_before(200, 10).await.unwrap().is_empty());
    let stored = repo.get(&j.id).await.unwrap().unwrap();
    assert!(!stored.result_present);
    assert_eq!(stored.status.as_str(), "completed");
}

#[tokio::test]
async fn active_count_ignores_terminal_jobs() {
    let repo = repository().await;
    let a = job("u1", 100);
    let b = job("u1", 101);
    repo.insert(&a).await.unwrap();
    repo.insert(&b).await.unwrap();
    assert_eq!(repo.count_active_for_owner("u1").await.unwrap(), 2);

    repo.try_cancel(&a.id, "u1", 150).await.unwrap();
    assert_eq!(repo.count_active_for_owner("u1").await.unwrap(), 1);
    assert_eq!(repo.count_active_for_owner("u2").await.unwrap(), 0);
}

#[tokio::test]
async fn executor_is_shareable_across_repositories() {
    let executor = SqliteDatabaseProvider
        .connect_in_memory()
        .await
        .expect("in-memory store");
    let repo_a = SqliteJobRepository::new(Arc::clone(&executor));
    let repo_b = SqliteJobRepository::new(executor);

    let j = job("u1", 100);
    repo_a.insert(&j).await.unwrap();
    assert!(repo_b.get(&j.id).await.unwrap().is_some());
}
