//! Upload session intake over the real repositories.

use std::sync::Arc;

use binlift_application::services::{Clock, ManualClock};
use binlift_application::use_cases::{UploadService, UploadServiceConfig};
use binlift_domain::constants::storage::{session_key, upload_key};
use binlift_domain::ports::{
    ArtifactRepository, BlobStore, DatabaseProvider, UploadSessionRepository,
};
use binlift_providers::database::sqlite::{
    SqliteArtifactRepository, SqliteDatabaseProvider, SqliteUploadSessionRepository,
};
use binlift_providers::storage::FilesystemBlobStore;

struct Harness {
    service: UploadService,
    sessions: Arc<SqliteUploadSessionRepository>,
    artifacts: Arc<SqliteArtifactRepository>,
    blobs: Arc<FilesystemBlobStore>,
    clock: Arc<ManualClock>,
    _dir: tempfile::TempDir,
}

async fn harness(max_file_size: u64) -> Harness {
    let executor = SqliteDatabaseProvider
        .connect_in_memory()
        .await
        .expect("in-memory store");
    let dir = tempfile::tempdir().expect("tempdir");
    let blobs = Arc::new(FilesystemBlobStore::new(dir.path()));
    let sessions = Arc::new(SqliteUploadSessionRepository::new(Arc::clone(&executor)));
    let artifacts = Arc::new(SqliteArtifactRepository::new(executor));
    let clock = ManualClock::at(10_000);
    let service = UploadService::new(
        Arc::clone(&sessions) as Arc<dyn UploadSessionRepository>,
        Arc::clone(&artifacts) as Arc<dyn ArtifactRepository>,
        Arc::clone(&blobs) as Arc<dyn BlobStore>,
        clock.clone() as Arc<dyn Clock>,
        UploadServiceConfig {
            session_ttl_secs: 600,
            max_file_size_bytes: max_file_size,
        },
    );
    Harness {
        service,
        sessions,
        artifacts,
        blobs,
        clock,
        _dir: dir,
    }
}

#[tokio::test]
async fn accepted_uploads_are_stored_and_unreferenced() {
    let h = harness(1024).await;
    let session = h.service.open_session("u1").await.unwrap();
    assert!(h.blobs.exists(&session_key(&session.id)).await.unwrap());

    let sha256 = h
        .service
        .accept(&session.id, &[0x4d, 0x5a, 0x90, 0x00])
        .await
        .unwrap();
    assert!(h.blobs.exists(&upload_key(&sha256)).await.unwrap());

    let artifact = h.artifacts.get(&sha256).await.unwrap().expect("artifact row");
    assert_eq!(artifact.ref_count, 0);
    assert_eq!(artifact.last_unreferenced_at, Some(10_000));

    let stored = h.sessions.get(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.accepted_file_refs, vec![sha256]);
}

#[tokio::test]
async fn size_ceiling_is_exact() {
    let h = harness(8).await;
    let session = h.service.open_session("u1").await.unwrap();
    assert!(h.service.accept(&session.id, &[0u8; 8]).await.is_ok());
    let err = h.service.accept(&session.id, &[0u8; 9]).await.unwrap_err();
    assert_eq!(err.code(), "validation_error");
}

#[tokio::test]
async fn expired_sessions_stop_accepting() {
    let h = harness(1024).await;
    let session = h.service.open_session("u1").await.unwrap();
    h.clock.advance(601);
    let err = h.service.accept(&session.id, &[1, 2, 3]).await.unwrap_err();
    assert_eq!(err.code(), "validation_error");
}

#[tokio::test]
async fn duplicate_content_is_deduplicated() {
    let h = harness(1024).await;
    let session = h.service.open_session("u1").await.unwrap();
    let first = h.service.accept(&session.id, &[9, 9, 9]).await.unwrap();
    let second = h.service.accept(&session.id, &[9, 9, 9]).await.unwrap();
    assert_eq!(first, second);

    let artifact = h.artifacts.get(&first).await.unwrap().unwrap();
    assert_eq!(artifact.ref_count, 0);
}
