//! Filesystem blob store behaviour.

use binlift_domain::ports::BlobStore;
use binlift_providers::storage::FilesystemBlobStore;

fn store() -> (tempfile::TempDir, FilesystemBlobStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FilesystemBlobStore::new(dir.path());
    (dir, store)
}

#[tokio::test]
async fn put_get_round_trip() {
    let (_dir, store) = store();
    store
        .put("results/decomp/job-1.json", b"{\"functions\":[]}")
        .await
        .unwrap();
    assert!(store.exists("results/decomp/job-1.json").await.unwrap());
    let bytes = store.get("results/decomp/job-1.json").await.unwrap();
    assert_eq!(bytes, b"{\"functions\":[]}");
}

#[tokio::test]
async fn get_of_missing_key_is_not_found() {
    let (_dir, store) = store();
    let err = store.get("uploads/absent").await.unwrap_err();
    assert_eq!(err.code(), "not_found");
    assert!(!store.exists("uploads/absent").await.unwrap());
}

#[tokio::test]
async fn overwrite_replaces_atomically() {
    let (_dir, store) = store();
    store.put("uploads/abc", b"one").await.unwrap();
    store.put("uploads/abc", b"two").await.unwrap();
    assert_eq!(store.get("uploads/abc").await.unwrap(), b"two");
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (_dir, store) = store();
    store.put("tmp/j/scratch", b"x").await.unwrap();
    store.delete("tmp/j/scratch").await.unwrap();
    store.delete("tmp/j/scratch").await.unwrap();
    assert!(!store.exists("tmp/j/scratch").await.unwrap());
}

#[tokio::test]
async fn list_returns_keys_under_prefix_only() {
    let (_dir, store) = store();
    store.put("results/decomp/a.json", b"1").await.unwrap();
    store.put("results/decomp/b.json", b"2").await.unwrap();
    store.put("results/translation/a.json", b"3").await.unwrap();
    store.put("uploads/ff00", b"4").await.unwrap();

    let keys = store.list("results/decomp").await.unwrap();
    assert_eq!(keys, vec!["results/decomp/a.json", "results/decomp/b.json"]);
    let all_results = store.list("results").await.unwrap();
    assert_eq!(all_results.len(), 3);
    assert!(store.list("sessions").await.unwrap().is_empty());
}

#[tokio::test]
async fn traversal_keys_are_rejected() {
    let (_dir, store) = store();
    assert!(store.put("../escape", b"x").await.is_err());
    assert!(store.get("uploads/../../etc/passwd").await.is_err());
}
