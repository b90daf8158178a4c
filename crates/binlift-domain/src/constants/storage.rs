//! Blob key layout under the configurable storage root.

/// Prefix for uploaded binaries, keyed by content hash: `uploads/{sha256}`.
pub const UPLOADS_PREFIX: &str = "uploads/";

/// Prefix for decompilation result payloads: `results/decomp/{job_id}.json`.
pub const DECOMP_RESULTS_PREFIX: &str = "results/decomp/";

/// Prefix for translation result payloads: `results/translation/{job_id}.json`.
pub const TRANSLATION_RESULTS_PREFIX: &str = "results/translation/";

/// Prefix for upload session records: `sessions/{session_id}.json`.
pub const SESSIONS_PREFIX: &str = "sessions/";

/// Prefix for per-job scratch space: `tmp/{job_id}/…`.
pub const TMP_PREFIX: &str = "tmp/";

/// Blob key for an uploaded binary.
#[must_use]
pub fn upload_key(sha256: &str) -> String {
    format!("{UPLOADS_PREFIX}{sha256}")
}

/// Blob key for a job's decompilation result payload.
#[must_use]
pub fn decomp_result_key(job_id: &crate::value_objects::JobId) -> String {
    format!("{DECOMP_RESULTS_PREFIX}{job_id}.json")
}

/// Blob key for a job's translation result payload.
#[must_use]
pub fn translation_result_key(job_id: &crate::value_objects::JobId) -> String {
    format!("{TRANSLATION_RESULTS_PREFIX}{job_id}.json")
}

/// Blob key for an upload session record.
#[must_use]
pub fn session_key(session_id: &crate::value_objects::UploadSessionId) -> String {
    format!("{SESSIONS_PREFIX}{session_id}.json")
}
