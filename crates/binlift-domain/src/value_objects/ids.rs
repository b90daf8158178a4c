//! Strong-typed UUID identifiers for all domain entities.

define_id!(JobId, "Strong typed identifier for a decompilation job");
define_id!(WorkerId, "Strong typed identifier for a worker process");
define_id!(
    UploadSessionId,
    "Strong typed identifier for an upload session"
);
define_id!(ApiKeyId, "Strong typed identifier for an API key");
