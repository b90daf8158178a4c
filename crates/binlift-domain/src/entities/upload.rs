//! Upload session entity.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::value_objects::UploadSessionId;

/// A bounded window during which a client may hand over binaries.
///
/// Destroyed on expiry; artifacts it accepted become GC-eligible once no job
/// references them and the grace period has elapsed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UploadSession {
    /// Unique identifier.
    pub id: UploadSessionId,
    /// Owner the session belongs to.
    pub owner: String,
    /// When the session was opened (Unix epoch seconds).
    pub created_at: i64,
    /// When the session stops accepting uploads (Unix epoch seconds).
    pub expires_at: i64,
    /// Content hashes accepted during this session.
    pub accepted_file_refs: Vec<String>,
}

impl UploadSession {
    /// Whether the session is past its expiry.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}
