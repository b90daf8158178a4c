//! Binary artifact entity: the uploaded executable, deduplicated by hash.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::storage::upload_key;

/// Executable container format detected for an artifact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum BinaryFormat {
    /// Windows Portable Executable
    #[display("pe")]
    Pe,
    /// Executable and Linkable Format
    #[display("elf")]
    Elf,
    /// Mach object file
    #[display("mach-o")]
    MachO,
    /// Format the engine could not classify
    #[display("unknown")]
    Unknown,
}

impl BinaryFormat {
    /// Parse the engine's format string (`pe`, `pe32`, `elf`, `elf64`,
    /// `mach0`, …).
    #[must_use]
    pub fn from_engine(s: &str) -> Self {
        let lower = s.to_ascii_lowercase();
        if lower.starts_with("pe") {
            Self::Pe
        } else if lower.starts_with("elf") {
            Self::Elf
        } else if lower.starts_with("mach") {
            Self::MachO
        } else {
            Self::Unknown
        }
    }
}

/// An uploaded executable, identified by its content hash.
///
/// Multiple jobs may reference the same artifact; `ref_count` tracks live
/// references and drives GC once it reaches zero and the grace period has
/// elapsed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BinaryArtifact {
    /// Lowercase hex SHA-256 of the file contents (primary identity).
    pub sha256: String,
    /// File size in bytes.
    pub size: u64,
    /// Detected container format.
    pub format: BinaryFormat,
    /// Detected architecture (engine vocabulary, e.g. `x86`, `arm`).
    pub architecture: String,
    /// Detected platform/OS (engine vocabulary, e.g. `windows`, `linux`).
    pub platform: String,
    /// Blob key under the storage root.
    pub path_in_store: String,
    /// Number of jobs currently referencing this artifact.
    pub ref_count: i64,
    /// When the artifact was first stored (Unix epoch seconds).
    pub created_at: i64,
    /// When `ref_count` last dropped to zero (Unix epoch seconds); GC
    /// eligibility starts a grace period after this.
    pub last_unreferenced_at: Option<i64>,
}

impl BinaryArtifact {
    /// Create a freshly uploaded artifact with one reference.
    #[must_use]
    pub fn new(sha256: String, size: u64, created_at: i64) -> Self {
        let path_in_store = upload_key(&sha256);
        Self {
            sha256,
            size,
            format: BinaryFormat::Unknown,
            architecture: "unknown".to_owned(),
            platform: "unknown".to_owned(),
            path_in_store,
            ref_count: 1,
            created_at,
            last_unreferenced_at: None,
        }
    }
}

/// Compute the lowercase hex SHA-256 content hash of uploaded bytes.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
