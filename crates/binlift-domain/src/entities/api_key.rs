//! ApiKey entity: bearer credentials consumed from the external boundary.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An API key as the boundary stores it. The core only reads these rows to
/// resolve owner and tier for admission decisions; issuing and hashing are
/// boundary concerns.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiKey {
    /// Unique identifier (UUID).
    pub id: String,
    /// Owner the key authenticates as.
    pub owner: String,
    /// Rate-limit tier name; resolved against `rate_limit_tiers` config.
    pub tier: String,
    /// Hash of the raw key material (never plaintext).
    pub key_hash: String,
    /// Whether the key is currently usable.
    pub active: bool,
    /// When the key was created (Unix epoch seconds).
    pub created_at: i64,
}
