//! Storage ports: blob store and driver-agnostic SQL execution.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

// ============================================================================
// Blob store
// ============================================================================

/// Content-addressed blob store.
///
/// Writes are atomic (temp-and-rename or equivalent); a partial write is
/// never observable. Keys follow the layout in
/// [`crate::constants::storage`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `key`, replacing any existing blob.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read the blob at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::NotFound`] when absent.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Whether a blob exists at `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete the blob at `key`. Deleting an absent key is a no-op.
    async fn delete(&self, key: &str) -> Result<()>;

    /// List keys under `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

// ============================================================================
// Structured store
// ============================================================================

/// Parameter for prepared statement binding (driver-agnostic).
#[derive(Debug, Clone)]
pub enum SqlParam {
    /// String value
    String(String),
    /// 64-bit integer
    I64(i64),
    /// 64-bit float (costs, quality scores)
    F64(f64),
    /// Null
    Null,
}

/// Abstraction for a single query result row.
///
/// Implementations wrap driver-specific rows and expose values by column
/// name so repository code can map to domain entities without depending on
/// the driver.
pub trait SqlRow: Send + Sync {
    /// Try to get a string by column name.
    fn try_get_string(&self, name: &str) -> Result<Option<String>>;

    /// Try to get an i64 by column name.
    fn try_get_i64(&self, name: &str) -> Result<Option<i64>>;

    /// Try to get an f64 by column name.
    fn try_get_f64(&self, name: &str) -> Result<Option<f64>>;
}

/// Port for executing SQL (infrastructure capability).
///
/// Repositories depend on this trait; they do not hold pools or use driver
/// types directly. `execute` reports the number of affected rows so callers
/// can build conditional-update primitives (claim, transition) and detect
/// lost races.
#[async_trait]
pub trait DatabaseExecutor: Send + Sync {
    /// Execute a statement, returning the number of affected rows.
    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64>;

    /// Fetch at most one row.
    async fn query_one(&self, sql: &str, params: &[SqlParam]) -> Result<Option<Arc<dyn SqlRow>>>;

    /// Fetch all rows.
    async fn query_all(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Arc<dyn SqlRow>>>;
}

/// Provider factory for database connections with schema initialization.
#[async_trait]
pub trait DatabaseProvider: Send + Sync {
    /// Connect to the store at `url`, applying DDL on first use.
    async fn connect(&self, url: &str) -> Result<Arc<dyn DatabaseExecutor>>;

    /// Connect to a fresh in-memory store (tests, local runs).
    async fn connect_in_memory(&self) -> Result<Arc<dyn DatabaseExecutor>>;
}
