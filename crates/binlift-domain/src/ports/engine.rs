//! Reverse-engineering engine ports.
//!
//! Wraps a native disassembler driven over a subprocess pipe. A session is
//! bound to one binary and one orchestrator invocation; it is not reentrant,
//! and every address it reports shares one address-space interpretation.

use std::path::Path;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::{BinaryFormat, FunctionRecord, ImportRecord, StringRecord};
use crate::error::Result;
use crate::value_objects::FunctionAddress;

/// Identity of the analyzed binary as the engine reports it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BinaryInfo {
    /// Container format.
    pub format: BinaryFormat,
    /// Architecture (engine vocabulary).
    pub architecture: String,
    /// Platform/OS (engine vocabulary).
    pub platform: String,
    /// Program entry point, when the engine resolves one.
    pub entry_point: Option<FunctionAddress>,
    /// File size in bytes.
    pub size: u64,
}

/// One live engine session over an opened binary.
///
/// Callers run `analyze` first; the extraction methods reflect whatever the
/// analysis passes discovered. Timeouts kill the child process and surface
/// [`crate::error::Error::EngineTimeout`]; abnormal exits surface
/// [`crate::error::Error::EngineCrashed`].
#[async_trait]
pub trait EngineSession: Send {
    /// Run the engine's analysis passes (functions, xrefs, strings).
    async fn analyze(&mut self) -> Result<()>;

    /// Format/architecture/platform of the opened binary.
    async fn binary_info(&mut self) -> Result<BinaryInfo>;

    /// Extract all functions with disassembly and call-graph edges.
    async fn functions(&mut self) -> Result<Vec<FunctionRecord>>;

    /// Extract the import table.
    async fn imports(&mut self) -> Result<Vec<ImportRecord>>;

    /// Extract strings with encoding, location and referencing functions.
    async fn strings(&mut self) -> Result<Vec<StringRecord>>;

    /// Release the engine process. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for engine sessions.
#[async_trait]
pub trait EngineProvider: Send + Sync {
    /// Open a session over the binary at `path`.
    async fn open(&self, path: &Path) -> Result<Box<dyn EngineSession>>;
}
