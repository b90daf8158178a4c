//! Decompilation result entities: structured output of one engine session.

use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::limits::MAX_ZERO_ADDRESS_FRACTION;
use crate::entities::artifact::BinaryFormat;
use crate::error::{Error, Result};
use crate::value_objects::{FunctionAddress, JobId};

/// One extracted function with its disassembly and call-graph edges.
///
/// `address` is the canonical identity; `calls_to`/`called_by` reference
/// other function addresses in the same result and the graph must be closed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FunctionRecord {
    /// Function name as reported by the engine (possibly synthetic `fcn.…`).
    pub name: String,
    /// Canonical start address.
    pub address: FunctionAddress,
    /// Size in bytes.
    pub size: u64,
    /// Full disassembly text for the function body.
    pub assembly_block: String,
    /// Addresses of functions this function calls.
    pub calls_to: Vec<FunctionAddress>,
    /// Addresses of functions that call this function.
    pub called_by: Vec<FunctionAddress>,
    /// Whether this is the program entry point.
    pub is_entry: bool,
    /// Whether this is an import thunk rather than local code.
    pub is_imported: bool,
}

/// One import table entry.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImportRecord {
    /// Providing library (e.g. `kernel32.dll`, `libc.so.6`).
    pub library: String,
    /// Imported symbol name.
    pub symbol: String,
    /// PLT/IAT address, when the engine resolves one.
    pub address: Option<FunctionAddress>,
    /// Import ordinal, for by-ordinal PE imports.
    pub ordinal: Option<u32>,
}

/// One extracted string with its location and usage context.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StringRecord {
    /// Decoded string value.
    pub value: String,
    /// Encoding as reported by the engine (`ascii`, `utf8`, `utf16le`, …).
    pub encoding: String,
    /// Address of the string data.
    pub address: FunctionAddress,
    /// Containing section name, when known.
    pub section: Option<String>,
    /// Addresses of functions that reference this string.
    pub referenced_by: Vec<FunctionAddress>,
}

/// Metadata describing the analyzed binary and the extraction run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DecompilationMetadata {
    /// Content hash of the analyzed artifact.
    pub sha256: String,
    /// Detected container format.
    pub format: BinaryFormat,
    /// Detected architecture.
    pub architecture: String,
    /// Detected platform.
    pub platform: String,
    /// Number of functions extracted.
    pub function_count: usize,
    /// Number of import entries extracted.
    pub import_count: usize,
    /// Number of strings extracted.
    pub string_count: usize,
    /// Wall-clock extraction duration in milliseconds.
    pub duration_ms: u64,
}

/// Terminal status of an extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecompilationStatus {
    /// All extraction passes succeeded.
    Completed,
    /// Extraction succeeded with non-fatal per-item errors.
    Partial,
}

/// Structured output of the reverse-engineering session for one artifact.
///
/// Immutable once written; stored as a blob payload under
/// `results/decomp/{job_id}.json`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DecompilationResult {
    /// Job this result belongs to.
    pub job_id: JobId,
    /// Binary and extraction-run metadata.
    pub metadata: DecompilationMetadata,
    /// Extracted functions, ordered by address ascending.
    pub functions: Vec<FunctionRecord>,
    /// Extracted import table.
    pub imports: Vec<ImportRecord>,
    /// Extracted strings.
    pub strings: Vec<StringRecord>,
    /// Extraction status.
    pub status: DecompilationStatus,
    /// Non-fatal errors encountered during extraction.
    pub errors: Vec<String>,
}

impl DecompilationResult {
    /// Validate the result against the extraction invariants.
    ///
    /// Rejects results where more than [`MAX_ZERO_ADDRESS_FRACTION`] of
    /// functions collapsed to address zero (the historical symptom of
    /// reading the wrong engine field), and results whose call graph
    /// references addresses absent from the function set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineExtractionInvalid`] when an invariant fails.
    pub fn validate(&self) -> Result<()> {
        if !self.functions.is_empty() {
            let zero = self
                .functions
                .iter()
                .filter(|f| f.address.is_zero())
                .count();
            let fraction = zero as f64 / self.functions.len() as f64;
            if zero > 1 && fraction > MAX_ZERO_ADDRESS_FRACTION {
                return Err(Error::EngineExtractionInvalid {
                    message: format!(
                        "{zero} of {} functions report address 0x0",
                        self.functions.len()
                    ),
                });
            }
        }

        let known: HashSet<FunctionAddress> =
            self.functions.iter().map(|f| f.address).collect();
        for func in &self.functions {
            for edge in func.calls_to.iter().chain(func.called_by.iter()) {
                if !known.contains(edge) {
                    return Err(Error::EngineExtractionInvalid {
                        message: format!(
                            "function {} references unknown address {edge}",
                            func.address
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}
