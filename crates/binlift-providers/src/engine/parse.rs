//! Parsers for radare2's JSON command outputs.
//!
//! The function start address comes from `offset`, the field radare2
//! documents as the canonical function start in `aflj` output. Output from
//! old builds sometimes carries extra fields; everything unknown is ignored.

use std::collections::{BTreeMap, HashMap, HashSet};

use binlift_domain::entities::{FunctionRecord, ImportRecord, StringRecord};
use binlift_domain::error::{Error, Result};
use binlift_domain::value_objects::FunctionAddress;
use serde::Deserialize;

/// One `aflj` entry.
#[derive(Debug, Deserialize)]
pub(crate) struct AflEntry {
    pub name: String,
    /// Canonical function start address.
    pub offset: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub callrefs: Vec<CodeRef>,
}

/// One cross-reference inside an `aflj`/`axtj` entry.
#[derive(Debug, Deserialize)]
pub(crate) struct CodeRef {
    pub addr: u64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// `pdfj` output: per-instruction listing of one function.
#[derive(Debug, Deserialize)]
pub(crate) struct PdfOutput {
    #[serde(default)]
    pub ops: Vec<PdfOp>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PdfOp {
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub disasm: Option<String>,
}

/// One `iij` import entry.
#[derive(Debug, Deserialize)]
pub(crate) struct IijEntry {
    pub name: String,
    #[serde(default)]
    pub libname: Option<String>,
    #[serde(default)]
    pub plt: Option<u64>,
    #[serde(default)]
    pub ordinal: Option<u32>,
}

/// One `izj` string entry.
#[derive(Debug, Deserialize)]
pub(crate) struct IzjEntry {
    pub vaddr: u64,
    #[serde(rename = "type", default)]
    pub encoding: String,
    #[serde(default)]
    pub section: Option<String>,
    pub string: String,
}

/// One `axtj` xref-to entry.
#[derive(Debug, Deserialize)]
pub(crate) struct AxtEntry {
    #[serde(default)]
    pub fcn_addr: Option<u64>,
}

/// `ij` binary info.
#[derive(Debug, Deserialize)]
pub(crate) struct IjOutput {
    #[serde(default)]
    pub bin: Option<IjBin>,
    #[serde(default)]
    pub core: Option<IjCore>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IjBin {
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub bits: Option<u32>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IjCore {
    #[serde(default)]
    pub size: Option<u64>,
}

/// One `iej` entry-point record.
#[derive(Debug, Deserialize)]
pub(crate) struct IejEntry {
    #[serde(default)]
    pub vaddr: u64,
}

pub(crate) fn parse_json<T: for<'de> Deserialize<'de>>(raw: &str, cmd: &str) -> Result<T> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::EngineCrashed {
            message: format!("empty output for '{cmd}'"),
        });
    }
    serde_json::from_str(trimmed).map_err(|e| Error::EngineCrashed {
        message: format!("unparseable output for '{cmd}': {e}"),
    })
}

/// Join a `pdfj` listing into the assembly block text.
pub(crate) fn assembly_block(pdf: &PdfOutput) -> String {
    let mut out = String::new();
    for op in &pdf.ops {
        if let Some(disasm) = &op.disasm {
            out.push_str(&format!("{:#010x}  {disasm}\n", op.offset));
        }
    }
    out
}

/// Build closed-graph function records from the raw `aflj` entries and the
/// per-function assembly blocks.
///
/// `calls_to` keeps only CALL-type refs that land on another extracted
/// function; `called_by` is the inversion, so the edge set is closed by
/// construction.
pub(crate) fn build_functions(
    entries: Vec<AflEntry>,
    mut assembly: HashMap<u64, String>,
    entry_points: &HashSet<u64>,
) -> Vec<FunctionRecord> {
    let known: HashSet<u64> = entries.iter().map(|e| e.offset).collect();

    let mut callers: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
    for entry in &entries {
        for r in &entry.callrefs {
            if r.kind.eq_ignore_ascii_case("call") && known.contains(&r.addr) {
                callers.entry(r.addr).or_default().push(entry.offset);
            }
        }
    }

    let mut records: Vec<FunctionRecord> = entries
        .into_iter()
        .map(|entry| {
            let mut calls_to: Vec<FunctionAddress> = entry
                .callrefs
                .iter()
                .filter(|r| r.kind.eq_ignore_ascii_case("call") && known.contains(&r.addr))
                .map(|r| FunctionAddress::new(r.addr))
                .collect();
            calls_to.sort();
            calls_to.dedup();

            let mut called_by: Vec<FunctionAddress> = callers
                .remove(&entry.offset)
                .unwrap_or_default()
                .into_iter()
                .map(FunctionAddress::new)
                .collect();
            called_by.sort();
            called_by.dedup();

            FunctionRecord {
                is_entry: entry_points.contains(&entry.offset),
                is_imported: entry.name.starts_with("sym.imp.") || entry.name.starts_with("loc.imp."),
                assembly_block: assembly.remove(&entry.offset).unwrap_or_default(),
                address: FunctionAddress::new(entry.offset),
                size: entry.size,
                name: entry.name,
                calls_to,
                called_by,
            }
        })
        .collect();
    records.sort_by_key(|r| r.address);
    records
}

/// Build a string record from an `izj` entry and its resolved referencing
/// functions.
pub(crate) fn build_string(entry: IzjEntry, referenced_by: Vec<FunctionAddress>) -> StringRecord {
    StringRecord {
        value: entry.string,
        encoding: if entry.encoding.is_empty() {
            "ascii".to_owned()
        } else {
            entry.encoding
        },
        address: FunctionAddress::new(entry.vaddr),
        section: entry.section,
        referenced_by,
    }
}

pub(crate) fn build_imports(entries: Vec<IijEntry>) -> Vec<ImportRecord> {
    entries
        .into_iter()
        .map(|e| ImportRecord {
            library: e.libname.unwrap_or_default(),
            symbol: e.name,
            address: e.plt.filter(|a| *a != 0).map(FunctionAddress::new),
            ordinal: e.ordinal.filter(|o| *o != 0),
        })
        .collect()
}
