//! radare2-backed engine session.
//!
//! # Overview
//! Drives one radare2 child per session over the NUL-framed pipe. The
//! command vocabulary is JSON-only: `aaa` for analysis, `aflj` for the
//! function list, `pdfj @ addr` for disassembly, `iij`/`izj` for imports and
//! strings, `axtj @ addr` for cross-references, `ij`/`iej` for binary info.
//!
//! A session serves exactly one orchestrator invocation and is not
//! reentrant. Once a command times out the child is dead; callers open a
//! fresh session to retry.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use binlift_domain::entities::{BinaryFormat, FunctionRecord, ImportRecord, StringRecord};
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::{BinaryInfo, EngineProvider, EngineSession};
use binlift_domain::value_objects::FunctionAddress;
use tracing::{debug, info};

use super::parse::{
    self, AflEntry, AxtEntry, IejEntry, IijEntry, IjOutput, IzjEntry, PdfOutput,
};
use super::pipe::R2Pipe;

/// Configuration for the radare2 engine.
#[derive(Debug, Clone)]
pub struct Radare2Config {
    /// Path to the radare2 binary.
    pub binary_path: PathBuf,
    /// Timeout for ordinary extraction commands.
    pub command_timeout: Duration,
    /// Timeout for the `aaa` analysis pass (dominant cost on large inputs).
    pub analysis_timeout: Duration,
}

impl Default for Radare2Config {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("r2"),
            command_timeout: Duration::from_secs(60),
            analysis_timeout: Duration::from_secs(
                binlift_domain::constants::limits::DEFAULT_ENGINE_TIMEOUT_SECS,
            ),
        }
    }
}

/// Factory for radare2 sessions.
pub struct Radare2EngineProvider {
    config: Radare2Config,
}

impl Radare2EngineProvider {
    /// Create a provider with the given configuration.
    #[must_use]
    pub fn new(config: Radare2Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineProvider for Radare2EngineProvider {
    async fn open(&self, path: &Path) -> Result<Box<dyn EngineSession>> {
        let pipe = R2Pipe::spawn(
            &self.config.binary_path,
            path,
            self.config.command_timeout,
        )
        .await?;
        info!(target_path = %path.display(), "engine session opened");
        Ok(Box::new(Radare2Session {
            pipe: Some(pipe),
            config: self.config.clone(),
            analyzed: false,
        }))
    }
}

/// One live radare2 session.
pub struct Radare2Session {
    pipe: Option<R2Pipe>,
    config: Radare2Config,
    analyzed: bool,
}

impl Radare2Session {
    fn pipe(&mut self) -> Result<&mut R2Pipe> {
        self.pipe.as_mut().ok_or_else(|| Error::EngineCrashed {
            message: "session already closed".to_owned(),
        })
    }

    async fn command(&mut self, cmd: &str, timeout: Duration) -> Result<String> {
        let result = self.pipe()?.command(cmd, timeout).await;
        // A timeout kills the child; drop the pipe so later calls fail fast.
        if matches!(result, Err(Error::EngineTimeout { .. } | Error::EngineCrashed { .. })) {
            self.pipe = None;
        }
        result
    }

    async fn entry_points(&mut self) -> Result<HashSet<u64>> {
        let raw = self.command("iej", self.config.command_timeout).await?;
        let entries: Vec<IejEntry> = parse::parse_json(&raw, "iej").unwrap_or_default();
        Ok(entries.into_iter().map(|e| e.vaddr).collect())
    }
}

#[async_trait]
impl EngineSession for Radare2Session {
    async fn analyze(&mut self) -> Result<()> {
        let timeout = self.config.analysis_timeout;
        self.command("aaa", timeout).await?;
        self.analyzed = true;
        Ok(())
    }

    async fn binary_info(&mut self) -> Result<BinaryInfo> {
        let raw = self.command("ij", self.config.command_timeout).await?;
        let info: IjOutput = parse::parse_json(&raw, "ij")?;
        let bin = info.bin.unwrap_or(super::parse::IjBin {
            arch: None,
            bits: None,
            os: None,
            class: None,
        });
        let entry = self.entry_points().await?.into_iter().min();
        let arch = match (bin.arch, bin.bits) {
            (Some(arch), Some(bits)) => format!("{arch}_{bits}"),
            (Some(arch), None) => arch,
            _ => "unknown".to_owned(),
        };
        Ok(BinaryInfo {
            format: bin
                .class
                .as_deref()
                .map(BinaryFormat::from_engine)
                .unwrap_or(BinaryFormat::Unknown),
            architecture: arch,
            platform: bin.os.unwrap_or_else(|| "unknown".to_owned()),
            entry_point: entry.map(FunctionAddress::new),
            size: info.core.and_then(|c| c.size).unwrap_or(0),
        })
    }

    async fn functions(&mut self) -> Result<Vec<FunctionRecord>> {
        if !self.analyzed {
            self.analyze().await?;
        }
        let raw = self.command("aflj", self.config.command_timeout).await?;
        let entries: Vec<AflEntry> = parse::parse_json(&raw, "aflj")?;
        debug!(count = entries.len(), "function list extracted");

        let timeout = self.config.command_timeout;
        let mut assembly: HashMap<u64, String> = HashMap::with_capacity(entries.len());
        for entry in &entries {
            let cmd = format!("pdfj @ {:#x}", entry.offset);
            match self.command(&cmd, timeout).await {
                Ok(raw) => {
                    let pdf: PdfOutput = parse::parse_json(&raw, &cmd).unwrap_or(PdfOutput {
                        ops: Vec::new(),
                    });
                    assembly.insert(entry.offset, parse::assembly_block(&pdf));
                }
                // Individual disassembly failures degrade that function's
                // block to empty; a dead pipe aborts the extraction.
                Err(e @ (Error::EngineTimeout { .. } | Error::EngineCrashed { .. })) => {
                    return Err(e);
                }
                Err(_) => {
                    assembly.insert(entry.offset, String::new());
                }
            }
        }

        let entry_points = self.entry_points().await?;
        Ok(parse::build_functions(entries, assembly, &entry_points))
    }

    async fn imports(&mut self) -> Result<Vec<ImportRecord>> {
        let raw = self.command("iij", self.config.command_timeout).await?;
        let entries: Vec<IijEntry> = parse::parse_json(&raw, "iij").unwrap_or_default();
        Ok(parse::build_imports(entries))
    }

    async fn strings(&mut self) -> Result<Vec<StringRecord>> {
        if !self.analyzed {
            self.analyze().await?;
        }
        let raw = self.command("izj", self.config.command_timeout).await?;
        let entries: Vec<IzjEntry> = parse::parse_json(&raw, "izj").unwrap_or_default();

        let timeout = self.config.command_timeout;
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let cmd = format!("axtj @ {:#x}", entry.vaddr);
            let referenced_by = match self.command(&cmd, timeout).await {
                Ok(raw) => {
                    let refs: Vec<AxtEntry> = parse::parse_json(&raw, &cmd).unwrap_or_default();
                    let mut addrs: Vec<FunctionAddress> = refs
                        .into_iter()
                        .filter_map(|r| r.fcn_addr)
                        .filter(|a| *a != 0)
                        .map(FunctionAddress::new)
                        .collect();
                    addrs.sort();
                    addrs.dedup();
                    addrs
                }
                Err(e @ (Error::EngineTimeout { .. } | Error::EngineCrashed { .. })) => {
                    return Err(e);
                }
                Err(_) => Vec::new(),
            };
            out.push(parse::build_string(entry, referenced_by));
        }
        Ok(out)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(pipe) = self.pipe.take() {
            pipe.shutdown().await;
            info!("engine session closed");
        }
        Ok(())
    }
}
