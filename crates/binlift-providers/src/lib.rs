//! # Providers Layer
//!
//! Concrete implementations of the domain ports: the `SQLite` structured
//! store, the filesystem blob store, the LLM provider HTTP clients and the
//! radare2 engine session.
//!
//! Everything here is constructed by the infrastructure factory; application
//! code sees only the port traits.
#![allow(missing_docs)]

/// Structured store providers
pub mod database;
/// Reverse-engineering engine providers
pub mod engine;
/// LLM provider implementations
pub mod llm;
/// Blob store providers
pub mod storage;
