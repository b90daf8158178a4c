//! # Infrastructure Layer
//!
//! Configuration loading, logging, telemetry, the config-driven factory
//! composing the application, and the background runtime (worker pool,
//! janitor, TTL sweeper).
#![allow(missing_docs)]

/// Configuration types, loader and validation
pub mod config;
/// Config-driven composition root
pub mod factory;
/// Tracing initialization
pub mod logging;
/// Background runtime tasks
pub mod runtime;
/// Telemetry sink over tracing
pub mod telemetry;
