//! # Domain Layer
//!
//! Core business logic and domain types for binary decompilation and
//! LLM-backed translation. Contains only pure domain entities, value
//! objects, ports and business rules.
#![allow(missing_docs)]
//!
//! ## Architecture
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`entities`] | Core business entities with identity |
//! | [`value_objects`] | Immutable value objects |
//! | [`ports`] | External provider port interfaces |
//! | [`constants`] | Domain constants |
//! | [`error`] | Domain error types |
//! | [`events`] | Telemetry event types |
//!
//! ## Clean Architecture Principles
//!
//! - **Entities** are at the center with business rules
//! - **Value Objects** are immutable and compared by value
//! - **Ports** declare what the outer layers must provide
//! - **Pure business logic**: no infrastructure or application concerns

/// Common macros
#[macro_use]
pub mod macros;

/// Domain-level constants
pub mod constants;
/// Core business entities with identity
pub mod entities;
/// Domain error types
pub mod error;
/// Telemetry event types
pub mod events;
/// External provider port interfaces
pub mod ports;
/// Immutable value objects
pub mod value_objects;

pub use error::{Error, Result};
