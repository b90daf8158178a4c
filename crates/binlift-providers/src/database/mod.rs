//! Structured store providers.

/// `SQLite` backend
pub mod sqlite;
