//! Background runtime: worker pool, janitor, TTL sweeper.

/// Crash recovery and housekeeping
pub mod janitor;
pub use janitor::spawn_janitor;

/// Result payload TTL sweeping
pub mod sweeper;
pub use sweeper::spawn_sweeper;

/// Job workers
pub mod worker;
pub use worker::spawn_workers;
