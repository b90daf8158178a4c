//! Logging initialization: tracing-subscriber configured from
//! [`LoggingConfig`](crate::config::LoggingSection).

use binlift_domain::error::{Error, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSection;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level so operators can raise
/// verbosity per-module without touching config files.
///
/// # Errors
///
/// Returns a configuration error when a subscriber is already installed.
pub fn init(config: &LoggingSection) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let result = if config.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };
    result.map_err(|e| Error::config(format!("install tracing subscriber: {e}")))
}
