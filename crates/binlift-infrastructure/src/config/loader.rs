//! Configuration loader — YAML-based.
//!
//! Loads [`AppConfig`] from YAML configuration files. Application settings
//! live under the `settings:` key in `config/{env}.yaml`; a
//! `config/{env}.local.yaml` beside it wins when present.
//!
//! Environment is resolved from `BINLIFT_ENV` (default: `development`).
//! A handful of deployment-critical values can be overridden through
//! environment variables without editing files.

use std::env;
use std::path::{Path, PathBuf};

use binlift_domain::error::{Error, Result};
use tracing::info;

use super::types::AppConfig;
use super::validation;

/// Environment variable naming the runtime environment.
const ENV_VAR: &str = "BINLIFT_ENV";
/// Environment override for the blob store root.
const STORAGE_ROOT_VAR: &str = "BINLIFT_STORAGE_ROOT";
/// Environment override for the structured store URL.
const STORE_URL_VAR: &str = "BINLIFT_STRUCTURED_STORE_URL";
/// Environment override for the worker count.
const WORKER_COUNT_VAR: &str = "BINLIFT_WORKER_COUNT";

/// Configuration loader service.
#[derive(Clone, Default)]
pub struct ConfigLoader {
    /// Optional explicit config file path (overrides environment resolution)
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set an explicit configuration file path (overrides env-based
    /// resolution).
    #[must_use]
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration from YAML.
    ///
    /// Resolution order:
    /// 1. Explicit path (via `with_config_path`)
    /// 2. `config/{env}.local.yaml` (highest priority override)
    /// 3. `config/{env}.yaml` (standard config)
    ///
    /// # Errors
    ///
    /// Returns an error if no config file is found, parsing fails, or
    /// validation detects invalid values.
    pub fn load(&self) -> Result<AppConfig> {
        let yaml_path = self.find_yaml_config_path()?;
        info!(path = %yaml_path.display(), "configuration loaded");

        let content = std::fs::read_to_string(&yaml_path)
            .map_err(|e| Error::config_with_source("read YAML config file", e))?;
        let yaml: serde_yaml::Value = serde_yaml::from_str(&content)
            .map_err(|e| Error::config_with_source("parse YAML config", e))?;

        let settings = yaml.get("settings").ok_or_else(|| {
            Error::config("no 'settings' key found in YAML configuration file")
        })?;
        let mut app_config: AppConfig = serde_yaml::from_value(settings.clone())
            .map_err(|e| Error::config_with_source("deserialize settings into AppConfig", e))?;

        apply_env_overrides(&mut app_config)?;
        validation::validate(&app_config)?;
        Ok(app_config)
    }

    fn find_yaml_config_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(Error::config(format!(
                "config file '{}' does not exist",
                path.display()
            )));
        }

        let environment = env::var(ENV_VAR).unwrap_or_else(|_| "development".to_owned());
        let local = PathBuf::from(format!("config/{environment}.local.yaml"));
        if local.exists() {
            return Ok(local);
        }
        let standard = PathBuf::from(format!("config/{environment}.yaml"));
        if standard.exists() {
            return Ok(standard);
        }
        Err(Error::config(format!(
            "no config file for environment '{environment}' (looked for {} and {})",
            local.display(),
            standard.display()
        )))
    }
}

fn apply_env_overrides(config: &mut AppConfig) -> Result<()> {
    if let Ok(root) = env::var(STORAGE_ROOT_VAR) {
        config.storage_root = PathBuf::from(root);
    }
    if let Ok(url) = env::var(STORE_URL_VAR) {
        config.structured_store_url = url;
    }
    if let Ok(count) = env::var(WORKER_COUNT_VAR) {
        config.worker_count = count.parse().map_err(|e| {
            Error::config(format!("{WORKER_COUNT_VAR} '{count}' is not a number: {e}"))
        })?;
    }
    Ok(())
}
