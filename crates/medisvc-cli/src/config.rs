use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use medisvc_auth::AuthConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_FILE: &str = "medisvc.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn redacted(&self) -> Self {
        Self {
            auth: self.auth.redacted(),
            logging: self.logging.clone(),
        }
    }
}

/// Merges the config file (if any) with `MEDISVC__*` environment overrides,
/// e.g. `MEDISVC__AUTH__SIGNING__SECRET`. Validation is left to the caller.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut builder = Config::builder();
    match path {
        Some(p) => {
            if !p.exists() {
                anyhow::bail!("config file not found: {}", p.display());
            }
            builder = builder.add_source(File::from(p.to_path_buf()));
        }
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                builder = builder.add_source(File::from(default_path));
            }
        }
    }
    builder = builder.add_source(
        Environment::with_prefix("MEDISVC")
            .try_parsing(true)
            .separator("__"),
    );

    let merged = builder.build().context("config build error")?;
    merged
        .try_deserialize()
        .context("config deserialize error")
}

/// Loads and validates; every command that touches keys or hashes goes through here.
pub fn load_validated(path: Option<&Path>) -> Result<AppConfig> {
    let cfg = load_config(path)?;
    cfg.auth.validate().context("invalid auth configuration")?;
    Ok(cfg)
}
