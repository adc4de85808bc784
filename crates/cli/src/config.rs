//! CLI configuration

use anyhow::{Context, Result};
use directories::ProjectDirs;
use pesa_http::ApiConfig;
use pesa_session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory
pub const STATE_DIR_ENV: &str = "PESA_STATE_DIR";

/// File holding the persisted token pair, inside the data directory
pub const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub data_dir: Option<PathBuf>,
}

impl CliConfig {
    /// Load configuration: defaults, then the optional file, then `PESA__*`
    /// environment variables (e.g. `PESA__API__BASE_URL`)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("api.base_url", defaults.api.base_url)?
            .set_default("api.timeout_secs", defaults.api.timeout_secs)?
            .set_default("api.login_path", defaults.api.login_path)?
            .set_default("api.refresh_path", defaults.api.refresh_path)?
            .set_default("api.user_agent", defaults.api.user_agent)?
            .set_default("session.refresh_margin_ms", defaults.session.refresh_margin_ms)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("PESA")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to load configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}

/// Pick the data directory: flag, then `PESA_STATE_DIR`, then the config
/// file, then the platform data directory
pub fn resolve_data_dir(flag: Option<PathBuf>, configured: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os(STATE_DIR_ENV).map(PathBuf::from))
        .or(configured)
        .unwrap_or_else(default_data_dir)
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("com", "Pesa", "pesa").map_or_else(
        || PathBuf::from(".pesa"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}
