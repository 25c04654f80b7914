//! frostbox configuration.
//!
//! Configuration is stored as TOML, at `$FROSTBOX_CONFIG` if set, otherwise:
//! - Linux: `~/.config/frostbox/config.toml`
//! - Windows: `%APPDATA%/frostbox/config.toml`
//!
//! A missing file means defaults; it is never written back.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "FROSTBOX_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Credential file (TOML, one table per account).
    #[serde(default = "default_credentials")]
    pub credentials: PathBuf,

    /// Account profile in the credential file.
    #[serde(default = "default_account")]
    pub account: String,

    /// Archive ledger (YAML).
    #[serde(default = "default_ledger")]
    pub ledger: PathBuf,

    /// Multipart part size, e.g. `64M`.
    #[serde(default = "default_part_size")]
    pub part_size: String,

    /// Abort the remote multipart upload when an upload fails.
    #[serde(default = "default_true")]
    pub abort_on_failure: bool,

    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Service endpoint override, e.g. `http://127.0.0.1:9000`.
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_credentials() -> PathBuf {
    config_dir().join("credentials.toml")
}

fn default_account() -> String {
    "default".into()
}

fn default_ledger() -> PathBuf {
    config_dir().join("ledger.yaml")
}

fn default_part_size() -> String {
    "64M".into()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: default_credentials(),
            account: default_account(),
            ledger: default_ledger(),
            part_size: default_part_size(),
            abort_on_failure: default_true(),
            log_level: default_log_level(),
            endpoint: None,
        }
    }
}

impl Config {
    /// Loads configuration from `$FROSTBOX_CONFIG` or the platform path.
    pub fn load() -> anyhow::Result<Self> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => config_dir().join("config.toml"),
        };
        Self::load_from(&path)
    }

    /// Loads configuration from `path`, falling back to defaults if absent.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }
}

/// Returns the platform-specific configuration directory.
fn config_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("frostbox")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config").join("frostbox")
    }
}
