//! Configuration for the `dump` harness.
//!
//! Mirrors the teacher's `config.rs`/`config_file.rs` split: a plain struct
//! with sane defaults, loadable from a TOML file, with graceful fallback to
//! `DumpConfig::default()` when no file is given or it fails to parse.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Runtime configuration for `hds-cli dump`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    /// Connect timeout for manifest/bootstrap/fragment fetches, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Read timeout for the same fetches, in seconds.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Directory to resolve relative manifest paths against, if any are given
    /// on the command line instead of an absolute URL.
    #[serde(default)]
    pub default_manifest_dir: Option<String>,
    /// Maximum number of packets to pump before stopping, a safety bound for
    /// a live stream that never signals end of stream on its own.
    #[serde(default = "default_max_packets")]
    pub max_packets: usize,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_read_timeout_secs() -> u64 {
    30
}

fn default_max_packets() -> usize {
    1000
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            default_manifest_dir: None,
            max_packets: 1000,
        }
    }
}

impl DumpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Load from a TOML file, falling back to defaults if `path` is `None`,
    /// does not exist, or fails to parse (logged as a warning, not fatal).
    pub fn load(path: Option<&Path>) -> DumpConfig {
        let Some(path) = path else {
            return DumpConfig::default();
        };
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            return DumpConfig::default();
        }
        match Self::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                DumpConfig::default()
            }
        }
    }

    fn from_file(path: &Path) -> Result<DumpConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: DumpConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
