//! Configuration Management
//!
//! Persistent user defaults for infraprobe, stored as JSON under the user's
//! config directory.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// User configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Default project to query
    #[serde(default)]
    pub project_id: Option<String>,
    /// API base override (e.g. a recording proxy)
    #[serde(default)]
    pub api_base: Option<String>,
    /// Default log level name (`off`, `error`, `warn`, `info`, `debug`, `trace`)
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("infraprobe").join("config.json"))
    }

    /// Load configuration from disk; a missing or unreadable file yields defaults.
    /// Runs before logging is set up, so problems go to stderr.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                eprintln!("Warning: ignoring invalid config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Effective project (CLI > assertions file > config > gcloud default)
    pub fn effective_project(&self, cli: Option<&str>, file: Option<&str>) -> Option<String> {
        cli.or(file)
            .map(|s| s.to_string())
            .or_else(|| self.project_id.clone())
            .or_else(crate::gcp::auth::get_default_project)
    }

    /// Effective API base (CLI > assertions file > config)
    pub fn effective_api_base(&self, cli: Option<&str>, file: Option<&str>) -> Option<String> {
        cli.or(file)
            .map(|s| s.to_string())
            .or_else(|| self.api_base.clone())
    }
}
