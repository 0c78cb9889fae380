//! Engine configuration.
//!
//! Provides `EngineConfig`, shared by every client, describing where the
//! backend lives, where local state is kept and how the sync engine behaves.
//! Values come from a JSON file, then environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::ProcessingOptions;
use crate::sync::SyncPolicy;
use crate::util::{is_http_url, normalize_text_option, parse_flag};

const CONFIG_FILE_NAME: &str = "config.json";
const DATA_DIR_NAME: &str = "decisiondesk";
const DB_FILE_NAME: &str = "desk.db";
const RECORDINGS_DIR_NAME: &str = "recordings";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/v1";

/// Runtime configuration for the sync engine and its clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Backend base URL including the `/api/v1` prefix
    pub api_base_url: String,
    /// SQLite file; defaults to the platform data directory
    pub db_path: Option<PathBuf>,
    /// Where captured recordings are copied before enqueueing
    pub recordings_dir: Option<PathBuf>,
    /// Whether a metered connection opens the sync gate
    pub allow_metered: bool,
    /// Move `New` to `Processing` as soon as a processing request is accepted
    pub optimistic_processing: bool,
    pub pull_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub health_interval_secs: u64,
    /// Options used when a processing request does not specify its own
    pub default_processing: ProcessingOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            db_path: None,
            recordings_dir: None,
            allow_metered: false,
            optimistic_processing: true,
            pull_interval_secs: 60,
            request_timeout_secs: 10,
            health_interval_secs: 15,
            default_processing: ProcessingOptions::default(),
        }
    }
}

/// Root directory for DecisionDesk's local state
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(DATA_DIR_NAME)
}

/// Default location of the JSON config file
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(DATA_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

impl EngineConfig {
    /// Load a config file and apply overrides from the process environment
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let mut config = Self::load_from_path(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a config file; a missing file yields the defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::InvalidInput(format!(
                "Failed to parse config at {}: {error}",
                path.display()
            ))
        })?;
        config.normalize();
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Apply `DESK_*` overrides looked up through `lookup`.
    ///
    /// Unparseable numbers are ignored and leave the current value.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = normalize_text_option(lookup("DESK_API_BASE_URL")) {
            self.api_base_url = url;
        }
        if let Some(path) = normalize_text_option(lookup("DESK_DB_PATH")) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(flag) = normalize_text_option(lookup("DESK_ALLOW_METERED")) {
            self.allow_metered = parse_flag(&flag);
        }
        if let Some(flag) = normalize_text_option(lookup("DESK_OPTIMISTIC_PROCESSING")) {
            self.optimistic_processing = parse_flag(&flag);
        }
        if let Some(secs) = normalize_text_option(lookup("DESK_PULL_INTERVAL_SECS"))
            .and_then(|value| value.parse::<u64>().ok())
        {
            self.pull_interval_secs = secs;
        }
        self.normalize();
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.api_base_url) {
            return Err(Error::InvalidInput(format!(
                "api_base_url must include http:// or https:// (got '{}')",
                self.api_base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.pull_interval_secs == 0 || self.health_interval_secs == 0 {
            return Err(Error::InvalidInput(
                "pull and health intervals must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| default_data_dir().join(DB_FILE_NAME))
    }

    pub fn resolved_recordings_dir(&self) -> PathBuf {
        self.recordings_dir
            .clone()
            .unwrap_or_else(|| default_data_dir().join(RECORDINGS_DIR_NAME))
    }

    pub const fn pull_interval(&self) -> Duration {
        Duration::from_secs(self.pull_interval_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    /// Engine behaviour switches derived from this config
    pub const fn policy(&self) -> SyncPolicy {
        SyncPolicy {
            allow_metered: self.allow_metered,
            optimistic_processing: self.optimistic_processing,
        }
    }

    fn normalize(&mut self) {
        self.api_base_url = normalize_text_option(Some(self.api_base_url.clone()))
            .map_or_else(
                || DEFAULT_API_BASE_URL.to_string(),
                |url| url.trim_end_matches('/').to_string(),
            );
    }
}
