use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::repro::store::{ParseRecordModeError, RecordMode};
use crate::util::paths::config_path;

pub const ENV_RECORD_MODE: &str = "PVCR_RECORD_MODE";
pub const ENV_BLOCK_RUN: &str = "PVCR_BLOCK_RUN";
pub const ENV_FUZZY_MATCHERS: &str = "PVCR_FUZZY_MATCHERS";
pub const ENV_AUTO_FUZZY_MATCH: &str = "PVCR_AUTO_FUZZY_MATCH";
pub const ENV_WAIT: &str = "PVCR_WAIT";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse config file {}: {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{var}: {source}")]
    InvalidRecordMode {
        var: &'static str,
        #[source]
        source: ParseRecordModeError,
    },
}

/// Record/replay configuration shared by every test session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Persistence policy for recordings files
    pub record_mode: RecordMode,
    /// Block every unrecorded invocation
    pub block_run: bool,
    /// Global fuzzy matchers, applied before per-test ones
    pub fuzzy_matchers: Vec<String>,
    /// Scrub the directory above the test file from arguments
    pub auto_fuzzy_match: bool,
    /// Emulate the recorded duration when replaying
    pub wait: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            record_mode: RecordMode::New,
            block_run: false,
            fuzzy_matchers: Vec::new(),
            auto_fuzzy_match: false,
            wait: true,
        }
    }
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlSettings {
    pub record_mode: Option<RecordMode>,
    pub block_run: Option<bool>,
    pub fuzzy_matchers: Option<Vec<String>>,
    pub auto_fuzzy_match: Option<bool>,
    pub wait: Option<bool>,
}

impl Settings {
    /// Defaults, then the config file if there is one, then the environment.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = Settings::default();

        let config_file = config_path();
        if config_file.exists() {
            settings.merge_toml(Self::read_toml(&config_file)?);
        }

        settings.apply_env(|name| std::env::var(name).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let mut settings = Settings::default();
        settings.merge_toml(Self::read_toml(path)?);
        Ok(settings)
    }

    fn read_toml(path: &Path) -> Result<TomlSettings, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| SettingsError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn merge_toml(&mut self, toml: TomlSettings) {
        if let Some(record_mode) = toml.record_mode {
            self.record_mode = record_mode;
        }
        if let Some(block_run) = toml.block_run {
            self.block_run = block_run;
        }
        if let Some(fuzzy_matchers) = toml.fuzzy_matchers {
            self.fuzzy_matchers = fuzzy_matchers;
        }
        if let Some(auto_fuzzy_match) = toml.auto_fuzzy_match {
            self.auto_fuzzy_match = auto_fuzzy_match;
        }
        if let Some(wait) = toml.wait {
            self.wait = wait;
        }
    }

    /// Override from environment variables, looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_RECORD_MODE).filter(|v| !v.trim().is_empty()) {
            self.record_mode =
                raw.parse()
                    .map_err(|source| SettingsError::InvalidRecordMode {
                        var: ENV_RECORD_MODE,
                        source,
                    })?;
        }
        if let Some(raw) = lookup(ENV_BLOCK_RUN) {
            self.block_run = is_truthy(&raw);
        }
        if let Some(raw) = lookup(ENV_FUZZY_MATCHERS) {
            self.fuzzy_matchers = raw
                .lines()
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(raw) = lookup(ENV_AUTO_FUZZY_MATCH) {
            self.auto_fuzzy_match = is_truthy(&raw);
        }
        if let Some(raw) = lookup(ENV_WAIT) {
            self.wait = is_truthy(&raw);
        }
        Ok(())
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    value == "1"
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("on")
}
