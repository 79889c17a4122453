//! User settings loaded from `settings.toml`.

use crate::config;
use crate::error::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A user-defined keyword search engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub id: String,
    pub name: String,
    pub keyword: String,
    /// Search URL template, {} is replaced by the terms
    pub url: String,
    #[serde(default)]
    pub suggest_url: Option<String>,
}

/// Schemes the user explicitly allowed or blocked for external handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalProtocols {
    pub allowed: Vec<String>,
    pub blocked: Vec<String>,
}

impl Default for ExternalProtocols {
    fn default() -> Self {
        Self {
            allowed: ["mailto", "news", "snews"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            blocked: [
                "afp",
                "disk",
                "disks",
                "hcp",
                "ms-help",
                "nntp",
                "shell",
                "vbscript",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Whether an external protocol may be launched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    DontBlock,
    Block,
    Unknown,
}

impl ExternalProtocols {
    pub fn block_state(&self, scheme: &str) -> BlockState {
        let scheme = scheme.to_ascii_lowercase();
        if self.blocked.iter().any(|s| s.eq_ignore_ascii_case(&scheme)) {
            BlockState::Block
        } else if self.allowed.iter().any(|s| s.eq_ignore_ascii_case(&scheme)) {
            BlockState::DontBlock
        } else {
            BlockState::Unknown
        }
    }
}

/// Autocomplete settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_matches: usize,
    pub search_suggestions_enabled: bool,
    pub suggest_delay_ms: u64,
    pub search_engine: String,
    pub engines: Vec<EngineSettings>,
    pub external_protocols: ExternalProtocols,
    pub history_contents_days: i64,
    pub history_contents_max_matches: usize,
    pub recent_history_template: String,
    pub recent_history_many_template: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_matches: config::COMPLETION_MAX_RESULTS,
            search_suggestions_enabled: true,
            suggest_delay_ms: config::SUGGEST_DEBOUNCE_MS,
            search_engine: config::DEFAULT_SEARCH_ENGINE.to_string(),
            engines: Vec::new(),
            external_protocols: ExternalProtocols::default(),
            history_contents_days: config::HISTORY_CONTENTS_DAYS,
            history_contents_max_matches: config::HISTORY_CONTENTS_MAX_MATCHES,
            recent_history_template: config::RECENT_HISTORY_TEMPLATE.to_string(),
            recent_history_many_template: config::RECENT_HISTORY_MANY_TEMPLATE.to_string(),
        }
    }
}

impl Settings {
    /// Platform config directory for qayeq, if one can be determined
    pub fn default_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "myyc", config::APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Platform data directory holding the default profile
    pub fn default_profile_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "myyc", config::APP_NAME).map(|dirs| dirs.data_dir().join("default"))
    }

    /// Load settings from a config directory. A missing file yields defaults.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(config::SETTINGS_FILE);

        if !path.exists() {
            log::debug!("No settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)?;
        let settings = Self::from_toml(&contents)?;
        log::info!("Settings loaded from {:?}", path);
        Ok(settings)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.max_matches, 6);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(config::SETTINGS_FILE),
            r#"
            max_matches = 4
            search_engine = "google"

            [[engines]]
            id = "wiki"
            name = "Wikipedia"
            keyword = "w"
            url = "https://en.wikipedia.org/w/index.php?search={}"

            [external_protocols]
            allowed = ["steam"]
            "#,
        )
        .unwrap();

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.max_matches, 4);
        assert_eq!(settings.search_engine, "google");
        assert_eq!(settings.engines.len(), 1);
        assert_eq!(settings.engines[0].suggest_url, None);
        assert!(settings.search_suggestions_enabled);
        assert_eq!(settings.external_protocols.block_state("steam"), BlockState::DontBlock);
        // blocked list falls back to its default when only `allowed` is given
        assert_eq!(settings.external_protocols.block_state("vbscript"), BlockState::Block);
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(config::SETTINGS_FILE), "max_matches = \"six\"").unwrap();
        assert!(Settings::load(dir.path()).is_err());
    }

    #[test]
    fn test_block_state() {
        let protocols = ExternalProtocols::default();
        assert_eq!(protocols.block_state("MAILTO"), BlockState::DontBlock);
        assert_eq!(protocols.block_state("shell"), BlockState::Block);
        assert_eq!(protocols.block_state("site"), BlockState::Unknown);
    }
}
