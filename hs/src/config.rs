//! Project and global CLI configuration.
//!
//! Two JSON files:
//! - `hsproject.json` at the project root: name, source directory, platform
//!   version. Loaded once per session and re-read before uploads to detect
//!   drift.
//! - `~/.hs/config.json`: configured accounts, the default account, and
//!   small persisted UI flags.

use hs_core::{Environment, ProjectConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no {file} found in {dir}", file = paths::PROJECT_CONFIG_FILE, dir = .0.display())]
    MissingProjectConfig(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid project config: {0}")]
    Invalid(String),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Load and validate `hsproject.json` from a project directory.
pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let path = project_dir.join(paths::PROJECT_CONFIG_FILE);
    if !path.exists() {
        return Err(ConfigError::MissingProjectConfig(project_dir.to_path_buf()));
    }

    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let config: ProjectConfig =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

    if config.name.trim().is_empty() {
        return Err(ConfigError::Invalid("project name is empty".to_string()));
    }
    if config.src_dir.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("srcDir is empty".to_string()));
    }

    Ok(config)
}

/// One authenticated account entry in the global config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEntry {
    pub account_id: u64,
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

/// Global CLI configuration (`~/.hs/config.json`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    #[serde(default)]
    pub default_account: Option<u64>,
    #[serde(default)]
    pub accounts: Vec<AccountEntry>,
    #[serde(default)]
    pub viewed_welcome_screen: bool,
}

impl GlobalConfig {
    /// Load the global config, or defaults when the file does not exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&paths::global_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&paths::global_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let raw = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, raw).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn account(&self, account_id: u64) -> Option<&AccountEntry> {
        self.accounts.iter().find(|a| a.account_id == account_id)
    }

    pub fn account_env(&self, account_id: u64) -> Environment {
        self.account(account_id).map(|a| a.env).unwrap_or_default()
    }
}
