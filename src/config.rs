//! Auth configuration file
//!
//! Drivers that need credentials reference a named auth entry; entries live
//! in a YAML file looked up from `$YAK_CONFIG_FILE`, `~/.config/yak/yak.yaml`,
//! then `/etc/yak/yak.yaml`. A missing file yields an empty config so
//! credential-free runs never require one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::options::InputMap;

pub const CONFIG_FILE_ENV: &str = "YAK_CONFIG_FILE";

static CONFIG_FILE_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

/// Pin the config file for the rest of the process. Used by the CLI's
/// `--config` flag; first call wins.
pub fn set_config_file(path: impl Into<PathBuf>) {
    let _ = CONFIG_FILE_OVERRIDE.set(path.into());
}

/// A yak configuration file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Named credential entries; each is a free-form option map the
    /// referencing driver decodes.
    #[serde(default)]
    pub auth: HashMap<String, AuthEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthEntry {
    #[serde(flatten)]
    pub options: InputMap,
}

impl Config {
    /// Read a specific configuration file.
    pub fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&content).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Search the predefined locations and load the first config found.
    pub fn find_and_load() -> Result<Self> {
        if let Some(path) = CONFIG_FILE_OVERRIDE.get() {
            return Self::read_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            let expanded = shellexpand::tilde(&path);
            return Self::read_file(Path::new(expanded.as_ref()));
        }

        for path in candidate_paths() {
            if path.exists() {
                return Self::read_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Look up a named auth entry.
    pub fn auth_entry(&self, name: &str) -> Result<&AuthEntry> {
        self.auth
            .get(name)
            .ok_or_else(|| Error::driver("config", format!("auth entry {name} not found")))
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config").join("yak").join("yak.yaml"));
    }

    paths.push(PathBuf::from("/etc/yak/yak.yaml"));
    paths
}
