//! Overlay configuration.
//!
//! Settings come from three layers, later ones winning: the built-in defaults, an optional
//! `config.json` in the overlay directory, and `MGIT_*` environment variables.

use crate::errors::*;
use crate::hash::HashScheme;
use crate::util::read_optional;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the optional configuration file inside the overlay directory.
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Overlay directory, relative to the working directory of the underlying repository
    pub root_dir: PathBuf,
    /// Branch the default HEAD points at in a fresh overlay
    pub default_branch: String,
    /// Scheme used to hash new commits
    pub hash_scheme: HashScheme,
    /// Keep the legacy mapping file in sync with the primary one
    pub legacy_mappings: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            root_dir: PathBuf::from(".mgit"),
            default_branch: "master".to_string(),
            hash_scheme: HashScheme::V2,
            legacy_mappings: true,
        }
    }
}

impl Config {
    /// The defaults, overridden from the environment.
    pub fn from_env() -> Result<Config> {
        let mut config = Config::default();
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Read `config.json` from `overlay_dir` if it exists, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(overlay_dir: P) -> Result<Config> {
        let path = overlay_dir.as_ref().join(CONFIG_FILE);
        let mut config = match read_optional(&path)? {
            Some(data) => {
                debug!("loading configuration from {}", path.display());
                serde_json::from_str(&data)?
            }
            None => Config::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `MGIT_*` overrides, looking each variable up with `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("MGIT_DIR") {
            self.root_dir = PathBuf::from(dir);
        }
        if let Some(branch) = lookup("MGIT_DEFAULT_BRANCH") {
            if branch.is_empty() {
                return Err(Error::InvalidRecord(
                    "MGIT_DEFAULT_BRANCH is empty".to_string(),
                ));
            }
            self.default_branch = branch;
        }
        if let Some(scheme) = lookup("MGIT_HASH_SCHEME") {
            self.hash_scheme = scheme.parse()?;
        }
        if let Some(legacy) = lookup("MGIT_LEGACY_MAPPINGS") {
            self.legacy_mappings = parse_bool("MGIT_LEGACY_MAPPINGS", &legacy)?;
        }
        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(Error::InvalidRecord(format!(
            "{} must be true or false, got {:?}",
            name, value
        ))),
    }
}
