//! Configuration file for forgemirror
//!
//! `config.yaml` under the user config directory. Every field is optional;
//! command-line flags take precedence over what is set here.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{MirrorError, Result};
use crate::services::metadata::{DescriptionMatch, MetadataPolicy, DEFAULT_STALE_FORK_DAYS};
use crate::types::Visibility;

/// Longest accepted stale-fork window, roughly a century
pub const MAX_STALE_FORK_DAYS: i64 = 36_500;

/// Root config.yaml structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Directory holding the local mirrors
    pub cache_dir: Option<PathBuf>,

    /// Name of the destination remote inside each mirror
    pub remote_name: Option<String>,

    pub policy: PolicyConfig,
}

/// Mirror policy constants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Forks not updated for this many days get archived
    pub stale_fork_days: i64,

    pub description_match: DescriptionMatch,

    /// Visibility set on the destination whenever the description is updated
    pub visibility: Visibility,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            stale_fork_days: DEFAULT_STALE_FORK_DAYS,
            description_match: DescriptionMatch::default(),
            visibility: Visibility::Public,
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_STALE_FORK_DAYS).contains(&self.stale_fork_days) {
            return Err(MirrorError::Config(format!(
                "policy.stale_fork_days must be between 0 and {}, got {}",
                MAX_STALE_FORK_DAYS, self.stale_fork_days
            )));
        }
        Ok(())
    }

    pub fn to_policy(&self) -> Result<MetadataPolicy> {
        self.validate()?;
        Ok(MetadataPolicy {
            stale_fork_after: Duration::days(self.stale_fork_days),
            description_match: self.description_match,
            visibility: self.visibility,
        })
    }
}

impl MirrorConfig {
    /// `<config dir>/forgemirror/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("forgemirror").join("config.yaml"))
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents).map_err(|e| match e {
            MirrorError::Config(message) => MirrorError::Config(format!("{}: {}", path.display(), message)),
            other => other,
        })
    }

    /// Load `path` if given, else the default file if it exists, else defaults.
    ///
    /// An explicitly named file must exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::debug!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Parse and validate YAML contents; an empty document gives the defaults
    pub fn parse(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_yaml::from_str(contents).map_err(|e| MirrorError::Config(e.to_string()))?;
        config.policy.validate()?;
        Ok(config)
    }
}
