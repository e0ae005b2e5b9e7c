//! Host configuration from `tessera.toml`.
//!
//! Searches the current directory then its ancestors. Missing files and
//! missing sections fall back to defaults, so an embedder without a config
//! file gets logged print output, entropy-seeded randomness and an in-memory
//! cache.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "tessera.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct HostConfig {
    #[serde(default)]
    pub applet: AppletSection,
    #[serde(default)]
    pub cache: CacheSection,
}

/// Where script `print` output goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintMode {
    /// One `tracing` event per line.
    #[default]
    Log,
    /// `[applet] message` on stdout.
    Stdout,
    Disabled,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppletSection {
    #[serde(default)]
    pub print: PrintMode,
    /// Seed for `random.star`; unset means a fresh seed per call.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CacheSection {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_max_entries() -> usize {
    1024
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            max_entries: default_max_entries(),
        }
    }
}

impl HostConfig {
    /// Load `tessera.toml` from the current directory or an ancestor.
    /// Returns defaults when none is found or it cannot be parsed.
    pub fn load() -> Self {
        match Self::find_and_load() {
            Some(Ok((path, config))) => {
                tracing::debug!(path = %path.display(), "loaded host configuration");
                config
            }
            Some(Err(err)) => {
                tracing::warn!(error = %err, "ignoring host configuration");
                Self::default()
            }
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Search `start` and its ancestors for the config file.
    pub fn find_from(start: &Path) -> Option<Result<(PathBuf, Self), ConfigError>> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Some(Self::load_from(&candidate).map(|config| (candidate, config)));
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    fn find_and_load() -> Option<Result<(PathBuf, Self), ConfigError>> {
        let cwd = std::env::current_dir().ok()?;
        Self::find_from(&cwd)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
