//! Configuration loading for strand.
//!
//! `strand.toml` carries the analysis trade-off switches and the default
//! set of attack contexts to check.

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const CONFIG_FILENAME: &str = "strand.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML in '{path}': {message}")]
    Parse { path: PathBuf, message: String },
}

/// Engine trade-off switches, as accepted by the image computer.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Fold literal operands into concatenations. Disabling trades
    /// precision for speed on concat-heavy graphs.
    pub do_concats: bool,
    /// Fully model `substr`. Disabling treats it as identity.
    pub do_substr: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            do_concats: true,
            do_substr: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisSettings,
    /// Attack contexts to check; empty means all.
    pub contexts: Vec<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Looks for `strand.toml` in `dir`; absent file means defaults.
    pub fn discover(dir: &Path) -> Result<Config, ConfigError> {
        let path = dir.join(CONFIG_FILENAME);
        if path.is_file() {
            Config::load(&path)
        } else {
            Ok(Config::default())
        }
    }
}
