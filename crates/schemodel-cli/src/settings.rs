use std::path::{Path, PathBuf};

use schemodel_core::ValidationOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SETTINGS_FILE: &str = "schemodel.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub validation: ValidationOptions,
    pub logging: LoggingSettings,
}

/// Load settings from `explicit`, or from `schemodel.toml` in the working
/// directory when it exists. Missing files and keys fall back to defaults,
/// except that an explicitly named file must exist.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings, SettingsError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = PathBuf::from(DEFAULT_SETTINGS_FILE);
            if !path.exists() {
                return Ok(Settings::default());
            }
            path
        }
    };
    let content = std::fs::read_to_string(&path).map_err(|source| SettingsError::Io {
        path: path.clone(),
        source,
    })?;
    parse_settings(&content).map_err(|source| SettingsError::Toml { path, source })
}

pub fn parse_settings(content: &str) -> Result<Settings, toml::de::Error> {
    toml::from_str(content)
}
