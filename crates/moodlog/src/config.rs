//! Configuration for the moodlog CLI.
//!
//! Values are layered: built-in defaults, then the JSON config file, then
//! environment variables and command-line flags (clap merges those two).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use moodlog_classifier::{DEFAULT_MODEL_PATH, DEFAULT_VECTORIZER_PATH};
use serde::Deserialize;

pub const DEFAULT_NOTES_DIR: &str = "UserNotes";
const DEFAULT_LOG_FILTER: &str = "warn";

/// Config file contents. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub notes_dir: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub vectorizer_path: Option<PathBuf>,
    pub log_filter: Option<String>,
}

/// Values given on the command line or through the environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub notes_dir: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub vectorizer_path: Option<PathBuf>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub notes_dir: PathBuf,
    pub model_path: PathBuf,
    pub vectorizer_path: PathBuf,
    pub log_filter: String,
}

impl Config {
    /// Load the config file (explicit path, else the user config dir if the
    /// file exists there) and apply overrides.
    pub fn load(explicit: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let file = match explicit {
            Some(path) => read_file_config(path)?,
            None => match default_config_path() {
                Some(path) if path.is_file() => read_file_config(&path)?,
                _ => FileConfig::default(),
            },
        };
        Ok(Self::resolve(file, overrides))
    }

    pub fn resolve(file: FileConfig, overrides: Overrides) -> Self {
        Self {
            notes_dir: overrides
                .notes_dir
                .or(file.notes_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_NOTES_DIR)),
            model_path: overrides
                .model_path
                .or(file.model_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            vectorizer_path: overrides
                .vectorizer_path
                .or(file.vectorizer_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_VECTORIZER_PATH)),
            log_filter: file
                .log_filter
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }
}

/// `<config_dir>/moodlog/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("moodlog").join("config.json"))
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}
