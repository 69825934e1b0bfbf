//! The config module provides the config spec and parsing logic.
//!
//! Errors name the offending key and the configuration file so that a broken config can be fixed
//! without reading source. Unrecognized keys are rejected rather than silently ignored.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::common::{expand_home, expand_home_path, APP_NAME};

pub const DEFAULT_MAX_HIERARCHY_DEPTH: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Configuration file not found ({0})")]
    NotFound(PathBuf),
    #[error("Failed to decode configuration file {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("Missing key {key} in configuration file ({path})")]
    MissingKey { key: String, path: PathBuf },
    #[error("Invalid value for {key} in configuration file ({path}): {message}")]
    InvalidValue { key: String, path: PathBuf, message: String },
    #[error("Unrecognized keys in configuration file ({path}): {}", keys.join(", "))]
    UnrecognizedKeys { keys: Vec<String>, path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The exported library document.
    pub library_file: PathBuf,
    /// Directory the stored track locations are rebased onto.
    pub library_root: PathBuf,
    /// Directory the playlist tree is written into.
    pub target_dir: PathBuf,
    pub max_proc: usize,
    pub max_hierarchy_depth: usize,
    /// Playlist names skipped in addition to the reserved "Library" playlist.
    pub ignore_playlists: Vec<String>,
}

impl Config {
    /// Build a config in code. `~` is expanded in both paths, and `library_root` defaults to the
    /// directory holding the expanded `library_file`.
    pub fn new(library_file: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        let library_file = expand_home_path(library_file.into());
        let library_root = default_library_root(&library_file);
        Config {
            library_file,
            library_root,
            target_dir: expand_home_path(target_dir.into()),
            max_proc: default_max_proc(),
            max_hierarchy_depth: DEFAULT_MAX_HIERARCHY_DEPTH,
            ignore_playlists: Vec::new(),
        }
    }

    pub fn with_library_root(mut self, library_root: impl Into<PathBuf>) -> Self {
        self.library_root = expand_home_path(library_root.into());
        self
    }

    pub fn parse(config_path_override: Option<&Path>) -> Result<Config, ConfigError> {
        let cfgpath = match config_path_override {
            Some(p) => p.to_path_buf(),
            None => default_config_path(),
        };
        debug!("Reading configuration from {}", cfgpath.display());

        let text = match fs::read_to_string(&cfgpath) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ConfigError::NotFound(cfgpath)),
            Err(e) => {
                return Err(ConfigError::Decode {
                    path: cfgpath,
                    message: e.to_string(),
                })
            }
        };
        let mut data = text.parse::<toml::Table>().map_err(|e| ConfigError::Decode {
            path: cfgpath.clone(),
            message: e.to_string(),
        })?;

        let library_file = take_path(&mut data, "library_file", &cfgpath)?.ok_or_else(|| ConfigError::MissingKey {
            key: "library_file".to_string(),
            path: cfgpath.clone(),
        })?;
        let target_dir = take_path(&mut data, "target_dir", &cfgpath)?.ok_or_else(|| ConfigError::MissingKey {
            key: "target_dir".to_string(),
            path: cfgpath.clone(),
        })?;
        let library_root =
            take_path(&mut data, "library_root", &cfgpath)?.unwrap_or_else(|| default_library_root(&library_file));
        let max_proc = take_positive_int(&mut data, "max_proc", &cfgpath)?.unwrap_or_else(default_max_proc);
        let max_hierarchy_depth =
            take_positive_int(&mut data, "max_hierarchy_depth", &cfgpath)?.unwrap_or(DEFAULT_MAX_HIERARCHY_DEPTH);
        let ignore_playlists = take_string_list(&mut data, "ignore_playlists", &cfgpath)?.unwrap_or_default();

        if !data.is_empty() {
            let mut keys: Vec<String> = data.keys().cloned().collect();
            keys.sort();
            return Err(ConfigError::UnrecognizedKeys { keys, path: cfgpath });
        }

        Ok(Config {
            library_file,
            library_root,
            target_dir,
            max_proc,
            max_hierarchy_depth,
            ignore_playlists,
        })
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("config.toml")
}

fn default_library_root(library_file: &Path) -> PathBuf {
    library_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_max_proc() -> usize {
    num_cpus::get().max(1)
}

fn take_path(data: &mut toml::Table, key: &str, cfgpath: &Path) -> Result<Option<PathBuf>, ConfigError> {
    match data.remove(key) {
        None => Ok(None),
        Some(toml::Value::String(s)) if !s.is_empty() => Ok(Some(expand_home(&s))),
        Some(other) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            path: cfgpath.to_path_buf(),
            message: format!("must be a path: got {}", other.type_str()),
        }),
    }
}

fn take_positive_int(data: &mut toml::Table, key: &str, cfgpath: &Path) -> Result<Option<usize>, ConfigError> {
    match data.remove(key) {
        None => Ok(None),
        Some(toml::Value::Integer(n)) if n >= 1 => Ok(Some(n as usize)),
        Some(other) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            path: cfgpath.to_path_buf(),
            message: format!("must be a positive integer: got {other}"),
        }),
    }
}

fn take_string_list(data: &mut toml::Table, key: &str, cfgpath: &Path) -> Result<Option<Vec<String>>, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        path: cfgpath.to_path_buf(),
        message,
    };
    match data.remove(key) {
        None => Ok(None),
        Some(toml::Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                toml::Value::String(s) => Ok(s),
                other => Err(invalid(format!("each entry must be of type str: got {}", other.type_str()))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(invalid(format!("must be a list[str]: got {}", other.type_str()))),
    }
}
