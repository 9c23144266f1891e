//! Layered configuration: defaults < TOML files < environment < command line.

use crate::document::Model;
use crate::errors::DbError;
use crate::note::Note;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_URI: &str = "file://noteful.journal";
pub const CONFIG_ENV: &str = "NOTEFUL_CONFIG";

/// Every field is optional so that each layer only sets what it names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub uri: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_config: Option<PathBuf>,
    pub collection: Option<String>,
}

impl AppConfig {
    /// Fields set in `other` replace ours.
    #[must_use]
    pub fn overridden_by(self, other: Self) -> Self {
        Self {
            uri: other.uri.or(self.uri),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            log_config: other.log_config.or(self.log_config),
            collection: other.collection.or(self.collection),
        }
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        self.uri.as_deref().unwrap_or(DEFAULT_URI)
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        self.collection.as_deref().unwrap_or(Note::COLLECTION)
    }

    #[must_use]
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

/// Candidate config files, highest priority first.
#[must_use]
pub fn config_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = explicit {
        paths.push(p.to_path_buf());
    }
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        paths.push(PathBuf::from(p));
    }
    if let Some(home) = dirs_next::home_dir() {
        paths.push(home.join(".config").join("noteful.toml"));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join("noteful.toml"));
    }
    paths
}

/// # Errors
/// `Config` if the file cannot be read or is not valid config TOML.
pub fn load_file(path: &Path) -> Result<AppConfig, DbError> {
    let text = std::fs::read_to_string(path).map_err(|e| DbError::Config(format!("{}: {e}", path.display())))?;
    toml::from_str(&text).map_err(|e| DbError::Config(format!("{}: {e}", path.display())))
}

/// The environment layer, read through `lookup` (normally `std::env::var`).
pub fn env_layer<F>(lookup: F) -> AppConfig
where
    F: Fn(&str) -> Option<String>,
{
    AppConfig {
        uri: lookup("NOTEFUL_URI"),
        log_dir: lookup("NOTEFUL_LOG_DIR").map(PathBuf::from),
        log_level: lookup("NOTEFUL_LOG_LEVEL"),
        log_config: lookup("NOTEFUL_LOG_CONFIG").map(PathBuf::from),
        collection: lookup("NOTEFUL_COLLECTION"),
    }
}

/// Merge layers. `files` is ordered highest priority first.
#[must_use]
pub fn resolve(files: Vec<AppConfig>, env: AppConfig, cli: AppConfig) -> AppConfig {
    let from_files = files.into_iter().rev().fold(AppConfig::default(), AppConfig::overridden_by);
    from_files.overridden_by(env).overridden_by(cli)
}

/// Load the full configuration.
///
/// A file named with `explicit` must exist; the other candidates are skipped when missing.
///
/// # Errors
/// `Config` for an unreadable or invalid config file.
pub fn load(explicit: Option<&Path>, cli: AppConfig) -> Result<AppConfig, DbError> {
    let mut files = Vec::new();
    for path in config_paths(explicit) {
        let required = explicit.is_some_and(|e| e == path);
        if !required && !path.exists() {
            continue;
        }
        log::debug!("reading config {}", path.display());
        files.push(load_file(&path)?);
    }
    Ok(resolve(files, env_layer(|k| std::env::var(k).ok()), cli))
}
