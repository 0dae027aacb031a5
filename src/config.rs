//! Application configuration.
//!
//! One explicit struct constructed at process start and passed into the
//! components that need it; no process-wide connection constants.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database URL.
    pub database_url: String,
    /// Address the HTTP server binds to.
    pub listen: String,
    /// Directory scanned by `import` when no files are given.
    pub import_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://reportdesk.db".to_string(),
            listen: "127.0.0.1:5000".to_string(),
            import_dir: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    /// Load configuration: an explicit file wins, otherwise the per-user
    /// config file if present, otherwise defaults. `REPORTDESK_DATABASE_URL`
    /// overrides the database URL in every case.
    pub fn load(explicit: Option<&Path>) -> Result<AppConfig> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => AppConfig::default(),
            },
        };
        if let Ok(url) = std::env::var("REPORTDESK_DATABASE_URL") {
            config.database_url = url;
        }
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<AppConfig> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("reportdesk").join("config.toml"))
    }
}
