//! Server and data-directory configuration
//!
//! Loaded from `<config dir>/flashcards-anywhere/config.toml` when present,
//! then overridden by the `PORT`, `DB_PATH` and `PUBLIC_DIR` environment
//! variables.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const APP_DIR: &str = "flashcards-anywhere";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid bind address: {0}")]
    BindAddr(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Directory of static front-end files served at `/`
    pub public_dir: Option<PathBuf>,
    /// Seed a "Default" deck with sample cards into an empty database
    pub seed_sample_data: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            db_path: default_data_dir().join("flashcards.db"),
            public_dir: None,
            seed_sample_data: true,
        }
    }
}

/// Per-user data directory, falling back to the temp dir
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR).join("config.toml"))
}

impl AppConfig {
    /// Load from `path`, or from the default location when `None`.
    /// A missing default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_config_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            log::debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        log::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply environment overrides from the process environment
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `PORT`, `DB_PATH` and `PUBLIC_DIR` overrides from `lookup`
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(port) = lookup("PORT").filter(|v| !v.trim().is_empty()) {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "PORT",
                    value: port.clone(),
                })?;
        }
        if let Some(db_path) = lookup("DB_PATH").filter(|v| !v.trim().is_empty()) {
            self.db_path = PathBuf::from(db_path);
        }
        if let Some(public_dir) = lookup("PUBLIC_DIR").filter(|v| !v.trim().is_empty()) {
            self.public_dir = Some(PathBuf::from(public_dir));
        }
        Ok(self)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::BindAddr(format!("{}:{}", self.host, self.port)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml("port = 9001\nseed_sample_data = false\n").unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(config.host, "127.0.0.1");
        assert!(!config.seed_sample_data);
        assert!(config.db_path.ends_with("flashcards.db"));
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "host = \"0.0.0.0\"\npublic_dir = \"/srv/public\"\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.public_dir, Some(PathBuf::from("/srv/public")));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let err = AppConfig::load(Some(&temp.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [("PORT", "8123"), ("DB_PATH", "/tmp/cards.db")]
            .into_iter()
            .collect();
        let config = AppConfig::default()
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.port, 8123);
        assert_eq!(config.db_path, PathBuf::from("/tmp/cards.db"));
        assert_eq!(config.bind_addr().unwrap().port(), 8123);

        let bad = AppConfig::default().apply_overrides(|key| (key == "PORT").then(|| "http".to_string()));
        assert!(matches!(bad, Err(ConfigError::InvalidValue { key: "PORT", .. })));
    }
}
