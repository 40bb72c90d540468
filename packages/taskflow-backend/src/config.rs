/// Configuration for the TaskFlow backend.
/// Reads backend.json from ~/.config/taskflow/backend.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use taskflow_core::config::SyncSettings;

pub const PORT_ENV: &str = "TASKFLOW_PORT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid {name} value '{value}'")]
    InvalidEnv { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Settings for board sessions opened against this backend.
    #[serde(default)]
    pub sync: SyncSettings,
}

fn default_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            sync: SyncSettings::default(),
        }
    }
}

impl BackendConfig {
    /// Apply a `TASKFLOW_PORT` value, if one is set.
    pub fn with_port_override(mut self, value: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(raw) = value {
            self.port = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: PORT_ENV,
                value: raw.to_string(),
            })?;
        }
        Ok(self)
    }
}

/// Default config path: ~/.config/taskflow/backend.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskflow")
        .join("backend.json")
}

/// Strict read: fails if the file is missing or unparsable.
pub fn read_config(path: &Path) -> Result<BackendConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Load config from path. Returns defaults if the file doesn't exist or is broken.
pub fn load_config(path: &Path) -> BackendConfig {
    match read_config(path) {
        Ok(config) => config,
        Err(ConfigError::Io { .. }) => {
            log::info!("No config at {}, using defaults", path.display());
            BackendConfig::default()
        }
        Err(e) => {
            log::warn!("{}, using defaults", e);
            BackendConfig::default()
        }
    }
}

/// Config file plus environment overrides. A bad override is logged and ignored.
pub fn load_effective_config(path: &Path) -> BackendConfig {
    let config = load_config(path);
    let port = std::env::var(PORT_ENV).ok();
    match config.clone().with_port_override(port.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("{}, keeping port {}", e, config.port);
            config
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("backend.json"));
        assert_eq!(config, BackendConfig::default());
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_address, "127.0.0.1");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.json");
        fs::write(&path, r#"{ "port": 9191, "sync": { "write_timeout_ms": 2500 } }"#).unwrap();

        let config = load_config(&path);
        assert_eq!(config.port, 9191);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.sync.write_timeout_ms, 2500);
        assert_eq!(config.sync.queue_limit, 64);
    }

    #[test]
    fn test_broken_file_is_an_error_when_strict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(read_config(&path), Err(ConfigError::Parse { .. })));
        assert_eq!(load_config(&path), BackendConfig::default());
    }

    #[test]
    fn test_port_override() {
        let config = BackendConfig::default()
            .with_port_override(Some(" 9000 "))
            .unwrap();
        assert_eq!(config.port, 9000);
        assert!(BackendConfig::default()
            .with_port_override(Some("http"))
            .is_err());
        assert_eq!(
            BackendConfig::default().with_port_override(None).unwrap().port,
            8080
        );
    }
}
