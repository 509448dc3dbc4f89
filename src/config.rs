//! Configuration for careledger

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("careledger")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the record database and config file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// NATS server URL; when unset the service runs HTTP-only and
    /// treatment events are not published
    #[serde(default)]
    pub nats_url: Option<String>,

    /// NATS user for authenticated servers
    #[serde(default)]
    pub nats_user: Option<String>,

    /// NATS password for authenticated servers
    #[serde(default)]
    pub nats_password: Option<String>,
}

fn default_http_port() -> u16 {
    8085
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            http_port: default_http_port(),
            nats_url: None,
            nats_user: None,
            nats_password: None,
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: Config = toml::from_str("http_port = 9000").unwrap();
        assert_eq!(config.http_port, 9000);
        assert!(config.nats_url.is_none());
        assert_eq!(config.data_dir, default_data_dir());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config {
            http_port: 9001,
            nats_url: Some("nats://localhost:4222".to_string()),
            ..Config::default()
        };
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.http_port, 9001);
        assert_eq!(loaded.nats_url.as_deref(), Some("nats://localhost:4222"));
    }
}
