use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use imagery_common::Coordinate;
use serde::{Deserialize, Serialize};

use crate::error::DiscoveryError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Base URL of the imagery service (`/search`, `/archive`, `/opportunities`)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_geocoder_base_url")]
    pub geocoder_base_url: String,

    /// Sent on every outbound request; Nominatim rejects anonymous clients
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Memoize feed results per (feed, coordinate) within a session
    #[serde(default)]
    pub cache_enabled: bool,

    #[serde(default = "default_lat")]
    pub default_lat: f64,

    #[serde(default = "default_lon")]
    pub default_lon: f64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

fn default_api_base_url() -> String {
    "http://localhost:4000".to_string()
}

fn default_geocoder_base_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    format!("imagery-discovery/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_secs() -> u64 {
    30
}

// New York City
fn default_lat() -> f64 {
    40.7128
}

fn default_lon() -> f64 {
    -74.0060
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            geocoder_base_url: default_geocoder_base_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            cache_enabled: false,
            default_lat: default_lat(),
            default_lon: default_lon(),
            log_level: default_log_level(),
            log_dir: default_log_dir(),
        }
    }
}

impl DiscoveryConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DiscoveryConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn default_location(&self) -> Result<Coordinate, DiscoveryError> {
        Coordinate::new(self.default_lat, self.default_lon).map_err(DiscoveryError::from)
    }
}

pub static CONFIG: OnceLock<DiscoveryConfig> = OnceLock::new();

/// Where the loaded configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// The file was missing; the caller should warn once logging is up
    Defaults,
}

/// Parse `path`, or fall back to the defaults if it does not exist
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<(DiscoveryConfig, ConfigSource)> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok((DiscoveryConfig::default(), ConfigSource::Defaults));
    }

    let config = DiscoveryConfig::from_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e))?;
    Ok((config, ConfigSource::File))
}

/// Load `path` into [`CONFIG`]. A missing file yields the defaults.
pub fn read_config(
    path: impl AsRef<Path>,
) -> anyhow::Result<(&'static DiscoveryConfig, ConfigSource)> {
    let (config, source) = load_config(path)?;
    Ok((CONFIG.get_or_init(|| config), source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DiscoveryConfig = toml::from_str(
            r#"
            api_base_url = "http://imagery.internal:8080"
            cache_enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.api_base_url, "http://imagery.internal:8080");
        assert!(config.cache_enabled);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.geocoder_base_url, "https://nominatim.openstreetmap.org");
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_lat = -34.6037\ndefault_lon = -58.3816\n").unwrap();

        let config = DiscoveryConfig::from_file(&path).unwrap();
        let origin = config.default_location().unwrap();
        assert_eq!(origin.lat(), -34.6037);
        assert_eq!(origin.lon(), -58.3816);
    }

    #[test]
    fn test_missing_file_reports_defaults() {
        let dir = TempDir::new().unwrap();

        let (config, source) = load_config(dir.path().join("absent.toml")).unwrap();
        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(config.api_base_url, "http://localhost:4000");

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "log_level = \"debug\"\n").unwrap();
        let (config, source) = load_config(&path).unwrap();
        assert_eq!(source, ConfigSource::File);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_unparseable_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "request_timeout_secs = \"soon\"\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_invalid_default_location() {
        let config = DiscoveryConfig {
            default_lat: 123.0,
            ..DiscoveryConfig::default()
        };
        assert!(config.default_location().is_err());
    }
}
