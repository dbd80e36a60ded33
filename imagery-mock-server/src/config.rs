use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Port to bind the server to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether to bind to all interfaces (0.0.0.0) or just localhost
    #[serde(default)]
    pub bind_all: bool,

    /// Origin allowed by CORS; any origin when unset
    #[serde(default)]
    pub allowed_origin: Option<String>,
}

fn default_port() -> u16 {
    4000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_all: false,
            allowed_origin: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, or the defaults if it does not exist
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;

        Ok(config)
    }
}
