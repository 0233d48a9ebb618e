//! Server configuration loading and management

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Configuration for a server instance.
///
/// Everything has a default so a bare `ServerConfig::default()` works for
/// development; deployments load the same structure from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// URL path clients authenticate against. Must not collide with any
    /// derived resource path; the registry enforces this at startup.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Session lifetime in seconds. `None` means sessions never expire.
    #[serde(default)]
    pub session_ttl_seconds: Option<u64>,

    /// Whether JSON response bodies are pretty printed
    #[serde(default)]
    pub pretty_print_json: bool,
}

fn default_login_path() -> String {
    "/login".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            session_ttl_seconds: None,
            pretty_print_json: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Session lifetime as a chrono duration, if sessions expire
    pub fn session_ttl(&self) -> Option<chrono::Duration> {
        self.session_ttl_seconds
            .map(|secs| chrono::Duration::seconds(secs as i64))
    }
}
