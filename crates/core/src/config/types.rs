use std::net::IpAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::advisor::AdvisorConfig;
use crate::external_catalog::MusicBrainzConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub musicbrainz: MusicBrainzConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Search behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Path to the source profile document.
    #[serde(default = "default_profile_path")]
    pub profile_path: PathBuf,
    /// Profile to activate; the document's default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default = "default_min_seeders")]
    pub min_seeders: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_filter: Option<String>,
    #[serde(default)]
    pub strict_format: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            profile_path: default_profile_path(),
            profile: None,
            min_seeders: default_min_seeders(),
            format_filter: None,
            strict_format: false,
        }
    }
}

fn default_profile_path() -> PathBuf {
    PathBuf::from("profiles.yaml")
}

fn default_min_seeders() -> u32 {
    1
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.search.min_seeders, 1);
        assert!(!config.search.strict_format);
        assert!(!config.advisor.enabled);
    }

    #[test]
    fn test_deserialize_partial_toml() {
        let toml = r#"
[server]
port = 9000

[search]
min_seeders = 3
format_filter = "FLAC"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.search.min_seeders, 3);
        assert_eq!(config.search.format_filter.as_deref(), Some("FLAC"));
        assert_eq!(config.search.profile_path, PathBuf::from("profiles.yaml"));
    }

    #[test]
    fn test_deserialize_advisor_section() {
        let toml = r#"
[advisor]
enabled = true
provider = "ollama"
model = "llama3"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.advisor.enabled);
        assert_eq!(config.advisor.model, "llama3");
    }
}
