//! Advisor configuration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::llm::{AnthropicClient, LlmClient, OllamaClient};

/// Which model backend to use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorProvider {
    Anthropic,
    Ollama,
}

/// Configuration for the optional LLM advisors.
///
/// With `enabled = false` (or a missing API key for providers that need
/// one) every advisor runs its deterministic fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_provider")]
    pub provider: AdvisorProvider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

fn default_provider() -> AdvisorProvider {
    AdvisorProvider::Anthropic
}

fn default_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_base: None,
        }
    }
}

impl AdvisorConfig {
    /// Build the configured client, or `None` when advisors are disabled or
    /// unusable as configured.
    pub fn build_client(&self) -> Option<Arc<dyn LlmClient>> {
        if !self.enabled {
            return None;
        }

        match self.provider {
            AdvisorProvider::Anthropic => {
                let api_key = self.api_key.clone()?;
                let mut client = AnthropicClient::new(api_key, self.model.clone());
                if let Some(base) = &self.api_base {
                    client = client.with_api_base(base.clone());
                }
                Some(Arc::new(client))
            }
            AdvisorProvider::Ollama => {
                let mut client = OllamaClient::new(self.model.clone());
                if let Some(base) = &self.api_base {
                    client = client.with_api_base(base.clone());
                }
                Some(Arc::new(client))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_builds_nothing() {
        assert!(AdvisorConfig::default().build_client().is_none());
    }

    #[test]
    fn test_anthropic_requires_api_key() {
        let config = AdvisorConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(config.build_client().is_none());

        let config = AdvisorConfig {
            enabled: true,
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let client = config.build_client().unwrap();
        assert_eq!(client.provider(), "anthropic");
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = AdvisorConfig {
            enabled: true,
            provider: AdvisorProvider::Ollama,
            model: "llama3".to_string(),
            api_key: None,
            api_base: None,
        };
        let client = config.build_client().unwrap();
        assert_eq!(client.provider(), "ollama");
        assert_eq!(client.model(), "llama3");
    }

    #[test]
    fn test_toml_round_trip() {
        let toml = r#"
enabled = true
provider = "ollama"
model = "mistral"
"#;
        let config: AdvisorConfig = toml::from_str(toml).unwrap();
        assert!(config.enabled);
        assert_eq!(config.provider, AdvisorProvider::Ollama);
        assert_eq!(config.model, "mistral");
    }
}
