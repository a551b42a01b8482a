//! Configuration loading from almanac.toml.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use mcp::{DEFAULT_TIMEOUT, ServerConfig, TransportConfig};
use runtime::SessionConfig;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model provider settings.
    pub model: ModelConfig,

    /// Tool loop tunables.
    pub session: SessionConfig,

    /// Capability servers keyed by name. Replaces the defaults when present.
    pub servers: BTreeMap<String, ServerEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            session: SessionConfig::default(),
            servers: default_servers(),
        }
    }
}

/// Model provider configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model to use.
    pub name: String,

    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: runtime::DEFAULT_MODEL.to_string(),
            base_url: runtime::DEFAULT_BASE_URL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// One `[servers.NAME]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerEntry {
    #[serde(flatten)]
    pub transport: TransportConfig,

    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl ServerEntry {
    fn http(url: &str) -> Self {
        Self {
            transport: TransportConfig::Http {
                url: url.to_string(),
                headers: HashMap::new(),
            },
            timeout_secs: None,
        }
    }

    /// Connection settings for the server registered as `name`.
    pub fn server_config(&self, name: &str) -> ServerConfig {
        let timeout = self
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        ServerConfig::new(name, self.transport.clone()).with_timeout(timeout)
    }
}

fn default_servers() -> BTreeMap<String, ServerEntry> {
    BTreeMap::from([
        (
            "weather".to_string(),
            ServerEntry::http("http://localhost:3000/mcp"),
        ),
        (
            "notion".to_string(),
            ServerEntry::http("https://mcp.notion.com/mcp"),
        ),
    ])
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load from `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.model.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.model.name, "gpt-4o");
        assert_eq!(config.model.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.session.max_iterations, 10);
        assert_eq!(config.session.history_window, 10);

        let names: Vec<&String> = config.servers.keys().collect();
        assert_eq!(names, vec!["notion", "weather"]);
        match &config.servers["weather"].transport {
            TransportConfig::Http { url, .. } => assert_eq!(url, "http://localhost:3000/mcp"),
            other => panic!("expected http transport, got {other:?}"),
        }
    }

    #[test]
    fn parse_full_config() {
        let config = Config::parse(
            r#"
            [model]
            name = "gpt-4o-mini"
            base_url = "http://localhost:11434/v1"

            [session]
            max_iterations = 4

            [servers.weather]
            transport = "stdio"
            command = "weather-mcp"
            args = ["--units", "metric"]
            timeout_secs = 5

            [servers.notion]
            transport = "http"
            url = "https://mcp.notion.com/mcp"
            headers = { Authorization = "Bearer secret" }
            "#,
        )
        .unwrap();

        assert_eq!(config.model.name, "gpt-4o-mini");
        assert_eq!(config.model.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.session.max_iterations, 4);
        assert_eq!(config.session.history_window, 10);

        let weather = &config.servers["weather"];
        assert_eq!(weather.timeout_secs, Some(5));
        match &weather.transport {
            TransportConfig::Stdio { command, args, .. } => {
                assert_eq!(command, "weather-mcp");
                assert_eq!(args, &["--units", "metric"]);
            }
            other => panic!("expected stdio transport, got {other:?}"),
        }
        assert_eq!(
            weather.server_config("weather").timeout,
            Duration::from_secs(5)
        );

        match &config.servers["notion"].transport {
            TransportConfig::Http { headers, .. } => {
                assert_eq!(headers["Authorization"], "Bearer secret");
            }
            other => panic!("expected http transport, got {other:?}"),
        }
        assert_eq!(
            config.servers["notion"].server_config("notion").timeout,
            DEFAULT_TIMEOUT
        );
    }

    #[test]
    fn servers_table_replaces_defaults() {
        let config = Config::parse(
            r#"
            [servers.local]
            transport = "http"
            url = "http://127.0.0.1:9000/mcp"
            "#,
        )
        .unwrap();
        assert_eq!(config.servers.len(), 1);
        assert!(config.servers.contains_key("local"));
    }

    #[test]
    fn unknown_transport_is_rejected() {
        let err = Config::parse(
            r#"
            [servers.weather]
            transport = "carrier-pigeon"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default("/nonexistent/almanac.toml").unwrap();
        assert_eq!(config.servers.len(), 2);
    }
}
