//! TOML configuration for the client and the server.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//!
//! [client]
//! base_url = "http://127.0.0.1:8080"
//! timeout_ms = 10000
//! connect_timeout_ms = 5000
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

///
/// Config
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub client: ClientConfig,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

///
/// ServerConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: SocketAddr::from(([0, 0, 0, 0], 8080)) }
    }
}

///
/// ClientConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Scheme and authority every operation path is appended to. A path
    /// prefix (`http://host/api`) is kept.
    pub base_url: String,
    /// Upper bound for a whole call: connect, request, and reading the body.
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_owned(),
            timeout_ms: 10_000,
            connect_timeout_ms: 5_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.bind.port(), 8080);
        assert_eq!(config.client.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_toml_str(
            r#"
            [server]
            bind = "127.0.0.1:9000"

            [client]
            base_url = "http://10.0.2.2:8080"
            timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.client.base_url, "http://10.0.2.2:8080");
        assert_eq!(config.client.timeout(), Duration::from_millis(250));
        assert_eq!(config.client.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml_str("[client]\nretries = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn builder_helpers() {
        let config =
            ClientConfig::new("http://example.test").with_timeout(Duration::from_millis(1500));
        assert_eq!(config.base_url, "http://example.test");
        assert_eq!(config.timeout_ms, 1500);
    }
}
