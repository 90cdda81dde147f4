//! Connection settings for [`HttpEngine`](crate::HttpEngine).

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the HTTP search engine client.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the cluster (e.g., `http://localhost:9200`).
    #[serde(default = "EngineConfig::default_url")]
    pub url: String,

    /// Total request timeout in seconds.
    #[serde(default = "EngineConfig::default_timeout")]
    pub timeout_seconds: u64,

    /// Connection timeout in seconds.
    #[serde(default = "EngineConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Basic auth user name.
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password.
    #[serde(default)]
    pub password: Option<String>,

    /// API key, either `id:key` or already base64-encoded.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Mapping type override for index mappings and document URLs. When
    /// unset the type follows the cluster version: `configuration` before
    /// 7.x, typeless (`_doc` URLs) from 7.x.
    #[serde(default)]
    pub document_type: Option<String>,

    /// Skip TLS certificate verification.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl EngineConfig {
    fn default_url() -> String {
        "http://localhost:9200".to_string()
    }

    const fn default_timeout() -> u64 {
        30
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    /// Create a configuration for the given URL with default settings.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Get the connection timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            timeout_seconds: Self::default_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            username: None,
            password: None,
            api_key: None,
            document_type: None,
            accept_invalid_certs: false,
        }
    }
}
