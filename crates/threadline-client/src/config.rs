// Client configuration: where the backend lives and how its chat stream is framed

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GatewayError, Result};
use crate::stream::WireFormat;

const DEFAULT_CHAT_PATH: &str = "/api/chat";

fn default_chat_path() -> String {
    DEFAULT_CHAT_PATH.to_string()
}

/// Configuration for [`crate::ApiClient`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the thread/message backend, e.g. "http://localhost:8000"
    pub base_url: String,

    /// Chat streaming endpoint. Relative paths are joined to `base_url`,
    /// absolute URLs are used as-is.
    #[serde(default = "default_chat_path")]
    pub chat_path: String,

    #[serde(default)]
    pub wire_format: WireFormat,

    /// Request timeout. `None` leaves the transport default in place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            chat_path: default_chat_path(),
            wire_format: WireFormat::default(),
            timeout_secs: None,
        }
    }

    pub fn with_chat_path(mut self, chat_path: impl Into<String>) -> Self {
        self.chat_path = chat_path.into();
        self
    }

    pub fn with_wire_format(mut self, wire_format: WireFormat) -> Self {
        self.wire_format = wire_format;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Read configuration from the environment
    ///
    /// * `THREADLINE_API_URL` (required)
    /// * `THREADLINE_CHAT_PATH`
    /// * `THREADLINE_WIRE_FORMAT` (`line_prefixed` or `event_stream`)
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("THREADLINE_API_URL").map_err(|_| {
            GatewayError::InvalidConfig("THREADLINE_API_URL environment variable is required".to_string())
        })?;

        let mut config = Self::new(base_url);

        if let Ok(path) = std::env::var("THREADLINE_CHAT_PATH") {
            config.chat_path = path;
        }
        if let Ok(format) = std::env::var("THREADLINE_WIRE_FORMAT") {
            config.wire_format = format.parse()?;
        }

        Ok(config)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Join a backend path onto `base_url`
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Full URL of the chat streaming endpoint
    pub fn chat_url(&self) -> String {
        if self.chat_path.starts_with("http://") || self.chat_path.starts_with("https://") {
            self.chat_path.clone()
        } else {
            self.endpoint(&self.chat_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = ClientConfig::new("http://localhost:8000/");
        assert_eq!(config.endpoint("/v1/threads"), "http://localhost:8000/v1/threads");
    }

    #[test]
    fn test_chat_url_relative_and_absolute() {
        let config = ClientConfig::new("http://localhost:8000");
        assert_eq!(config.chat_url(), "http://localhost:8000/api/chat");

        let direct = config.with_chat_path("https://backend.example/v1/stream2");
        assert_eq!(direct.chat_url(), "https://backend.example/v1/stream2");
    }

    #[test]
    fn test_serde_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url":"http://api"}"#).unwrap();

        assert_eq!(config.chat_path, "/api/chat");
        assert_eq!(config.wire_format, WireFormat::LinePrefixed);
        assert!(config.timeout().is_none());
    }
}
