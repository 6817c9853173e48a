use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Analysis endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Absolute URL the multipart request is posted to
    pub endpoint: String,
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
}

impl HttpClientConfig {
    pub const DEFAULT_ENDPOINT: &'static str = "http://localhost:3000/api/analyze";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HttpClientConfig::default();
        assert_eq!(config.endpoint, "http://localhost:3000/api/analyze");
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: HttpClientConfig =
            serde_json::from_str(r#"{"endpoint":"https://skin.example/api/analyze"}"#).unwrap();
        assert_eq!(config.endpoint, "https://skin.example/api/analyze");
        assert_eq!(config.timeout_secs, 30);
    }
}
