//! Host configuration
//!
//! A TOML file with optional `[session]`, `[session.capture]` and `[http]`
//! tables. Anything left out keeps its default.

use serde::{Deserialize, Serialize};
use skinsight_core::SessionConfig;
use skinsight_http::HttpClientConfig;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) session: SessionConfig,
    pub(crate) http: HttpClientConfig,
}

impl AppConfig {
    pub(crate) fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, defaults otherwise
    pub(crate) fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    #[must_use]
    pub(crate) fn with_endpoint(mut self, endpoint: Option<&str>) -> Self {
        if let Some(endpoint) = endpoint {
            self.http.endpoint = endpoint.to_string();
        }
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let capture = &self.session.capture;
        if !(capture.crop_ratio > 0.0 && capture.crop_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "crop_ratio must be in (0, 1], got {}",
                capture.crop_ratio
            )));
        }
        if capture.output_size == 0 {
            return Err(ConfigError::Invalid("output_size must be positive".to_string()));
        }
        if !(1..=100).contains(&capture.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality must be in [1, 100], got {}",
                capture.jpeg_quality
            )));
        }
        if self.session.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("max_upload_bytes must be positive".to_string()));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use skinsight_core::Facing;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let file = write_config("");
        assert_eq!(AppConfig::load(file.path()).unwrap(), AppConfig::default());
    }

    #[test]
    fn nested_tables_override_defaults() {
        let file = write_config(
            r#"
[session]
max_upload_bytes = 1048576

[session.capture]
facing = "user"
output_size = 512

[http]
endpoint = "https://skin.example/api/analyze"
timeout_secs = 10
"#,
        );

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.session.max_upload_bytes, 1_048_576);
        assert_eq!(config.session.capture.facing, Facing::User);
        assert_eq!(config.session.capture.output_size, 512);
        assert_eq!(config.session.capture.jpeg_quality, 92);
        assert_eq!(config.http.endpoint, "https://skin.example/api/analyze");
        assert_eq!(config.http.timeout_secs, 10);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let file = write_config("[session.capture]\ncrop_ratio = 1.5\n");
        assert!(matches!(
            AppConfig::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));

        let file = write_config("[http]\ntimeout_secs = 0\n");
        assert!(matches!(
            AppConfig::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let file = write_config("[http\nendpoint = 3");
        assert!(matches!(
            AppConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = AppConfig::resolve(Some(path.as_path())).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn endpoint_flag_wins_over_file() {
        let file = write_config("[http]\nendpoint = \"http://from-file/api\"\n");
        let config = AppConfig::resolve(Some(file.path()))
            .unwrap()
            .with_endpoint(Some("http://from-flag/api"));
        assert_eq!(config.http.endpoint, "http://from-flag/api");

        let config = AppConfig::default().with_endpoint(None);
        assert_eq!(config.http.endpoint, HttpClientConfig::DEFAULT_ENDPOINT);
    }
}
