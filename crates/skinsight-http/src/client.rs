//! Multipart analysis client
//!
//! One POST per submission, no retries. The session decides what a failure
//! means for the user; this layer only classifies it:
//! - Connection, timeout and body read failures are `Transport`
//! - Non-2xx responses are `Server`, carrying the response text
//! - A 2xx body that is not JSON is `InvalidResponse`

use crate::config::HttpClientConfig;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use skinsight_core::{AnalysisClient, AnalysisError, AnalysisRequest};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Failure to set up the client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("failed to build http client: {0}")]
    Build(#[from] reqwest::Error),
}

/// [`AnalysisClient`] posting `multipart/form-data` to a fixed endpoint
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    client: Client,
    endpoint: Url,
}

impl HttpAnalysisClient {
    pub fn new(config: &HttpClientConfig) -> Result<Self, ClientError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| ClientError::InvalidEndpoint {
            endpoint: config.endpoint.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ClientError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
                reason: format!("unsupported scheme {}", endpoint.scheme()),
            });
        }
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, endpoint })
    }

    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Form with the `image` part first, then the text fields
pub fn build_form(request: &AnalysisRequest) -> Result<Form, AnalysisError> {
    let image = Part::bytes(request.image.jpeg().to_vec())
        .file_name(AnalysisRequest::IMAGE_FILE_NAME)
        .mime_str(AnalysisRequest::IMAGE_MIME)
        .map_err(|e| AnalysisError::Transport(e.to_string()))?;

    Ok(request
        .text_fields()
        .into_iter()
        .fold(Form::new().part("image", image), |form, (name, value)| {
            form.text(name, value)
        }))
}

fn transport(err: reqwest::Error) -> AnalysisError {
    if err.is_timeout() {
        AnalysisError::Transport("The analysis request timed out.".to_string())
    } else {
        AnalysisError::Transport(err.to_string())
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<serde_json::Value, AnalysisError> {
        let form = build_form(request)?;
        let started = Instant::now();
        debug!(
            endpoint = %self.endpoint,
            image_bytes = request.image.byte_len(),
            "posting analysis request"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!(endpoint = %self.endpoint, error = %e, "analysis request failed");
                transport(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if !status.is_success() {
            warn!(status = status.as_u16(), elapsed_ms, "analysis server returned an error");
            return Err(AnalysisError::server(status.as_u16(), body));
        }

        info!(status = status.as_u16(), elapsed_ms, "analysis response received");
        serde_json::from_str(&body).map_err(|e| AnalysisError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_endpoint() {
        let config = HttpClientConfig::new().with_endpoint("/api/analyze");
        assert!(matches!(
            HttpAnalysisClient::new(&config),
            Err(ClientError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn rejects_non_http_scheme() {
        let config = HttpClientConfig::new().with_endpoint("ftp://example.com/analyze");
        let err = HttpAnalysisClient::new(&config).unwrap_err();
        assert!(err.to_string().contains("unsupported scheme ftp"));
    }

    #[test]
    fn accepts_default_endpoint() {
        let client = HttpAnalysisClient::new(&HttpClientConfig::default()).unwrap();
        assert_eq!(client.endpoint().path(), "/api/analyze");
        assert_eq!(client.endpoint().port(), Some(3000));
    }
}
