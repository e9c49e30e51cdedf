//! Remote completion client
//!
//! Thin adapter over the completion and image endpoints. Both calls are a
//! single request/response exchange authenticated with a bearer token; any
//! failure is reported once as a [`ServiceError`] and never retried.

use crate::config::ApiConfig;
use crate::error::{ChatdeckError, Result, ServiceError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub mod credentials;

pub use credentials::{
    CredentialSource, EnvOrKeyringCredential, KeyringCredential, StaticCredential,
};

/// The external completion service as seen by the conversation engine
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Request a text completion for `prompt`
    async fn request_completion(&self, prompt: &str) -> std::result::Result<String, ServiceError>;

    /// Request an image for `prompt`, returning its locator
    async fn request_image(&self, prompt: &str) -> std::result::Result<String, ServiceError>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    image_url: String,
}

/// HTTP implementation of [`CompletionService`]
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use chatdeck::client::{HttpCompletionClient, StaticCredential};
/// use chatdeck::config::ApiConfig;
///
/// let client = HttpCompletionClient::new(
///     ApiConfig::default(),
///     Arc::new(StaticCredential::new("token")),
/// );
/// assert!(client.is_ok());
/// ```
pub struct HttpCompletionClient {
    client: Client,
    config: ApiConfig,
    credentials: Arc<dyn CredentialSource>,
}

impl HttpCompletionClient {
    /// Create a client for the configured endpoints
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: ApiConfig, credentials: Arc<dyn CredentialSource>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("chatdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ChatdeckError::Http)?;

        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<String, ServiceError> {
        let url = self.endpoint(path);
        let mut request = self.client.post(&url).json(body);
        match self.credentials.bearer_token() {
            Some(token) => {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            None => tracing::warn!("No access token available; sending unauthenticated request"),
        }

        tracing::debug!("POST {}", url);
        let response = request.send().await.map_err(|e| {
            tracing::error!("Request to {} failed: {}", url, e);
            ServiceError::Transport(e.to_string())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::error!("{} returned error {}: {}", url, status, text);
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl CompletionService for HttpCompletionClient {
    async fn request_completion(&self, prompt: &str) -> std::result::Result<String, ServiceError> {
        let body = self
            .post(
                &self.config.completion_path,
                &CompletionRequest { message: prompt },
            )
            .await?;
        completion_text(&body)
    }

    async fn request_image(&self, prompt: &str) -> std::result::Result<String, ServiceError> {
        let body = self
            .post(&self.config.image_path, &ImageRequest { prompt })
            .await?;
        let parsed: ImageResponse = serde_json::from_str(&body)
            .map_err(|e| ServiceError::InvalidResponse(format!("image response: {}", e)))?;
        Ok(parsed.image_url)
    }
}

/// Pull the answer out of a completion response body
///
/// A JSON body without a string `response` field is returned verbatim.
fn completion_text(body: &str) -> std::result::Result<String, ServiceError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ServiceError::InvalidResponse(format!("completion response: {}", e)))?;

    match value.get("response").and_then(|r| r.as_str()) {
        Some(text) => Ok(text.to_string()),
        None => Ok(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_text_reads_response_field() {
        assert_eq!(
            completion_text(r#"{"response":"hi there"}"#).unwrap(),
            "hi there"
        );
    }

    #[test]
    fn test_completion_text_falls_back_to_raw_json() {
        let text = completion_text(r#"{"answer":"elsewhere"}"#).unwrap();
        assert_eq!(text, r#"{"answer":"elsewhere"}"#);
    }

    #[test]
    fn test_completion_text_rejects_non_json() {
        let err = completion_text("<html>").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidResponse(_)));
    }

    #[test]
    fn test_endpoint_joins_slashes() {
        let config = ApiConfig {
            base_url: "http://localhost:9000/".to_string(),
            ..ApiConfig::default()
        };
        let client =
            HttpCompletionClient::new(config, Arc::new(StaticCredential::default())).unwrap();
        assert_eq!(
            client.endpoint("/ai_response"),
            "http://localhost:9000/ai_response"
        );
    }
}
