//! Configuration validation: URL shape, then a live check against the
//! Groq model listing.
//!
//! The listing endpoint is always the canonical service address, never the
//! user's proxy URL.

use std::time::Instant;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, error};

use super::{ConfigError, SttConfig};
use crate::dispatch::dispatch;

pub const MODELS_URL: &str = "https://api.groq.com/openai/v1/models";

/// Proxy URL must carry an explicit scheme and no trailing slash.
pub fn validate_url(url: &str) -> Result<(), ConfigError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::InvalidUrlFormat(
            "URL must start with http:// or https://",
        ));
    }
    if url.ends_with('/') {
        return Err(ConfigError::InvalidUrlFormat("URL must not end with /"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelDescriptor>,
}

#[derive(Debug, Deserialize)]
struct ModelDescriptor {
    #[serde(default)]
    id: Option<String>,
}

/// Checks a configuration against the remote service before it is accepted.
#[derive(Debug, Clone)]
pub struct ConfigValidator {
    models_url: String,
    client: reqwest::Client,
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self::with_models_url(MODELS_URL)
    }

    /// Point the model listing somewhere else (test servers).
    pub fn with_models_url(models_url: &str) -> Self {
        Self {
            models_url: models_url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn validate(&self, config: &SttConfig) -> Result<(), ConfigError> {
        if let Err(e) = validate_url(&config.url) {
            error!(url = %config.url, "URL validation failed: {}", e);
            return Err(e);
        }

        debug!(?config, "Validating user input");

        let started = Instant::now();
        let request = self
            .client
            .get(&self.models_url)
            .bearer_auth(config.api_key.expose())
            .header(CONTENT_TYPE, "application/json")
            .send();

        let resp = dispatch(request).await.map_err(|e| {
            error!("Connection error: {}", e);
            ConfigError::ConnectionError(e)
        })?;

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            status = resp.status().as_u16(),
            "Model listing request finished"
        );

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => {
                error!("Invalid API key");
                return Err(ConfigError::InvalidApiKey);
            }
            StatusCode::FORBIDDEN => {
                error!("Unauthorized access");
                return Err(ConfigError::Unauthorized);
            }
            other => {
                error!(status = other.as_u16(), "Unknown error");
                return Err(ConfigError::UnknownError(other.as_u16()));
            }
        }

        let models: ModelList = resp.json().await.map_err(|e| {
            error!("Failed to read model listing: {}", e);
            ConfigError::ConnectionError(e.into())
        })?;

        let found = models
            .data
            .iter()
            .any(|m| m.id.as_deref() == Some(config.model.as_str()));
        if !found {
            error!(model = %config.model, "Whisper model not found");
            return Err(ConfigError::ModelNotFound(config.model.clone()));
        }

        debug!("User input validated");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKey, DEFAULT_WHISPER_MODEL};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str) -> SttConfig {
        SttConfig {
            name: "Test".into(),
            url: url.into(),
            api_key: ApiKey::new("gsk_test"),
            model: DEFAULT_WHISPER_MODEL.into(),
            temperature: 0.4,
            prompt: String::new(),
        }
    }

    async fn server_returning(template: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openai/v1/models"))
            .and(header("authorization", "Bearer gsk_test"))
            .respond_with(template)
            .mount(&server)
            .await;
        server
    }

    fn validator_for(server: &MockServer) -> ConfigValidator {
        ConfigValidator::with_models_url(&format!("{}/openai/v1/models", server.uri()))
    }

    #[test]
    fn test_validate_url_shapes() {
        assert!(validate_url("https://api.groq.com").is_ok());
        assert!(validate_url("http://10.0.0.2:8080/gateway").is_ok());
        for bad in ["", "api.groq.com", "ftp://host", "https://host/", "http://"] {
            let err = validate_url(bad).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidUrlFormat(_)),
                "expected InvalidUrlFormat for {:?}",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_bad_url_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = validator_for(&server)
            .validate(&config("https://proxy.example.com/"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrlFormat(_)));
    }

    #[tokio::test]
    async fn test_model_present_ok() {
        let server = server_returning(ResponseTemplate::new(200).set_body_json(
            serde_json::json!({
                "object": "list",
                "data": [
                    {"id": "llama3-8b-8192", "object": "model"},
                    {"id": "whisper-large-v3", "object": "model"}
                ]
            }),
        ))
        .await;

        validator_for(&server)
            .validate(&config("https://proxy.example.com"))
            .await
            .unwrap();
    }

    async fn error_for_status(status: u16) -> ConfigError {
        let server = server_returning(ResponseTemplate::new(status)).await;
        validator_for(&server)
            .validate(&config("https://proxy.example.com"))
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn test_status_mapping() {
        assert!(matches!(error_for_status(401).await, ConfigError::InvalidApiKey));
        assert!(matches!(error_for_status(403).await, ConfigError::Unauthorized));
        assert!(matches!(error_for_status(500).await, ConfigError::UnknownError(500)));
        assert!(matches!(error_for_status(404).await, ConfigError::UnknownError(404)));
    }

    #[tokio::test]
    async fn test_model_missing() {
        let server = server_returning(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"data": [{"id": "distil-whisper"}]})),
        )
        .await;

        let err = validator_for(&server)
            .validate(&config("https://proxy.example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::ModelNotFound(ref m) if m == "whisper-large-v3"));
    }

    #[tokio::test]
    async fn test_unparsable_listing_is_connection_error() {
        let server =
            server_returning(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
                .await;

        let err = validator_for(&server)
            .validate(&config("https://proxy.example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::ConnectionError(_)));
    }

    #[tokio::test]
    async fn test_unreachable_is_connection_error() {
        // Port 9 (discard) on localhost is closed on test machines.
        let validator = ConfigValidator::with_models_url("http://127.0.0.1:9/openai/v1/models");
        let err = validator
            .validate(&config("https://proxy.example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::ConnectionError(_)));
        assert_eq!(err.form_error().code, "connection_error");
    }
}
