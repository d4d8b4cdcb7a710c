//! Ollama `/api/generate` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{LlmClient, LlmError};
use crate::config::{Config, ModelOptions};

/// Request body for `POST /api/generate`.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Client for a local (or remote) Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    options: ModelOptions,
    timeout: Duration,
}

impl OllamaClient {
    /// Create a client for the given endpoint.
    pub fn new(base_url: impl Into<String>, options: ModelOptions, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            options,
            timeout,
        }
    }

    /// Create a client from application configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.ollama_base_url.clone(),
            config.model_options,
            config.model_timeout,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn classify(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout
    } else if err.is_decode() {
        LlmError::Decode(err.to_string())
    } else {
        LlmError::Transport(err.to_string())
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.options.temperature,
                top_p: self.options.top_p,
            },
        };

        tracing::debug!(model = %model, prompt_len = prompt.len(), "Calling model");

        let resp = self
            .client
            .post(self.url("/api/generate"))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Model endpoint returned an error");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = resp.json().await.map_err(classify)?;
        let text = parsed
            .response
            .ok_or_else(|| LlmError::Decode("missing `response` field".to_string()))?;

        tracing::debug!(reply_len = text.len(), "Model replied");
        Ok(text.trim().to_string())
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.url("/api/tags"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "Model health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = OllamaClient::new(
            "http://localhost:11434/",
            ModelOptions::default(),
            Duration::from_secs(1),
        );
        assert_eq!(client.url("/api/tags"), "http://localhost:11434/api/tags");
    }

    #[test]
    fn generate_request_shape() {
        let body = GenerateRequest {
            model: "llama2",
            prompt: "hi",
            stream: false,
            options: GenerateOptions {
                temperature: 0.5,
                top_p: 0.25,
            },
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["model"], "llama2");
        assert_eq!(v["stream"], false);
        assert_eq!(v["options"]["temperature"], 0.5);
        assert_eq!(v["options"]["top_p"], 0.25);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        // Port 9 (discard) on localhost is not expected to host an HTTP server.
        let client = OllamaClient::new(
            "http://127.0.0.1:9",
            ModelOptions::default(),
            Duration::from_secs(2),
        );
        let err = client.generate("llama2", "hello").await.unwrap_err();
        assert!(matches!(err, LlmError::Transport(_) | LlmError::Timeout));
        assert!(!client.health_check().await);
    }
}
