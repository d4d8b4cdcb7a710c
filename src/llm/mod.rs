//! Language model client abstraction.
//!
//! The agent only needs "prompt text in, reply text out". Anything that can
//! satisfy that contract (a real endpoint, a scripted stub in tests) plugs in
//! through [`LlmClient`].

mod ollama;

use async_trait::async_trait;
use thiserror::Error;

pub use ollama::OllamaClient;

/// Failures talking to the model backend.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network-level failure (connection refused, reset, DNS, ...)
    #[error("model endpoint unreachable: {0}")]
    Transport(String),

    /// Backend answered with a non-success status
    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Backend did not answer in time
    #[error("model request timed out")]
    Timeout,

    /// Body was not the expected shape
    #[error("unexpected model response: {0}")]
    Decode(String),
}

/// A text-generation backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send `prompt` to `model` and return the raw reply text.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError>;

    /// Whether the backend is reachable.
    async fn health_check(&self) -> bool {
        true
    }
}
