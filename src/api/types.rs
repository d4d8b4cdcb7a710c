//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::agent::{AgentError, AgentOutcome, RunStatus};
use crate::tools::ToolResult;

/// Request to ask a domain agent a question.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The user prompt
    pub prompt: String,

    /// Optional model override (uses default if not specified)
    #[serde(default)]
    pub model: Option<String>,
}

/// Result of one chat request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub success: bool,

    pub status: RunStatus,

    /// Final answer (also set for declined prompts)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Why no answer was produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub model: String,

    /// Model calls made
    pub iterations: usize,

    /// Tool calls attempted
    pub tools_used: usize,

    pub in_domain: bool,

    /// Every attempted tool call, in order
    pub tool_results: Vec<ToolResult>,

    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

impl From<AgentOutcome> for ChatResponse {
    fn from(outcome: AgentOutcome) -> Self {
        Self {
            success: outcome.success,
            status: outcome.status,
            response: outcome.response,
            message: outcome.message,
            model: outcome.model,
            iterations: outcome.iterations,
            tools_used: outcome.tools_used,
            in_domain: outcome.in_domain,
            tool_results: outcome.trace,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Body of a chat request the agent could not complete (502/504).
#[derive(Debug, Clone, Serialize)]
pub struct ChatErrorResponse {
    pub success: bool,

    /// Underlying cause
    pub error: String,

    /// Explanation for the user
    pub message: String,

    pub model: String,

    /// Model calls started, including the failed one
    pub iterations: usize,

    /// Tool calls completed before the failure
    pub tools_used: usize,

    pub tool_results: Vec<ToolResult>,

    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

impl From<AgentError> for ChatErrorResponse {
    fn from(err: AgentError) -> Self {
        Self {
            success: false,
            error: err.to_string(),
            message: err.message(),
            tools_used: err.tools_used(),
            model: err.model,
            iterations: err.iterations,
            tool_results: err.trace,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Whether the model endpoint answered
    pub model_backend_reachable: bool,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
