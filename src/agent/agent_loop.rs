//! Core agent loop implementation.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::llm::{LlmClient, LlmError};
use crate::tools::{ToolRegistry, ToolResult};

use super::domain::DomainProfile;
use super::parser::{parse_decision, LoopDecision};
use super::prefilter::RelevanceFilter;
use super::prompt::build_prompt;

/// What stopped a run before it could finish.
#[derive(Debug, Error)]
pub enum AbortCause {
    #[error("model call failed: {0}")]
    Model(LlmError),

    #[error("model call exceeded {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,
}

/// A hard failure, with whatever the run had done by then.
///
/// Unparseable replies, bad tool calls, failing tools and an exhausted
/// budget are not errors; they come back as an [`AgentOutcome`].
#[derive(Debug, Error)]
#[error("{cause}")]
pub struct AgentError {
    pub cause: AbortCause,
    pub model: String,
    /// Model calls started, including the one that failed.
    pub iterations: usize,
    /// Tool calls completed before the failure.
    pub trace: Vec<ToolResult>,
}

impl AgentError {
    pub fn tools_used(&self) -> usize {
        self.trace.len()
    }

    pub fn message(&self) -> String {
        match &self.cause {
            AbortCause::Model(e) => format!("The model could not be reached: {}", e),
            AbortCause::Timeout(d) => {
                format!("The model did not answer within {} seconds.", d.as_secs_f32())
            }
            AbortCause::Cancelled => "The request was cancelled.".to_string(),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The model produced a final answer.
    Finished,
    /// The pre-filter judged the prompt off-topic; the model was never called.
    Declined,
    /// Stopped without an answer; the trace shows what was tried.
    Exhausted,
}

/// Why a run was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustReason {
    UnparseableReply,
    NoValidToolCalls,
    IterationBudget,
}

/// Structured result of one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentOutcome {
    pub status: RunStatus,
    pub success: bool,
    /// Final answer text, when successful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Explanation, when not successful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exhaust_reason: Option<ExhaustReason>,
    pub model: String,
    /// Model calls made.
    pub iterations: usize,
    /// Tool calls attempted, valid or not.
    pub tools_used: usize,
    pub in_domain: bool,
    pub trace: Vec<ToolResult>,
}

impl AgentOutcome {
    fn finished(model: &str, answer: String, iterations: usize, trace: Vec<ToolResult>) -> Self {
        Self {
            status: RunStatus::Finished,
            success: true,
            response: Some(answer),
            message: None,
            exhaust_reason: None,
            model: model.to_string(),
            iterations,
            tools_used: trace.len(),
            in_domain: true,
            trace,
        }
    }

    fn declined(model: &str, message: &str) -> Self {
        Self {
            status: RunStatus::Declined,
            success: true,
            response: Some(message.to_string()),
            message: None,
            exhaust_reason: None,
            model: model.to_string(),
            iterations: 0,
            tools_used: 0,
            in_domain: false,
            trace: Vec::new(),
        }
    }

    fn exhausted(
        model: &str,
        reason: ExhaustReason,
        iterations: usize,
        max_iterations: usize,
        trace: Vec<ToolResult>,
    ) -> Self {
        let message = match reason {
            ExhaustReason::UnparseableReply => {
                "The model reply could not be interpreted as a tool request or a final answer."
                    .to_string()
            }
            ExhaustReason::NoValidToolCalls => {
                "The model asked for tools but none of the requests were well-formed.".to_string()
            }
            ExhaustReason::IterationBudget => format!(
                "Maximum iterations ({}) reached without generating a final response.",
                max_iterations
            ),
        };
        Self {
            status: RunStatus::Exhausted,
            success: false,
            response: None,
            message: Some(message),
            exhaust_reason: Some(reason),
            model: model.to_string(),
            iterations,
            tools_used: trace.len(),
            in_domain: true,
            trace,
        }
    }
}

/// The tool-calling agent for one domain.
pub struct Agent {
    profile: DomainProfile,
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    prefilter: Option<RelevanceFilter>,
    max_iterations: usize,
    model_timeout: Duration,
}

impl Agent {
    /// Create an agent with loop limits taken from `config`.
    pub fn new(
        profile: DomainProfile,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        config: &Config,
    ) -> Self {
        let prefilter = if config.prefilter_enabled {
            build_prefilter(&profile)
        } else {
            None
        };
        Self {
            profile,
            llm,
            tools,
            prefilter,
            max_iterations: config.max_iterations.max(1),
            model_timeout: config.model_timeout,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Send every prompt to the model, even ones without domain keywords.
    pub fn without_prefilter(mut self) -> Self {
        self.prefilter = None;
        self
    }

    pub fn profile(&self) -> &DomainProfile {
        &self.profile
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Answer `prompt` with `model`.
    ///
    /// Only model transport failures, deadline expiry and cancellation are
    /// errors, and they still carry the trace gathered so far.
    pub async fn run(
        &self,
        prompt: &str,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentOutcome, AgentError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "agent_run",
            domain = %self.profile.domain,
            %request_id,
            model = %model
        );
        self.run_loop(prompt, model, cancel).instrument(span).await
    }

    async fn run_loop(
        &self,
        prompt: &str,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentOutcome, AgentError> {
        tracing::info!(prompt = %truncate_for_log(prompt, 200), "Starting agent run");

        if let Some(filter) = &self.prefilter {
            let relevance = filter.check(prompt);
            if !relevance.relevant {
                tracing::info!(
                    confidence = relevance.confidence,
                    "Prompt has no domain keywords, declining without calling the model"
                );
                return Ok(AgentOutcome::declined(model, self.profile.decline_message));
            }
            tracing::debug!(confidence = relevance.confidence, "Prompt passed relevance check");
        }

        let catalogue = self.tools.list_tools();
        let mut trace: Vec<ToolResult> = Vec::new();

        for iteration in 1..=self.max_iterations {
            tracing::debug!("Agent iteration {}/{}", iteration, self.max_iterations);

            let text = build_prompt(&self.profile, &catalogue, prompt, &trace);
            let reply = match self.call_model(model, &text, cancel).await {
                Ok(reply) => reply,
                Err(cause) => return Err(abort(cause, model, iteration, trace)),
            };

            let decision = match parse_decision(&reply) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(
                        iteration,
                        error = %e,
                        reply = %truncate_for_log(&reply, 500),
                        "Could not parse model reply"
                    );
                    return Ok(AgentOutcome::exhausted(
                        model,
                        ExhaustReason::UnparseableReply,
                        iteration,
                        self.max_iterations,
                        trace,
                    ));
                }
            };

            let tool_calls = match decision {
                LoopDecision::Final { answer } => {
                    tracing::info!(iteration, tools_used = trace.len(), "Final response generated");
                    return Ok(AgentOutcome::finished(model, answer, iteration, trace));
                }
                LoopDecision::Continue { tool_calls } if tool_calls.is_empty() => {
                    tracing::warn!(iteration, "No valid tool calls provided");
                    return Ok(AgentOutcome::exhausted(
                        model,
                        ExhaustReason::NoValidToolCalls,
                        iteration,
                        self.max_iterations,
                        trace,
                    ));
                }
                LoopDecision::Continue { tool_calls } => tool_calls,
            };

            tracing::info!(iteration, count = tool_calls.len(), "Executing tool calls");

            // One at a time; the trace follows request order.
            for call in &tool_calls {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::info!(iteration, "Run cancelled during tool execution");
                        return Err(abort(AbortCause::Cancelled, model, iteration, trace));
                    }
                    r = self.tools.execute(call) => r,
                };
                tracing::debug!(
                    tool = %result.tool,
                    error = result.is_error(),
                    "Tool call recorded"
                );
                trace.push(result);
            }
        }

        tracing::warn!(
            max_iterations = self.max_iterations,
            tools_used = trace.len(),
            "Maximum iterations reached"
        );
        Ok(AgentOutcome::exhausted(
            model,
            ExhaustReason::IterationBudget,
            self.max_iterations,
            self.max_iterations,
            trace,
        ))
    }

    async fn call_model(
        &self,
        model: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AbortCause> {
        let call = tokio::time::timeout(self.model_timeout, self.llm.generate(model, prompt));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Run cancelled while waiting for the model");
                Err(AbortCause::Cancelled)
            }
            res = call => match res {
                Ok(Ok(reply)) => Ok(reply),
                Ok(Err(LlmError::Timeout)) | Err(_) => {
                    tracing::error!(timeout = ?self.model_timeout, "Model call timed out");
                    Err(AbortCause::Timeout(self.model_timeout))
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Model call failed");
                    Err(AbortCause::Model(e))
                }
            },
        }
    }
}

fn abort(cause: AbortCause, model: &str, iterations: usize, trace: Vec<ToolResult>) -> AgentError {
    tracing::warn!(iterations, tools_used = trace.len(), cause = %cause, "Agent run aborted");
    AgentError {
        cause,
        model: model.to_string(),
        iterations,
        trace,
    }
}

fn build_prefilter(profile: &DomainProfile) -> Option<RelevanceFilter> {
    match RelevanceFilter::new(profile.keywords) {
        Ok(filter) => Some(filter),
        Err(e) => {
            tracing::warn!(error = %e, "Could not build relevance filter; every prompt goes to the model");
            None
        }
    }
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated]", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("34°C today", 3), "34... [truncated]");
    }

    #[test]
    fn abort_message_names_the_deadline() {
        let err = abort(
            AbortCause::Timeout(Duration::from_secs(120)),
            "llama2",
            2,
            Vec::new(),
        );
        assert_eq!(err.message(), "The model did not answer within 120 seconds.");
        assert_eq!(err.to_string(), "model call exceeded 120s");
        assert_eq!(err.iterations, 2);
        assert_eq!(err.tools_used(), 0);
    }

    #[test]
    fn exhausted_outcome_serializes_reason() {
        let outcome =
            AgentOutcome::exhausted("llama2", ExhaustReason::IterationBudget, 5, 5, Vec::new());
        let v = serde_json::to_value(&outcome).unwrap();
        assert_eq!(v["status"], "exhausted");
        assert_eq!(v["exhaust_reason"], "iteration_budget");
        assert_eq!(v["success"], false);
        assert!(v.get("response").is_none());
        assert!(v["message"].as_str().unwrap().contains("Maximum iterations (5)"));
    }
}
