//! Prompt construction for the agent loop.
//!
//! The output depends only on its inputs: tools are listed in registry
//! order and JSON is rendered from `serde_json::Map`, whose keys are sorted,
//! so the same (request, trace) always yields the same prompt text.

use std::fmt::Write as _;

use serde_json::Value;

use super::domain::DomainProfile;
use crate::tools::{ToolInfo, ToolOutcome, ToolResult};

/// Build the prompt for one iteration.
pub fn build_prompt(
    profile: &DomainProfile,
    tools: &[ToolInfo],
    user_prompt: &str,
    trace: &[ToolResult],
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", profile.persona);
    let _ = writeln!(
        out,
        "You decide which tools to call to answer the user, then answer once you have the data."
    );
    let _ = writeln!(
        out,
        "Respond with a single JSON object only, no text before or after it.\n"
    );

    out.push_str("## Available Tools\n");
    out.push_str(&format_tool_catalogue(tools));
    out.push('\n');

    out.push_str("## Rules\n");
    for (i, rule) in profile.rules.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, rule);
    }
    let _ = writeln!(
        out,
        "{}. Only call tools from the list above, with every required parameter.",
        profile.rules.len() + 1
    );
    let _ = writeln!(
        out,
        "{}. When the tool results already answer the question, stop calling tools and answer in friendly markdown.\n",
        profile.rules.len() + 2
    );

    out.push_str("## Examples\n");
    for ex in profile.examples {
        let _ = writeln!(out, "Query: \"{}\"\n{}\n", ex.query, ex.reply);
    }

    let _ = writeln!(out, "## User Query\n\"{}\"\n", user_prompt.trim());

    if !trace.is_empty() {
        out.push_str("## Previous Tool Results\n");
        out.push_str(&format_trace(trace));
        out.push('\n');
    }

    out.push_str(
        r#"## Response Format
{
  "needsMoreTools": boolean,
  "toolCalls": [{"tool": "toolName", "parameters": {...}, "reasoning": "why"}],
  "finalResponse": "answer for the user, only when needsMoreTools is false"
}

RESPOND WITH VALID JSON ONLY:"#,
    );

    out
}

/// Numbered tool list, e.g. `1. getCitiesByAQI(threshold: number, isHigher: boolean) - ...`.
pub fn format_tool_catalogue(tools: &[ToolInfo]) -> String {
    tools
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. {}({}) - {}\n", i + 1, t.name, t.parameters, t.description))
        .collect()
}

/// Numbered rendering of the trace so far.
pub fn format_trace(trace: &[ToolResult]) -> String {
    let mut out = String::new();
    for (i, entry) in trace.iter().enumerate() {
        let params = Value::Object(entry.parameters.clone());
        let _ = writeln!(out, "{}. Tool: {}", i + 1, entry.tool);
        let _ = writeln!(out, "   Parameters: {}", params);
        match &entry.outcome {
            ToolOutcome::Result(v) => {
                let pretty = serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string());
                let _ = writeln!(out, "   Result: {}", indent(&pretty, "   "));
            }
            ToolOutcome::Error(e) => {
                let _ = writeln!(out, "   Error: {}", e);
            }
        }
        if let Some(reasoning) = &entry.reasoning {
            let _ = writeln!(out, "   Reasoning: {}", reasoning);
        }
    }
    out
}

/// Indent every line after the first.
fn indent(s: &str, pad: &str) -> String {
    s.lines().collect::<Vec<_>>().join(&format!("\n{}", pad))
}
