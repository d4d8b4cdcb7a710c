//! Turns raw model text into a [`LoopDecision`].
//!
//! Models wrap their JSON in prose despite instructions, so the parser looks
//! for the first balanced `{...}` object anywhere in the reply and decodes
//! only that.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::tools::ToolCall;

/// What the model asked for this round.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopDecision {
    /// Run these tools, then ask again. May be empty when every entry was malformed.
    Continue { tool_calls: Vec<ToolCall> },
    /// Done; this is the answer for the user.
    Final { answer: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("no JSON object found in model reply")]
    NoJsonObject,

    #[error("model reply is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("decision object is not a JSON object")]
    NotAnObject,

    #[error("final decision without a finalResponse")]
    MissingFinalResponse,

    #[error("tool decision without a non-empty toolCalls list")]
    MissingToolCalls,
}

/// Return the first balanced `{...}` substring.
///
/// Braces inside JSON string literals do not count. If an opening brace is
/// never closed, scanning resumes from the next one.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(text, start) {
            return Some(&text[start..end]);
        }
        search_from = start + 1;
    }
    None
}

/// Byte index just past the brace that closes the one at `start`.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// JavaScript-style truthiness, which is how models tend to treat flags.
fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Parse a model reply into a decision.
pub fn parse_decision(text: &str) -> Result<LoopDecision, ParseFailure> {
    let raw = extract_json_object(text).ok_or(ParseFailure::NoJsonObject)?;
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ParseFailure::InvalidJson(e.to_string()))?;
    let obj = value.as_object().ok_or(ParseFailure::NotAnObject)?;

    let needs_more_tools = obj.get("needsMoreTools").map_or(false, is_truthy);

    if !needs_more_tools {
        let answer = obj
            .get("finalResponse")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ParseFailure::MissingFinalResponse)?;
        return Ok(LoopDecision::Final {
            answer: answer.to_string(),
        });
    }

    let entries = obj
        .get("toolCalls")
        .and_then(Value::as_array)
        .filter(|a| !a.is_empty())
        .ok_or(ParseFailure::MissingToolCalls)?;

    let tool_calls = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let call = parse_tool_call(entry);
            if call.is_none() {
                tracing::warn!(index, entry = %entry, "Dropping malformed tool call");
            }
            call
        })
        .collect();

    Ok(LoopDecision::Continue { tool_calls })
}

/// One `toolCalls` entry. `None` when it has no usable name or its parameters are not an object.
fn parse_tool_call(entry: &Value) -> Option<ToolCall> {
    let obj = entry.as_object()?;
    let tool = obj
        .get("tool")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_string();

    let parameters = match obj.get("parameters") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return None,
    };

    let reasoning = obj
        .get("reasoning")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(ToolCall {
        tool,
        parameters,
        reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_skips_prose_around_json() {
        let text = "Sure! Here is my answer:\n{\"a\": {\"b\": 1}} hope that helps {x}";
        assert_eq!(extract_json_object(text), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn extract_ignores_braces_in_strings() {
        let text = r#"{"finalResponse": "use } and { freely \" ok"} trailing"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"finalResponse": "use } and { freely \" ok"}"#)
        );
    }

    #[test]
    fn extract_resumes_after_unclosed_brace() {
        assert_eq!(extract_json_object("{ oops {\"k\": 1}"), Some("{\"k\": 1}"));
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("{ never closed"), None);
    }

    #[test]
    fn extract_handles_multibyte_text() {
        let text = "Température 🌡️ → {\"city\": \"Kolkata 34°C\"} ✓";
        assert_eq!(extract_json_object(text), Some("{\"city\": \"Kolkata 34°C\"}"));
    }

    #[test]
    fn final_decision() {
        let d = parse_decision(r#"{"needsMoreTools": false, "finalResponse": "I can only help with X"}"#);
        assert_eq!(
            d,
            Ok(LoopDecision::Final {
                answer: "I can only help with X".to_string()
            })
        );
        // Absent flag counts as false.
        let d = parse_decision(r#"{"finalResponse": "done"}"#);
        assert!(matches!(d, Ok(LoopDecision::Final { .. })));
    }

    #[test]
    fn final_without_text_is_a_failure() {
        assert_eq!(
            parse_decision(r#"{"needsMoreTools": false}"#),
            Err(ParseFailure::MissingFinalResponse)
        );
        assert_eq!(
            parse_decision(r#"{"needsMoreTools": 0, "finalResponse": "  "}"#),
            Err(ParseFailure::MissingFinalResponse)
        );
    }

    #[test]
    fn continue_decision_keeps_order_and_reasoning() {
        let reply = r#"I'll look that up.
{
  "needsMoreTools": true,
  "toolCalls": [
    {"tool": "searchStudentsByName", "parameters": {"name": "Vivek"}, "reasoning": "find id"},
    {"tool": "getTotalStudents"}
  ]
}"#;
        match parse_decision(reply) {
            Ok(LoopDecision::Continue { tool_calls }) => {
                assert_eq!(tool_calls.len(), 2);
                assert_eq!(tool_calls[0].tool, "searchStudentsByName");
                assert_eq!(tool_calls[0].parameters["name"], json!("Vivek"));
                assert_eq!(tool_calls[0].reasoning.as_deref(), Some("find id"));
                assert_eq!(tool_calls[1].tool, "getTotalStudents");
                assert!(tool_calls[1].parameters.is_empty());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn malformed_entries_are_dropped_individually() {
        let reply = r#"{"needsMoreTools": "yes", "toolCalls": [
            {"parameters": {"city": "x"}},
            {"tool": "", "parameters": {}},
            {"tool": "a", "parameters": "city=x"},
            "fetchWeatherByCity",
            {"tool": "fetchWeatherByCity", "parameters": {"city": "delhi"}}
        ]}"#;
        match parse_decision(reply) {
            Ok(LoopDecision::Continue { tool_calls }) => {
                assert_eq!(tool_calls.len(), 1);
                assert_eq!(tool_calls[0].parameters["city"], json!("delhi"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn all_entries_malformed_yields_empty_continue() {
        let d = parse_decision(r#"{"needsMoreTools": true, "toolCalls": [{"reasoning": "?"}]}"#);
        assert_eq!(d, Ok(LoopDecision::Continue { tool_calls: vec![] }));
    }

    #[test]
    fn truthy_flag_without_calls_is_a_failure() {
        assert_eq!(
            parse_decision(r#"{"needsMoreTools": true}"#),
            Err(ParseFailure::MissingToolCalls)
        );
        assert_eq!(
            parse_decision(r#"{"needsMoreTools": 1, "toolCalls": []}"#),
            Err(ParseFailure::MissingToolCalls)
        );
    }

    #[test]
    fn undecodable_replies() {
        assert_eq!(
            parse_decision("The weather in Mumbai is rainy."),
            Err(ParseFailure::NoJsonObject)
        );
        assert!(matches!(
            parse_decision("{needsMoreTools: true}"),
            Err(ParseFailure::InvalidJson(_))
        ));
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("false")));
        assert!(is_truthy(&json!([])));
    }
}
