//! Tool registry and the tools the agent can invoke.
//!
//! A tool is a named domain operation with a fixed set of required
//! parameters. The registry is built once per domain at startup and only
//! read afterwards, so it is shared across requests behind an `Arc`.

mod student;
mod weather;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::data::{StudentStore, WeatherStore};

/// Error text recorded for calls that fail validation.
pub const INVALID_PARAMETERS: &str = "Invalid parameters for tool call";

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to request this tool.
    fn name(&self) -> &str;

    /// One-line description advertised to the model.
    fn description(&self) -> &str;

    /// Parameters that must be present and non-null.
    fn required_parameters(&self) -> &[&str] {
        &[]
    }

    /// Human-readable parameter signature, e.g. `min: number, max: number`.
    fn parameters_hint(&self) -> &str {
        ""
    }

    /// Run the operation. Errors are reported back to the model, not raised.
    async fn execute(&self, args: &Map<String, Value>) -> anyhow::Result<Value>;
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// What happened when a tool call was attempted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Result(Value),
    Error(String),
}

/// One entry of the per-request trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: String,
    pub parameters: Map<String, Value>,
    #[serde(flatten)]
    pub outcome: ToolOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl ToolResult {
    fn from_call(call: &ToolCall, outcome: ToolOutcome) -> Self {
        Self {
            tool: call.tool.clone(),
            parameters: call.parameters.clone(),
            outcome,
            reasoning: call.reasoning.clone(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Error(_))
    }
}

/// Static description of a registered tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredTool {
    pub name: String,
    pub required_parameters: Vec<String>,
}

/// Information about a tool, for the prompt and the API.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: String,
    pub required: Vec<String>,
}

/// Registry of available tools, in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Weather lookups over the given dataset.
    pub fn weather(store: Arc<WeatherStore>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(weather::FetchWeatherByCity::new(Arc::clone(&store))));
        registry.register(Arc::new(weather::GetCitiesByAqi::new(Arc::clone(&store))));
        registry.register(Arc::new(weather::GetCitiesByTemperatureRange::new(store)));
        registry
    }

    /// Student-record lookups over the given store.
    pub fn students(store: StudentStore) -> Self {
        let mut registry = Self::new();
        for tool in student::all(store) {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool. A tool with the same name replaces the earlier one in place.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn lookup(&self, name: &str) -> Option<RegisteredTool> {
        self.tools.get(name).map(|t| RegisteredTool {
            name: t.name().to_string(),
            required_parameters: t
                .required_parameters()
                .iter()
                .map(|p| p.to_string())
                .collect(),
        })
    }

    /// List all tools in registration order.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_hint().to_string(),
                required: t
                    .required_parameters()
                    .iter()
                    .map(|p| p.to_string())
                    .collect(),
            })
            .collect()
    }

    /// True iff the tool is registered and every required parameter is present and non-null.
    pub fn validate(&self, call: &ToolCall) -> bool {
        match self.tools.get(&call.tool) {
            Some(tool) => tool
                .required_parameters()
                .iter()
                .all(|p| call.parameters.get(*p).is_some_and(|v| !v.is_null())),
            None => false,
        }
    }

    /// Invoke the tool, capturing any failure in the returned result.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.tools.get(&call.tool) else {
            return ToolResult::from_call(call, ToolOutcome::Error(format!("Unknown tool: {}", call.tool)));
        };

        let args = Value::Object(call.parameters.clone());
        tracing::info!(tool = %call.tool, args = %args, "Executing tool");

        let outcome = match tool.execute(&call.parameters).await {
            Ok(value) => ToolOutcome::Result(value),
            Err(e) => {
                tracing::warn!(tool = %call.tool, error = %e, "Tool execution failed");
                ToolOutcome::Error(e.to_string())
            }
        };
        ToolResult::from_call(call, outcome)
    }

    /// Validate, then dispatch or synthesize the invalid-parameters result.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        if !self.validate(call) {
            tracing::warn!(tool = %call.tool, "Invalid tool call");
            return ToolResult::from_call(call, ToolOutcome::Error(INVALID_PARAMETERS.to_string()));
        }
        self.dispatch(call).await
    }
}

// Argument helpers shared by the tool implementations. Models are sloppy
// about JSON types, so numbers and booleans are also accepted as strings.

fn arg<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    args.get(key).filter(|v| !v.is_null())
}

pub(crate) fn arg_str<'a>(args: &'a Map<String, Value>, key: &str) -> anyhow::Result<&'a str> {
    arg(args, key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Missing or non-string '{}' argument", key))
}

pub(crate) fn opt_f64(args: &Map<String, Value>, key: &str) -> anyhow::Result<Option<f64>> {
    match arg(args, key) {
        None => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("'{}' is not a finite number", key)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("'{}' must be a number, got \"{}\"", key, s)),
        Some(other) => Err(anyhow::anyhow!("'{}' must be a number, got {}", key, other)),
    }
}

pub(crate) fn arg_f64(args: &Map<String, Value>, key: &str) -> anyhow::Result<f64> {
    opt_f64(args, key)?.ok_or_else(|| anyhow::anyhow!("Missing '{}' argument", key))
}

pub(crate) fn arg_i64(args: &Map<String, Value>, key: &str) -> anyhow::Result<i64> {
    let n = arg_f64(args, key)?;
    if n.fract() != 0.0 || !n.is_finite() {
        anyhow::bail!("'{}' must be a whole number, got {}", key, n);
    }
    Ok(n as i64)
}

pub(crate) fn arg_bool(args: &Map<String, Value>, key: &str) -> anyhow::Result<bool> {
    match arg(args, key) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(anyhow::anyhow!("'{}' must be a boolean, got \"{}\"", key, s)),
        },
        Some(other) => Err(anyhow::anyhow!("'{}' must be a boolean, got {}", key, other)),
        None => Err(anyhow::anyhow!("Missing '{}' argument", key)),
    }
}
