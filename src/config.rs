//! Configuration management for the query agent.
//!
//! Configuration can be set via environment variables:
//! - `OLLAMA_BASE_URL` - Optional. Model endpoint. Defaults to `http://localhost:11434`.
//! - `DEFAULT_MODEL` - Optional. Model used when a request names none. Defaults to `llama2`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `MAX_ITERATIONS` - Optional. Maximum agent loop iterations. Defaults to `5`.
//! - `MODEL_TIMEOUT_SECS` - Optional. Deadline for a single model call. Defaults to `120`.
//! - `MODEL_TEMPERATURE` - Optional. Sampling temperature. Defaults to `0.1`.
//! - `MODEL_TOP_P` - Optional. Nucleus sampling. Defaults to `0.9`.
//! - `PREFILTER_ENABLED` - Optional. Keyword pre-filter before the loop. Defaults to `true`.
//! - `STUDENT_DB_PATH` - Optional. SQLite file for student records. In-memory when unset.
//! - `SEED_STUDENTS` - Optional. Seed demo records into an empty database. Defaults to `true`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Sampling options forwarded to the model backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelOptions {
    /// Lower values keep JSON replies consistent
    pub temperature: f32,

    pub top_p: f32,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
        }
    }
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Ollama-compatible model endpoint
    pub ollama_base_url: String,

    /// Default model identifier
    pub default_model: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum iterations for the agent loop
    pub max_iterations: usize,

    /// Deadline applied to every model call
    pub model_timeout: Duration,

    /// Sampling options
    pub model_options: ModelOptions,

    /// Whether the keyword pre-filter may short-circuit obviously off-topic prompts
    pub prefilter_enabled: bool,

    /// SQLite database for student records (`None` = in-memory)
    pub student_db_path: Option<PathBuf>,

    /// Seed demo student records when the database is empty
    pub seed_students: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when a variable is set but cannot be parsed,
    /// or when `MAX_ITERATIONS` is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let ollama_base_url = std::env::var("OLLAMA_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());

        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| "llama2".to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env_parse("PORT", 3000u16)?;

        let max_iterations = env_parse("MAX_ITERATIONS", 5usize)?;
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let model_timeout = Duration::from_secs(env_parse("MODEL_TIMEOUT_SECS", 120u64)?);

        let model_options = ModelOptions {
            temperature: env_parse("MODEL_TEMPERATURE", 0.1f32)?,
            top_p: env_parse("MODEL_TOP_P", 0.9f32)?,
        };

        let prefilter_enabled = env_bool("PREFILTER_ENABLED", true)?;
        let seed_students = env_bool("SEED_STUDENTS", true)?;

        let student_db_path = std::env::var("STUDENT_DB_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            ollama_base_url,
            default_model,
            host,
            port,
            max_iterations,
            model_timeout,
            model_options,
            prefilter_enabled,
            student_db_path,
            seed_students,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(ollama_base_url: String, default_model: String) -> Self {
        Self {
            ollama_base_url,
            default_model,
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_iterations: 5,
            model_timeout: Duration::from_secs(120),
            model_options: ModelOptions::default(),
            prefilter_enabled: true,
            student_db_path: None,
            seed_students: true,
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    std::env::var(key)
        .ok()
        .map(|v| parse_bool(&v).map_err(|e| ConfigError::InvalidValue(key.to_string(), e)))
        .transpose()
        .map(|v| v.unwrap_or(default))
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}
