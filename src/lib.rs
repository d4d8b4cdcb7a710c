//! # Query Agent
//!
//! A domain-scoped, tool-calling assistant over a local language model.
//!
//! This library provides:
//! - A bounded agent loop that lets a model request domain operations as JSON
//! - Weather and student-record tool sets with validation and dispatch
//! - An HTTP API for chat, tool catalogues and student record management
//! - An Ollama client behind the [`llm::LlmClient`] trait
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Receive a prompt via the API
//! 2. Build a prompt with the persona, tool catalogue and trace so far
//! 3. Call the model, parse its decision, execute any tool calls
//! 4. Feed results back to the model, repeat until it answers or the budget runs out
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use query_agent::{agent::{Agent, Domain}, config::Config, data::WeatherStore, llm::OllamaClient, tools::ToolRegistry};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = Config::from_env()?;
//! let tools = Arc::new(ToolRegistry::weather(Arc::new(WeatherStore::bundled()?)));
//! let agent = Agent::new(Domain::Weather.profile(), Arc::new(OllamaClient::from_config(&config)), tools, &config);
//! let outcome = agent.run("Weather in Mumbai", &config.default_model, &CancellationToken::new()).await?;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod data;
pub mod llm;
pub mod tools;

pub use config::Config;
