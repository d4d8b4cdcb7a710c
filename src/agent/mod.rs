//! Agent module - the domain-scoped query loop.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Reject prompts with no domain vocabulary (optional pre-filter)
//! 2. Build a prompt from the persona, tool catalogue and trace so far
//! 3. Parse the model's JSON decision out of its reply
//! 4. Execute requested tools in order and append them to the trace
//! 5. Repeat until the model answers or the iteration budget runs out

mod agent_loop;
pub mod domain;
pub mod parser;
pub mod prefilter;
pub mod prompt;

pub use agent_loop::{AbortCause, Agent, AgentError, AgentOutcome, ExhaustReason, RunStatus};
pub use domain::{Domain, DomainProfile};
pub use parser::{parse_decision, LoopDecision, ParseFailure};
pub use prefilter::{Relevance, RelevanceFilter};
pub use prompt::build_prompt;
