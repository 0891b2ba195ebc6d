//! agentyard-llm — the AI adapter boundary. The model backend itself
//! is out of scope here; this crate only defines the trait the core
//! consumes and ships two implementations of it.

pub mod anthropic;
pub mod provider;
pub mod scripted;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use provider::{LlmError, LlmProvider, LlmResult, LlmStream};
pub use scripted::{ScriptedProvider, ScriptedTurn};
pub use types::*;
