//! Reasoning-service clients for the ShiftCrew scheduling agents.
//!
//! Every agent talks to its model through [`ReasoningClient`]: one prompt in,
//! one block of free-form text out. Concrete clients cover the Anthropic
//! Messages API, any OpenAI-compatible chat completions endpoint and a
//! scripted offline client used by tests and demos.

pub mod backends;
pub mod config;
pub mod failover;
pub mod profile;

pub use backends::{
    build_client, ClaudeClient, OpenAiClient, ReasoningClient, ScriptedClient, ScriptedReply,
};
pub use config::{LlmProvider, ModelConfig};
pub use failover::{FailoverClient, RetryPolicy};
pub use profile::AgentProfile;
