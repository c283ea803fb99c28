pub mod claude;
pub mod openai;
pub mod scripted;

use crate::config::{LlmProvider, ModelConfig};
use crate::failover::FailoverClient;
use crate::profile::AgentProfile;
use async_trait::async_trait;
use shiftcrew_core::ShiftCrewResult;
use std::sync::Arc;

pub use claude::ClaudeClient;
pub use openai::OpenAiClient;
pub use scripted::{ScriptedClient, ScriptedReply};

/// A single text-completion capability: prompt in, free-form text out.
///
/// Calls may take tens of seconds and may fail with a transport error. Callers
/// bound them with their own timeouts; implementations do not need to.
///
/// To add a new provider:
/// 1. Create a new module in `backends/`
/// 2. Implement `ReasoningClient` for your struct
/// 3. Add the variant to `LlmProvider` in `config.rs`
/// 4. Wire it up in [`build_client`]
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Send `prompt` with `agent` as role context; returns the raw completion text.
    async fn call(&self, prompt: &str, agent: &AgentProfile) -> ShiftCrewResult<String>;
}

fn build_single(config: ModelConfig) -> ShiftCrewResult<Arc<dyn ReasoningClient>> {
    Ok(match config.provider {
        LlmProvider::Claude => Arc::new(ClaudeClient::new(config)?),
        LlmProvider::OpenAi | LlmProvider::OpenRouter | LlmProvider::Groq => {
            Arc::new(OpenAiClient::new(config)?)
        }
        LlmProvider::Scripted => Arc::new(ScriptedClient::workforce()),
    })
}

/// Build the client described by `config`.
///
/// When a retry policy or fallback models are configured the result is a
/// [`FailoverClient`] over the primary followed by each fallback in order.
pub fn build_client(mut config: ModelConfig) -> ShiftCrewResult<Arc<dyn ReasoningClient>> {
    let policy = config.retry_policy.take();
    let fallbacks = std::mem::take(&mut config.fallback_models);

    if policy.is_none() && fallbacks.is_empty() {
        return build_single(config);
    }

    let mut backends = vec![build_single(config)?];
    for fallback in fallbacks {
        backends.push(build_single(fallback)?);
    }
    Ok(Arc::new(FailoverClient::new(
        backends,
        policy.unwrap_or_default(),
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_scripted_client() {
        let client = build_client(ModelConfig::scripted()).unwrap();
        let agent = AgentProfile::new("quality_auditor", "Auditor", "Audit", "");
        let text = client.call("review", &agent).await.unwrap();
        assert!(text.contains("quality_score"));
    }

    #[tokio::test]
    async fn test_build_with_policy_wraps_failover() {
        let mut config = ModelConfig::scripted();
        config.retry_policy = Some(Default::default());
        config.fallback_models.push(ModelConfig::scripted());
        let client = build_client(config).unwrap();
        let agent = AgentProfile::new("demand_forecaster", "Forecaster", "Forecast", "");
        assert!(client.call("p", &agent).await.is_ok());
    }

    #[test]
    fn test_build_missing_key_fails() {
        let mut config = ModelConfig::scripted();
        config.provider = LlmProvider::Claude;
        assert!(build_client(config).is_err());
    }
}
