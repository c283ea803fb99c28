use crate::failover::RetryPolicy;
use serde::{Deserialize, Serialize};
use shiftcrew_core::{ShiftCrewError, ShiftCrewResult};

/// Which reasoning service the client talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Claude,
    OpenAi,
    OpenRouter,
    /// Groq cloud inference (OpenAI-compatible API).
    Groq,
    /// Canned offline responses; no network access.
    Scripted,
}

/// Connection settings for the reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: LlmProvider,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Literal API key. Takes precedence over `api_key_env`.
    #[serde(default)]
    pub api_key: String,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    pub api_base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
    /// Backends tried in order when the primary keeps failing.
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
}

fn default_model_id() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

impl ModelConfig {
    /// Offline configuration backed by the scripted client.
    pub fn scripted() -> Self {
        Self {
            provider: LlmProvider::Scripted,
            model_id: "scripted".to_string(),
            api_key: String::new(),
            api_key_env: None,
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            retry_policy: None,
            fallback_models: Vec::new(),
        }
    }

    /// API root without a trailing slash.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url.trim_end_matches('/')
        } else {
            match self.provider {
                LlmProvider::Claude => "https://api.anthropic.com",
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
                LlmProvider::Scripted => "local://scripted",
            }
        }
    }

    /// The API key, read from `api_key` or the `api_key_env` variable.
    pub fn resolve_api_key(&self) -> ShiftCrewResult<String> {
        if !self.api_key.is_empty() {
            return Ok(self.api_key.clone());
        }
        if self.provider == LlmProvider::Scripted {
            return Ok(String::new());
        }
        match &self.api_key_env {
            Some(var) => std::env::var(var).map_err(|_| {
                ShiftCrewError::Config(format!("environment variable {var} is not set"))
            }),
            None => Err(ShiftCrewError::Config(
                "model.api_key or model.api_key_env must be set".to_string(),
            )),
        }
    }
}
