use super::ReasoningClient;
use crate::config::{LlmProvider, ModelConfig};
use crate::profile::AgentProfile;
use async_trait::async_trait;
use shiftcrew_core::{ShiftCrewError, ShiftCrewResult};
use tracing::debug;

/// OpenAI-compatible chat completions client.
///
/// Works with OpenAI, OpenRouter, Groq, Ollama, and any other provider
/// that implements the OpenAI chat completions API.
pub struct OpenAiClient {
    config: ModelConfig,
    api_key: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client; fails when no API key can be resolved.
    pub fn new(config: ModelConfig) -> ShiftCrewResult<Self> {
        let api_key = config.resolve_api_key()?;
        Ok(Self {
            config,
            api_key,
            http: reqwest::Client::new(),
        })
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");

        // OpenRouter requires extra headers
        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request
                .header("HTTP-Referer", "https://github.com/shiftcrew/shiftcrew")
                .header("X-Title", "ShiftCrew")
        } else {
            request
        }
    }
}

#[async_trait]
impl ReasoningClient for OpenAiClient {
    async fn call(&self, prompt: &str, agent: &AgentProfile) -> ShiftCrewResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());

        let body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [
                { "role": "system", "content": agent.system_prompt() },
                { "role": "user", "content": prompt },
            ],
        });

        debug!(agent = %agent.key, url = %url, "Sending chat completion");

        let resp = self
            .add_provider_headers(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ShiftCrewError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ShiftCrewError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(ShiftCrewError::Http(format!(
                "OpenAI API error {status}: {resp_body}"
            )));
        }

        parse_openai_response(&resp_body)
    }
}

/// Extract the assistant text from a chat completions response body.
pub fn parse_openai_response(body: &serde_json::Value) -> ShiftCrewResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            ShiftCrewError::Agent(format!("completion response has no message content: {body}"))
        })
}
