use super::ReasoningClient;
use crate::config::ModelConfig;
use crate::profile::AgentProfile;
use async_trait::async_trait;
use shiftcrew_core::{ShiftCrewError, ShiftCrewResult};
use tracing::debug;

/// Claude (Anthropic) Messages API client.
pub struct ClaudeClient {
    config: ModelConfig,
    api_key: String,
    http: reqwest::Client,
}

impl ClaudeClient {
    /// Create a client; fails when no API key can be resolved.
    pub fn new(config: ModelConfig) -> ShiftCrewResult<Self> {
        let api_key = config.resolve_api_key()?;
        Ok(Self {
            config,
            api_key,
            http: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl ReasoningClient for ClaudeClient {
    async fn call(&self, prompt: &str, agent: &AgentProfile) -> ShiftCrewResult<String> {
        let url = format!("{}/v1/messages", self.config.base_url());

        let body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "system": agent.system_prompt(),
            "messages": [{ "role": "user", "content": prompt }],
        });

        debug!(agent = %agent.key, url = %url, "Sending messages request");

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
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
                "Claude API error {status}: {resp_body}"
            )));
        }

        parse_claude_response(&resp_body)
    }
}

/// Concatenate the text blocks of a Messages API response.
pub fn parse_claude_response(body: &serde_json::Value) -> ShiftCrewResult<String> {
    let blocks = body["content"].as_array().ok_or_else(|| {
        ShiftCrewError::Agent(format!("messages response has no content: {body}"))
    })?;
    let text: Vec<&str> = blocks
        .iter()
        .filter(|b| b["type"] == "text")
        .filter_map(|b| b["text"].as_str())
        .collect();
    if text.is_empty() {
        return Err(ShiftCrewError::Agent(
            "messages response has no text blocks".to_string(),
        ));
    }
    Ok(text.join("\n"))
}
