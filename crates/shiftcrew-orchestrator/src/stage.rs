use crate::types::{PipelineContext, PipelineRequest};
use serde_json::{Map, Value};
use shiftcrew_agent::AgentProfile;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Builds a stage prompt from the request and the payloads of earlier stages.
pub type PromptBuilder = Arc<dyn Fn(&PipelineRequest, &PipelineContext) -> String + Send + Sync>;

/// Deterministic payload used when a stage cannot produce one.
pub type FallbackGenerator = Arc<dyn Fn(&PipelineRequest, &PipelineContext) -> Value + Send + Sync>;

/// Validates an extracted payload beyond its required keys. `Err` carries the
/// reason the payload is unusable.
pub type PayloadCheck = Arc<dyn Fn(&Map<String, Value>) -> Result<(), String> + Send + Sync>;

/// Default per-stage timeout.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// One step of the orchestration pipeline.
#[derive(Clone)]
pub struct PipelineStage {
    /// Stage name; also the key of its payload in the context.
    pub name: String,
    /// Agent the stage talks to.
    pub profile: AgentProfile,
    /// Upper bound on the reasoning call.
    pub timeout: Duration,
    /// Confidence reported when the stage succeeds.
    pub confidence: f64,
    /// Run progress (percent) published when the stage starts.
    pub start_progress: u8,
    /// Run progress (percent) published when the stage ends.
    pub end_progress: u8,
    /// Status line published when the stage starts.
    pub start_message: String,
    /// Status line published when the stage succeeds.
    pub done_message: String,
    /// Keys the extracted payload must contain to count as a success.
    pub required_keys: Vec<String>,
    prompt: PromptBuilder,
    fallback: FallbackGenerator,
    check: Option<PayloadCheck>,
}

impl PipelineStage {
    /// A stage with default timeout, full confidence and no required keys.
    pub fn new(
        name: impl Into<String>,
        profile: AgentProfile,
        prompt: PromptBuilder,
        fallback: FallbackGenerator,
    ) -> Self {
        let name = name.into();
        Self {
            start_message: format!("Running {name}..."),
            done_message: format!("{name} completed"),
            name,
            profile,
            timeout: DEFAULT_STAGE_TIMEOUT,
            confidence: 1.0,
            start_progress: 0,
            end_progress: 0,
            required_keys: Vec::new(),
            prompt,
            fallback,
            check: None,
        }
    }

    /// Set the per-stage timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the confidence reported on success.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Set the start and end progress percentages.
    pub fn with_progress(mut self, start: u8, end: u8) -> Self {
        self.start_progress = start.min(100);
        self.end_progress = end.min(100);
        self
    }

    /// Set the start and completion status lines.
    pub fn with_messages(mut self, start: impl Into<String>, done: impl Into<String>) -> Self {
        self.start_message = start.into();
        self.done_message = done.into();
        self
    }

    /// Require these keys in the extracted payload.
    pub fn with_required_keys(mut self, keys: &[&str]) -> Self {
        self.required_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Reject extracted payloads that fail `check`.
    pub fn with_check(mut self, check: PayloadCheck) -> Self {
        self.check = Some(check);
        self
    }

    /// Render the prompt for this run.
    pub fn build_prompt(&self, request: &PipelineRequest, ctx: &PipelineContext) -> String {
        (self.prompt)(request, ctx)
    }

    /// Generate the fallback payload for this run.
    pub fn fallback(&self, request: &PipelineRequest, ctx: &PipelineContext) -> Value {
        (self.fallback)(request, ctx)
    }

    /// First required key missing from `payload`, if any.
    pub fn missing_key(&self, payload: &Map<String, Value>) -> Option<&str> {
        self.required_keys
            .iter()
            .find(|k| !payload.contains_key(k.as_str()))
            .map(String::as_str)
    }

    /// Run the payload check, if any.
    pub fn validate(&self, payload: &Map<String, Value>) -> Result<(), String> {
        match &self.check {
            Some(check) => check(payload),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineStage")
            .field("name", &self.name)
            .field("agent", &self.profile.key)
            .field("timeout", &self.timeout)
            .field("confidence", &self.confidence)
            .field("required_keys", &self.required_keys)
            .field("checked", &self.check.is_some())
            .finish()
    }
}
