use serde::{Deserialize, Serialize};

/// Role context handed to the reasoning service with every prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Short machine key used in progress events, e.g. `staff_optimizer`.
    pub key: String,
    /// Job title the model is asked to play.
    pub role: String,
    /// What the agent is trying to achieve.
    pub goal: String,
    /// Background that shapes the agent's judgement.
    pub backstory: String,
}

impl AgentProfile {
    pub fn new(
        key: impl Into<String>,
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
        }
    }

    /// System prompt rendered from the profile.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are the {}.\nGoal: {}\n\n{}\n\nWhen asked for JSON, respond with a single JSON object.",
            self.role, self.goal, self.backstory
        )
    }
}
