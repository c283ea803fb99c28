use super::ReasoningClient;
use crate::profile::AgentProfile;
use async_trait::async_trait;
use parking_lot::Mutex;
use shiftcrew_core::{ShiftCrewError, ShiftCrewResult};
use std::collections::HashMap;
use std::time::Duration;

/// What a [`ScriptedClient`] does when a given agent is called.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Return this text immediately.
    Text(String),
    /// Return this text after a delay.
    Delayed(Duration, String),
    /// Fail with a transport error.
    Fail(String),
    /// Never answer.
    Hang,
}

/// Deterministic offline reasoning client.
///
/// Replies are looked up by [`AgentProfile::key`]; agents without a script get
/// the default reply. Every call is recorded so tests can assert which agents
/// were actually invoked.
pub struct ScriptedClient {
    replies: HashMap<String, ScriptedReply>,
    default: ScriptedReply,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    /// A client that answers every agent with `default`.
    pub fn new(default: ScriptedReply) -> Self {
        Self {
            replies: HashMap::new(),
            default,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Script the reply for one agent key.
    pub fn with_reply(mut self, agent_key: impl Into<String>, reply: ScriptedReply) -> Self {
        self.replies.insert(agent_key.into(), reply);
        self
    }

    /// Canned answers for the standard workforce scheduling agents, written in
    /// the mix of formats real models produce (bare JSON, fenced JSON, prose).
    pub fn workforce() -> Self {
        Self::new(ScriptedReply::Text(
            "{\"status\": \"ok\", \"insights\": \"No specific findings.\"}".to_string(),
        ))
        .with_reply(
            "demand_forecaster",
            ScriptedReply::Text(
                r#"{"department_allocations": {"Sales Floor": {"percentage": 0.45, "reasoning": "Highest walk-in traffic"}, "Customer Service": {"percentage": 0.30, "reasoning": "Returns peak early week"}, "Electronics": {"percentage": 0.25, "reasoning": "Weekend driven"}}, "daily_breakdown": []}"#
                    .to_string(),
            ),
        )
        .with_reply(
            "staff_optimizer",
            ScriptedReply::Text(
                "Here is the proposed schedule:\n```json\n{\"shifts\": [\
                 {\"id\": \"shift_0_sales_morning\", \"employee_id\": \"emp_000\", \"employee_name\": \"Employee 1\", \"department\": \"Sales Floor\", \"day\": \"Monday\", \"start_time\": \"09:00\", \"end_time\": \"17:00\", \"hourly_wage\": 18.5, \"confidence\": 0.9, \"reason\": \"Experienced on the floor\"},\
                 {\"id\": \"shift_0_service_morning\", \"employee_id\": \"emp_001\", \"employee_name\": \"Employee 2\", \"department\": \"Customer Service\", \"day\": 0, \"start_time\": \"09:00\", \"end_time\": \"17:00\", \"hourly_wage\": 19.2, \"confidence\": 0.85, \"reason\": \"Strong service skills\"}\
                 ], \"coverage_score\": 0.9}\n```\nLet me know if you need changes."
                    .to_string(),
            ),
        )
        .with_reply(
            "cost_analyst",
            ScriptedReply::Text(
                "Total weekly labor cost comes to $302.20 with no overtime. Summary: {\"total_cost\": 302.2, \"overtime_cost\": 0.0, \"total_savings\": 45.0, \"cost_per_customer\": 0.04}"
                    .to_string(),
            ),
        )
        .with_reply(
            "compliance_checker",
            ScriptedReply::Text(
                "```\n{\"status\": \"compliant\", \"violations\": []}\n```".to_string(),
            ),
        )
        .with_reply(
            "quality_auditor",
            ScriptedReply::Text(
                r#"{"quality_score": 8.1, "satisfaction_score": 0.87, "recommendations": ["Consider cross-training for flexibility", "Review peak hour coverage"]}"#
                    .to_string(),
            ),
        )
    }

    /// Agent keys called so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of calls made for `agent_key`.
    pub fn call_count(&self, agent_key: &str) -> usize {
        self.calls.lock().iter().filter(|k| *k == agent_key).count()
    }
}

#[async_trait]
impl ReasoningClient for ScriptedClient {
    async fn call(&self, _prompt: &str, agent: &AgentProfile) -> ShiftCrewResult<String> {
        self.calls.lock().push(agent.key.clone());
        let reply = self
            .replies
            .get(&agent.key)
            .unwrap_or(&self.default)
            .clone();
        match reply {
            ScriptedReply::Text(text) => Ok(text),
            ScriptedReply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            ScriptedReply::Fail(msg) => Err(ShiftCrewError::Http(msg)),
            ScriptedReply::Hang => {
                std::future::pending::<()>().await;
                Err(ShiftCrewError::Agent("scripted hang resumed".to_string()))
            }
        }
    }
}
