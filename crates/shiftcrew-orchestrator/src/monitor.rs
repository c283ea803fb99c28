use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What an agent is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// Not part of a running stage.
    Idle,
    /// Waiting on the reasoning service.
    Working,
    /// Its last stage fell back.
    Degraded,
}

/// Cumulative counters for one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Stages run.
    pub stages: u64,
    /// Stages that succeeded.
    pub successes: u64,
    /// Stages that fell back.
    pub fallbacks: u64,
    /// Total wall time in milliseconds.
    pub duration_ms: u64,
}

/// Current state of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Agent key.
    pub agent: String,
    /// Run the agent is currently working on.
    pub current_run: Option<String>,
    /// Current status.
    pub status: WorkerStatus,
    /// Cumulative counters.
    pub metrics: AgentMetrics,
}

impl AgentState {
    fn new(agent: &str) -> Self {
        Self {
            agent: agent.to_string(),
            current_run: None,
            status: WorkerStatus::Idle,
            metrics: AgentMetrics::default(),
        }
    }
}

/// Tracks state and metrics for every agent that has run a stage.
#[derive(Clone, Default)]
pub struct AgentMonitor {
    states: Arc<RwLock<HashMap<String, AgentState>>>,
}

impl AgentMonitor {
    /// A monitor with no agents registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A monitor with `agents` pre-registered as idle.
    pub fn with_agents<'a>(agents: impl IntoIterator<Item = &'a str>) -> Self {
        let states = agents
            .into_iter()
            .map(|a| (a.to_string(), AgentState::new(a)))
            .collect();
        Self {
            states: Arc::new(RwLock::new(states)),
        }
    }

    /// Mark `agent` as working on `run_id`.
    pub async fn start_stage(&self, agent: &str, run_id: &str) {
        let mut states = self.states.write().await;
        let state = states
            .entry(agent.to_string())
            .or_insert_with(|| AgentState::new(agent));
        state.current_run = Some(run_id.to_string());
        state.status = WorkerStatus::Working;
    }

    /// Record the end of a stage for `agent`.
    pub async fn finish_stage(&self, agent: &str, succeeded: bool, duration_ms: u64) {
        let mut states = self.states.write().await;
        let state = states
            .entry(agent.to_string())
            .or_insert_with(|| AgentState::new(agent));
        state.current_run = None;
        state.metrics.stages += 1;
        state.metrics.duration_ms += duration_ms;
        if succeeded {
            state.metrics.successes += 1;
            state.status = WorkerStatus::Idle;
        } else {
            state.metrics.fallbacks += 1;
            state.status = WorkerStatus::Degraded;
        }
    }

    /// Snapshot of all agent states, sorted by agent key.
    pub async fn snapshot(&self) -> Vec<AgentState> {
        let states = self.states.read().await;
        let mut all: Vec<AgentState> = states.values().cloned().collect();
        all.sort_by(|a, b| a.agent.cmp(&b.agent));
        all
    }

    /// State of a specific agent.
    pub async fn get_state(&self, agent: &str) -> Option<AgentState> {
        let states = self.states.read().await;
        states.get(agent).cloned()
    }

    /// Metrics summed across all agents.
    pub async fn aggregate_metrics(&self) -> AgentMetrics {
        let states = self.states.read().await;
        let mut total = AgentMetrics::default();
        for state in states.values() {
            total.stages += state.metrics.stages;
            total.successes += state.metrics.successes;
            total.fallbacks += state.metrics.fallbacks;
            total.duration_ms += state.metrics.duration_ms;
        }
        total
    }

    /// Serialize the current state as JSON (for the platform status endpoint).
    pub async fn to_json(&self) -> serde_json::Value {
        let states = self.snapshot().await;
        let aggregate = self.aggregate_metrics().await;
        serde_json::json!({
            "agents": states,
            "aggregate": aggregate,
        })
    }
}
