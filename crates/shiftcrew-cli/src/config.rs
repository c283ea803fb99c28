//! `shiftcrew.toml` configuration.
//!
//! Every section is optional; a missing file yields the offline defaults.

use serde::Deserialize;
use shiftcrew_agent::ModelConfig;
use shiftcrew_core::event_bus::{
    AGENT_STATUS_TOPIC, DEFAULT_HISTORY_CAPACITY, LIVE_EVENTS_TOPIC, SYSTEM_STATUS_TOPIC,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct ShiftCrewConfig {
    #[serde(default = "ModelConfig::scripted")]
    pub model: ModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for ShiftCrewConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::scripted(),
            server: ServerConfig::default(),
            pipeline: PipelineConfig::default(),
            broadcast: BroadcastConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl ShiftCrewConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed browser origins; empty allows any.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
    #[serde(default = "default_global_deadline_secs")]
    pub global_deadline_secs: u64,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl PipelineConfig {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    pub fn global_deadline(&self) -> Duration {
        Duration::from_secs(self.global_deadline_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout_secs(),
            global_deadline_secs: default_global_deadline_secs(),
            history_capacity: default_history_capacity(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BroadcastConfig {
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Zero disables the synthetic live-event feed.
    #[serde(default = "default_live_event_secs")]
    pub live_event_secs: u64,
    #[serde(default = "default_bridged_topics")]
    pub bridged_topics: Vec<String>,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            live_event_secs: default_live_event_secs(),
            bridged_topics: default_bridged_topics(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// Directory for file-backed tables; in-memory when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Size of the demo roster seeded into an empty employees table.
    #[serde(default = "default_roster_size")]
    pub roster_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            roster_size: default_roster_size(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_stage_timeout_secs() -> u64 {
    60
}
fn default_global_deadline_secs() -> u64 {
    180
}
fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}
fn default_heartbeat_secs() -> u64 {
    30
}
fn default_live_event_secs() -> u64 {
    5
}
fn default_bridged_topics() -> Vec<String> {
    [AGENT_STATUS_TOPIC, SYSTEM_STATUS_TOPIC, LIVE_EVENTS_TOPIC]
        .iter()
        .map(ToString::to_string)
        .collect()
}
fn default_roster_size() -> usize {
    30
}
