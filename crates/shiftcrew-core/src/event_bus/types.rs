use crate::ShiftCrewResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Topic carrying orchestrator stage progress (`agent_update` envelopes).
pub const AGENT_STATUS_TOPIC: &str = "agent_status";
/// Topic carrying periodic heartbeat snapshots.
pub const SYSTEM_STATUS_TOPIC: &str = "system_status";
/// Topic carrying synthetic live domain events.
pub const LIVE_EVENTS_TOPIC: &str = "live_events";
/// Topic carrying platform log entries.
pub const SYSTEM_METRICS_TOPIC: &str = "system_metrics";

/// Topics created when the platform starts.
pub const DEFAULT_TOPICS: &[&str] = &[
    "employee_updates",
    "schedule_changes",
    "demand_signals",
    "retention_alerts",
    SYSTEM_METRICS_TOPIC,
    AGENT_STATUS_TOPIC,
    SYSTEM_STATUS_TOPIC,
    LIVE_EVENTS_TOPIC,
];

/// A single published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Topic the event was published on.
    pub topic: String,
    /// Per-topic publish counter, starting at 1.
    pub sequence: u64,
    /// Publication time.
    pub timestamp: DateTime<Utc>,
    /// Event body.
    pub payload: serde_json::Value,
}

/// Callback invoked synchronously for every event on a subscribed topic.
///
/// Returning an error only logs; it never stops delivery to other subscribers.
pub type Subscriber = Arc<dyn Fn(&Event) -> ShiftCrewResult<()> + Send + Sync>;

/// Identifies one registration made with [`EventBus::subscribe`](super::EventBus::subscribe).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub(crate) topic: String,
    pub(crate) id: u64,
}

impl SubscriptionHandle {
    /// The topic this subscription listens on.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}
