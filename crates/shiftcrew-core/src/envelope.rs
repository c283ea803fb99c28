use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event_bus::Event;

/// Outbound message envelope sent to connected observers.
///
/// Serialized as a flat JSON object whose `type` field names the variant,
/// e.g. `{"type": "pong", "timestamp": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Sent once when a connection is accepted.
    ConnectionStatus {
        /// Always `"connected"` on accept.
        status: String,
        /// Human readable confirmation.
        message: String,
        /// Identity assigned to the new connection.
        connection_id: String,
    },
    /// Reply to an inbound `ping`.
    Pong {
        /// Server time of the reply.
        timestamp: DateTime<Utc>,
    },
    /// Reply to a malformed or unsupported inbound message.
    Error {
        /// What went wrong.
        message: String,
    },
    /// Confirms a topic subscription.
    Subscribed {
        /// The topic now forwarded to this connection.
        topic: String,
    },
    /// Confirms a topic unsubscription.
    Unsubscribed {
        /// The topic no longer forwarded.
        topic: String,
    },
    /// Reply to an inbound `history` request.
    History {
        /// The topic queried.
        topic: String,
        /// Events in chronological order.
        events: Vec<Event>,
    },
    /// Stage progress reported by the orchestrator.
    AgentUpdate {
        /// Agent key (e.g. `staff_optimizer`, or `system` for run boundaries).
        agent: String,
        /// `starting`, `analyzing`, `completed` or `degraded`.
        status: String,
        /// Coarse run progress, 0 to 100.
        progress: u8,
        /// Short decision or status text.
        decision: String,
        /// Confidence of the stage result, 0.0 until the stage completes.
        confidence: f64,
        /// Time the update was produced.
        timestamp: DateTime<Utc>,
    },
    /// Periodic platform heartbeat.
    SystemStatus {
        /// Status snapshot.
        data: serde_json::Value,
    },
    /// Synthetic live domain event.
    DataFlowEvent {
        /// Event kind, e.g. `employee_clock_in`.
        event: String,
        /// Event body.
        data: serde_json::Value,
    },
    /// Generic wrapper for an event forwarded from a subscribed topic.
    TopicEvent {
        /// Source topic.
        topic: String,
        /// Publication time.
        timestamp: DateTime<Utc>,
        /// Original payload.
        data: serde_json::Value,
    },
}

impl Envelope {
    /// Build an error envelope.
    pub fn error(message: impl Into<String>) -> Self {
        Envelope::Error {
            message: message.into(),
        }
    }

    /// Build a pong envelope stamped with the current time.
    pub fn pong() -> Self {
        Envelope::Pong {
            timestamp: Utc::now(),
        }
    }

    /// Wrap a bus event for delivery to a subscriber connection.
    pub fn topic_event(event: &Event) -> Self {
        Envelope::TopicEvent {
            topic: event.topic.clone(),
            timestamp: event.timestamp,
            data: event.payload.clone(),
        }
    }

    /// The wire `type` tag of this envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::ConnectionStatus { .. } => "connection_status",
            Envelope::Pong { .. } => "pong",
            Envelope::Error { .. } => "error",
            Envelope::Subscribed { .. } => "subscribed",
            Envelope::Unsubscribed { .. } => "unsubscribed",
            Envelope::History { .. } => "history",
            Envelope::AgentUpdate { .. } => "agent_update",
            Envelope::SystemStatus { .. } => "system_status",
            Envelope::DataFlowEvent { .. } => "data_flow_event",
            Envelope::TopicEvent { .. } => "topic_event",
        }
    }

    /// Serialize to a JSON value.
    pub fn to_value(&self) -> serde_json::Value {
        // Serializing a tagged enum of owned JSON-compatible fields cannot fail.
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "type": self.kind() }))
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}
