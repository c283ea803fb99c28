//! EventBus - topic-keyed publish/subscribe for orchestrator progress and
//! platform events.
//!
//! Every topic keeps a bounded ring buffer of recent events so late observers
//! can catch up with [`EventBus::recent_history`], and every publish is
//! delivered synchronously to the topic's current subscribers.

/// Core event bus implementation.
pub mod bus;
/// Event, subscriber and topic definitions.
pub mod types;

pub use bus::{EventBus, DEFAULT_HISTORY_CAPACITY};
pub use types::{
    Event, Subscriber, SubscriptionHandle, AGENT_STATUS_TOPIC, DEFAULT_TOPICS,
    LIVE_EVENTS_TOPIC, SYSTEM_METRICS_TOPIC, SYSTEM_STATUS_TOPIC,
};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
