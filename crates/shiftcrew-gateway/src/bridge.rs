use crate::connection::ConnectionRegistry;
use shiftcrew_core::event_bus::{AGENT_STATUS_TOPIC, LIVE_EVENTS_TOPIC, SYSTEM_STATUS_TOPIC};
use shiftcrew_core::{Event, EventBus, Subscriber, SubscriptionHandle};
use std::sync::Arc;
use tracing::debug;

/// Topics mirrored to every connection by default.
pub const DEFAULT_BRIDGED_TOPICS: &[&str] =
    &[AGENT_STATUS_TOPIC, SYSTEM_STATUS_TOPIC, LIVE_EVENTS_TOPIC];

/// Mirrors event payloads from selected bus topics to every live connection.
///
/// Payloads on bridged topics are already envelopes (`agent_update`,
/// `system_status`, `data_flow_event`) and are forwarded verbatim.
pub struct ProgressBridge {
    bus: EventBus,
    handles: Vec<SubscriptionHandle>,
}

impl ProgressBridge {
    /// Subscribe to `topics` and start forwarding.
    pub fn attach<S: AsRef<str>>(
        bus: &EventBus,
        registry: Arc<ConnectionRegistry>,
        topics: &[S],
    ) -> Self {
        let handles = topics
            .iter()
            .map(|topic| {
                let registry = registry.clone();
                let forward: Subscriber = Arc::new(move |event: &Event| {
                    let report = registry.broadcast(&event.payload.to_string());
                    debug!(
                        topic = %event.topic,
                        sequence = event.sequence,
                        delivered = report.delivered,
                        failed = report.failed.len(),
                        "Bridged event"
                    );
                    Ok(())
                });
                bus.subscribe(topic.as_ref(), forward)
            })
            .collect();
        Self {
            bus: bus.clone(),
            handles,
        }
    }

    /// Topics being forwarded.
    pub fn topics(&self) -> Vec<&str> {
        self.handles.iter().map(|h| h.topic()).collect()
    }

    /// Stop forwarding.
    pub fn detach(self) {
        for handle in &self.handles {
            self.bus.unsubscribe(handle);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use serde_json::json;

    #[test]
    fn test_bridged_topics_reach_all_connections() {
        let bus = EventBus::default();
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = Connection::channel();
        let (b, mut rx_b) = Connection::channel();
        registry.register(a);
        registry.register(b);

        let bridge = ProgressBridge::attach(&bus, registry.clone(), DEFAULT_BRIDGED_TOPICS);
        assert_eq!(bridge.topics().len(), 3);

        bus.publish(AGENT_STATUS_TOPIC, json!({"type": "agent_update", "progress": 10}));
        bus.publish("employee_updates", json!({"ignored": true}));

        for rx in [&mut rx_a, &mut rx_b] {
            let msg: serde_json::Value =
                serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
            assert_eq!(msg["progress"], 10);
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_detach_stops_forwarding() {
        let bus = EventBus::default();
        let registry = ConnectionRegistry::new();
        let (conn, mut rx) = Connection::channel();
        registry.register(conn);

        let bridge = ProgressBridge::attach(&bus, registry, &["system_status"]);
        bridge.detach();
        assert_eq!(bus.subscriber_count("system_status"), 0);

        bus.publish("system_status", json!({}));
        assert!(rx.try_recv().is_err());
    }
}
