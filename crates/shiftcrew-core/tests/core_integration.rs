#![allow(clippy::unwrap_used, clippy::expect_used)]

use parking_lot::Mutex;
use shiftcrew_core::event_bus::AGENT_STATUS_TOPIC;
use shiftcrew_core::*;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// 1. Envelopes published on the bus reach subscribers unchanged
// ---------------------------------------------------------------------------

#[test]
fn envelope_published_on_bus_reaches_subscriber() {
    let bus = EventBus::default();
    let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    bus.subscribe(
        AGENT_STATUS_TOPIC,
        Arc::new(move |event: &Event| {
            sink.lock().push(event.payload.to_string());
            Ok(())
        }),
    );

    let update = Envelope::AgentUpdate {
        agent: "demand_forecaster".to_string(),
        status: "analyzing".to_string(),
        progress: 10,
        decision: "Analyzing forecast...".to_string(),
        confidence: 0.0,
        timestamp: chrono::Utc::now(),
    };
    bus.publish(AGENT_STATUS_TOPIC, update.to_value());

    let received = received.lock();
    assert_eq!(received.len(), 1);
    let parsed: Envelope = serde_json::from_str(&received[0]).unwrap();
    assert_eq!(parsed, update);
}

// ---------------------------------------------------------------------------
// 2. History survives subscriber churn and can be wrapped for forwarding
// ---------------------------------------------------------------------------

#[test]
fn history_can_be_replayed_as_topic_events() {
    let bus = EventBus::new(2);
    bus.publish("schedule_changes", serde_json::json!({"shift": "a"}));
    bus.publish("schedule_changes", serde_json::json!({"shift": "b"}));
    bus.publish("schedule_changes", serde_json::json!({"shift": "c"}));

    let wrapped: Vec<serde_json::Value> = bus
        .recent_history("schedule_changes", 10)
        .iter()
        .map(|e| Envelope::topic_event(e).to_value())
        .collect();

    assert_eq!(wrapped.len(), 2);
    assert_eq!(wrapped[0]["type"], "topic_event");
    assert_eq!(wrapped[0]["data"]["shift"], "b");
    assert_eq!(wrapped[1]["data"]["shift"], "c");
}
