use super::*;
use crate::ShiftCrewError;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

fn recorder() -> (Arc<Mutex<Vec<u64>>>, Subscriber) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: Subscriber = Arc::new(move |event: &Event| {
        sink.lock().push(event.payload["n"].as_u64().unwrap_or_default());
        Ok(())
    });
    (seen, callback)
}

#[test]
fn test_publish_delivers_in_order() {
    let bus = EventBus::new(16);
    let (seen_a, cb_a) = recorder();
    let (seen_b, cb_b) = recorder();
    bus.subscribe("schedule_changes", cb_a);
    bus.subscribe("schedule_changes", cb_b);

    for n in 1..=10 {
        bus.publish("schedule_changes", json!({ "n": n }));
    }

    let expected: Vec<u64> = (1..=10).collect();
    assert_eq!(*seen_a.lock(), expected);
    assert_eq!(*seen_b.lock(), expected);
}

#[test]
fn test_topics_are_isolated() {
    let bus = EventBus::new(16);
    let (seen, cb) = recorder();
    bus.subscribe("demand_signals", cb);

    bus.publish("retention_alerts", json!({ "n": 1 }));
    bus.publish("demand_signals", json!({ "n": 2 }));

    assert_eq!(*seen.lock(), vec![2]);
}

#[test]
fn test_history_is_bounded_and_drops_oldest() {
    let bus = EventBus::new(3);
    for n in 1..=5 {
        bus.publish("system_metrics", json!({ "n": n }));
    }

    let history = bus.recent_history("system_metrics", 10);
    let ns: Vec<u64> = history
        .iter()
        .map(|e| e.payload["n"].as_u64().unwrap())
        .collect();
    assert_eq!(ns, vec![3, 4, 5]);
    assert_eq!(bus.history_len("system_metrics"), 3);
    // Sequence numbers keep counting past evictions.
    assert_eq!(history.last().unwrap().sequence, 5);
}

#[test]
fn test_recent_history_limit_is_chronological() {
    let bus = EventBus::default();
    for n in 1..=5 {
        bus.publish("employee_updates", json!({ "n": n }));
    }
    let last_two = bus.recent_history("employee_updates", 2);
    assert_eq!(last_two.len(), 2);
    assert_eq!(last_two[0].payload["n"], 4);
    assert_eq!(last_two[1].payload["n"], 5);

    // Restartable: same answer twice.
    assert_eq!(bus.recent_history("employee_updates", 2), last_two);
    assert!(bus.recent_history("unknown", 5).is_empty());
}

#[test]
fn test_failing_subscriber_does_not_block_others() {
    let bus = EventBus::new(16);
    let failing: Subscriber =
        Arc::new(|_event: &Event| Err(ShiftCrewError::Channel("observer gone".into())));
    let (seen, cb) = recorder();

    bus.subscribe("live_events", failing);
    bus.subscribe("live_events", cb);

    bus.publish("live_events", json!({ "n": 7 }));
    bus.publish("live_events", json!({ "n": 8 }));

    assert_eq!(*seen.lock(), vec![7, 8]);
    assert_eq!(bus.subscriber_count("live_events"), 2);
}

#[test]
fn test_panicking_subscriber_does_not_block_others() {
    let bus = EventBus::new(16);
    let panicking: Subscriber = Arc::new(|event: &Event| {
        if event.payload["n"] == 1 {
            panic!("observer crashed");
        }
        Ok(())
    });
    let (seen, cb) = recorder();

    bus.subscribe("agent_status", panicking);
    bus.subscribe("agent_status", cb);

    let first = bus.publish("agent_status", json!({ "n": 1 }));
    let second = bus.publish("agent_status", json!({ "n": 2 }));

    assert_eq!(*seen.lock(), vec![1, 2]);
    assert_eq!((first.sequence, second.sequence), (1, 2));
    assert_eq!(bus.history_len("agent_status"), 2);
}

#[test]
fn test_unsubscribe_drops_unused_topic() {
    let bus = EventBus::new(16);
    bus.create_topic("agent_status");

    let (_, cb) = recorder();
    let handle = bus.subscribe("no_such_topic_1", cb.clone());
    assert!(bus.topics().contains(&"no_such_topic_1".to_string()));
    assert!(bus.unsubscribe(&handle));
    assert_eq!(bus.topics(), vec!["agent_status".to_string()]);

    // Declared topics and topics with history survive their last subscriber.
    let declared = bus.subscribe("agent_status", cb.clone());
    assert!(bus.unsubscribe(&declared));
    bus.publish("live_events", json!({ "n": 1 }));
    let published = bus.subscribe("live_events", cb);
    assert!(bus.unsubscribe(&published));
    assert_eq!(
        bus.topics(),
        vec!["agent_status".to_string(), "live_events".to_string()]
    );
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let bus = EventBus::new(16);
    let (seen, cb) = recorder();
    let handle = bus.subscribe("agent_status", cb);

    bus.publish("agent_status", json!({ "n": 1 }));
    assert!(bus.unsubscribe(&handle));
    assert!(!bus.unsubscribe(&handle));
    bus.publish("agent_status", json!({ "n": 2 }));

    assert_eq!(*seen.lock(), vec![1]);
    assert_eq!(handle.topic(), "agent_status");
}

#[test]
fn test_unsubscribe_during_delivery_is_safe() {
    let bus = EventBus::new(16);
    let handle_slot: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));

    let bus_inner = bus.clone();
    let slot = handle_slot.clone();
    let self_removing: Subscriber = Arc::new(move |_event: &Event| {
        if let Some(handle) = slot.lock().take() {
            bus_inner.unsubscribe(&handle);
        }
        Ok(())
    });
    let handle = bus.subscribe("schedule_changes", self_removing);
    *handle_slot.lock() = Some(handle);

    let (seen, cb) = recorder();
    bus.subscribe("schedule_changes", cb);

    bus.publish("schedule_changes", json!({ "n": 1 }));
    bus.publish("schedule_changes", json!({ "n": 2 }));

    // The second subscriber saw both events; the first removed itself.
    assert_eq!(*seen.lock(), vec![1, 2]);
    assert_eq!(bus.subscriber_count("schedule_changes"), 1);
}

#[test]
fn test_subscriber_may_publish_reentrantly() {
    let bus = EventBus::new(16);
    let bus_inner = bus.clone();
    let relay: Subscriber = Arc::new(move |event: &Event| {
        bus_inner.publish("demand_signals", event.payload.clone());
        Ok(())
    });
    bus.subscribe("employee_updates", relay);

    bus.publish("employee_updates", json!({ "n": 3 }));
    assert_eq!(bus.history_len("demand_signals"), 1);
}

#[tokio::test]
async fn test_concurrent_publishers_keep_per_topic_order() {
    let bus = EventBus::new(1000);
    let (seen, cb) = recorder();
    bus.subscribe("live_events", cb);

    let mut handles = Vec::new();
    for worker in 0..4u64 {
        let bus = bus.clone();
        handles.push(tokio::spawn(async move {
            for n in 0..50u64 {
                bus.publish("live_events", json!({ "n": worker * 1000 + n }));
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Delivery order equals history (publish) order.
    let history: Vec<u64> = bus
        .recent_history("live_events", 1000)
        .iter()
        .map(|e| e.payload["n"].as_u64().unwrap())
        .collect();
    assert_eq!(*seen.lock(), history);
    assert_eq!(history.len(), 200);
}

#[test]
fn test_topics_listing() {
    let bus = EventBus::new(4);
    for topic in DEFAULT_TOPICS {
        bus.create_topic(topic);
    }
    let topics = bus.topics();
    assert_eq!(topics.len(), DEFAULT_TOPICS.len());
    assert!(topics.contains(&AGENT_STATUS_TOPIC.to_string()));
    assert_eq!(bus.total_events(), 0);
}
