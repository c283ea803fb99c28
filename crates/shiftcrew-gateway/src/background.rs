//! Periodic publishers started alongside the server.

use crate::connection::ConnectionRegistry;
use chrono::Utc;
use serde_json::{json, Value};
use shiftcrew_core::event_bus::{LIVE_EVENTS_TOPIC, SYSTEM_METRICS_TOPIC, SYSTEM_STATUS_TOPIC};
use shiftcrew_core::{Envelope, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Live event kinds, in emission order.
pub const LIVE_EVENT_KINDS: [&str; 5] = [
    "employee_clock_in",
    "customer_interaction",
    "inventory_update",
    "schedule_change",
    "performance_update",
];

/// Domain topic each live event kind is also published on.
fn domain_topic(kind: &str) -> &'static str {
    match kind {
        "employee_clock_in" | "performance_update" => "employee_updates",
        "schedule_change" => "schedule_changes",
        _ => "demand_signals",
    }
}

/// Record a platform event on the `system_metrics` topic.
pub fn log_platform_event(bus: &EventBus, component: &str, event_type: &str, details: Value) {
    bus.publish(
        SYSTEM_METRICS_TOPIC,
        json!({
            "timestamp": Utc::now(),
            "component": component,
            "event_type": event_type,
            "details": details,
        }),
    );
}

/// Platform status snapshot published by the heartbeat.
pub fn platform_status(bus: &EventBus, connections: &ConnectionRegistry) -> Value {
    json!({
        "status": "operational",
        "active_connections": connections.len(),
        "topics": bus.topics().len(),
        "total_events": bus.total_events(),
        "platform_events": bus.history_len(SYSTEM_METRICS_TOPIC),
        "last_update": Utc::now(),
    })
}

/// Publish a `system_status` envelope every `interval`.
pub fn spawn_heartbeat(
    bus: EventBus,
    connections: Arc<ConnectionRegistry>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let data = platform_status(&bus, &connections);
            bus.publish(SYSTEM_STATUS_TOPIC, Envelope::SystemStatus { data }.to_value());
            debug!("Heartbeat published");
        }
    })
}

fn pick(options: &[&'static str], n: u64) -> &'static str {
    options[(n % options.len() as u64) as usize]
}

/// Body of the `n`th synthetic live event.
pub fn live_event(n: u64) -> (&'static str, Value) {
    let kind = LIVE_EVENT_KINDS[(n % LIVE_EVENT_KINDS.len() as u64) as usize];
    let mut data = json!({
        "timestamp": Utc::now(),
        "event_id": format!("{kind}_{:04}", 1000 + n % 9000),
        "location_id": format!("store_{:03}", n % 5 + 1),
    });
    let extra = match kind {
        "employee_clock_in" => {
            let action = pick(&["clock_in", "clock_out", "break_start", "break_end"], n);
            json!({
                "employee_id": format!("emp_{:03}", n % 50 + 1),
                "action": action,
            })
        }
        "customer_interaction" => {
            let department = pick(&["Sales Floor", "Electronics", "Customer Service"], n);
            let interaction_type = pick(&["purchase", "return", "inquiry", "complaint"], n);
            json!({
                "customer_count": n % 15 + 1,
                "department": department,
                "interaction_type": interaction_type,
            })
        }
        "performance_update" => {
            let metric = pick(&["sales_total", "customer_rating", "efficiency_score"], n);
            json!({
                "employee_id": format!("emp_{:03}", n % 50 + 1),
                "metric": metric,
                "value": 1.0 + (n % 40) as f64 / 10.0,
            })
        }
        _ => json!({}),
    };
    if let (Some(base), Value::Object(extra)) = (data.as_object_mut(), extra) {
        base.extend(extra);
    }
    (kind, data)
}

/// Publish a synthetic `data_flow_event` on `live_events` every `interval`.
/// Returns `None` when `interval` is zero.
pub fn spawn_live_events(bus: EventBus, interval: Duration) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut n: u64 = 0;
        loop {
            ticker.tick().await;
            let (kind, data) = live_event(n);
            bus.publish(domain_topic(kind), data.clone());
            let envelope = Envelope::DataFlowEvent {
                event: kind.to_string(),
                data,
            };
            bus.publish(LIVE_EVENTS_TOPIC, envelope.to_value());
            n = n.wrapping_add(1);
        }
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_live_events_cycle_kinds() {
        let kinds: Vec<&str> = (0..6).map(|n| live_event(n).0).collect();
        assert_eq!(
            kinds,
            vec![
                "employee_clock_in",
                "customer_interaction",
                "inventory_update",
                "schedule_change",
                "performance_update",
                "employee_clock_in"
            ]
        );
        let (_, data) = live_event(1);
        assert!(data["customer_count"].is_u64());
        assert!(data["event_id"].as_str().unwrap().starts_with("customer_interaction_"));
    }

    #[test]
    fn test_live_event_fields_rotate() {
        // n = 0 and n = 5 are both clock events.
        assert_eq!(live_event(0).1["action"], "clock_in");
        assert_eq!(live_event(5).1["action"], "clock_out");

        let (_, interaction) = live_event(1);
        assert_eq!(interaction["department"], "Electronics");
        assert_eq!(interaction["interaction_type"], "return");

        let (_, performance) = live_event(4);
        assert_eq!(performance["metric"], "customer_rating");
        assert_eq!(performance["employee_id"], "emp_005");
        assert!(live_event(2).1.get("metric").is_none());
    }

    #[test]
    fn test_platform_event_log() {
        let bus = EventBus::default();
        log_platform_event(&bus, "store", "roster_seeded", json!({"employees": 30}));
        let events = bus.recent_history(SYSTEM_METRICS_TOPIC, 10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["event_type"], "roster_seeded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_publishes_status() {
        let bus = EventBus::default();
        let handle = spawn_heartbeat(bus.clone(), ConnectionRegistry::new(), Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(61)).await;
        handle.abort();

        let events = bus.recent_history(SYSTEM_STATUS_TOPIC, 10);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].payload["type"], "system_status");
        assert_eq!(events[0].payload["data"]["status"], "operational");
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_events_publish_envelopes() {
        let bus = EventBus::default();
        let handle = spawn_live_events(bus.clone(), Duration::from_secs(5)).unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        handle.abort();

        let events = bus.recent_history(LIVE_EVENTS_TOPIC, 10);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].payload["type"], "data_flow_event");
        assert_eq!(events[0].payload["event"], "employee_clock_in");
        assert_eq!(bus.history_len("employee_updates"), 1);
        assert!(spawn_live_events(bus, Duration::ZERO).is_none());
    }
}
