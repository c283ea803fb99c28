use crate::connection::ConnectionRegistry;
use parking_lot::Mutex;
use serde::Deserialize;
use shiftcrew_core::{Envelope, Event, EventBus, ShiftCrewError, Subscriber, SubscriptionHandle};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Default number of events returned by a `history` request.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

/// Messages a client may send over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Forward future events of `topic` to this connection.
    Subscribe {
        /// Topic name.
        topic: String,
    },
    /// Stop forwarding `topic`.
    Unsubscribe {
        /// Topic name.
        topic: String,
    },
    /// Liveness check.
    Ping,
    /// Recent events of `topic`.
    History {
        /// Topic name.
        topic: String,
        /// Maximum number of events.
        #[serde(default = "default_history_limit")]
        limit: usize,
    },
}

/// Handles inbound socket messages and owns per-connection topic subscriptions.
pub struct MessageRouter {
    bus: EventBus,
    connections: Arc<ConnectionRegistry>,
    subscriptions: Mutex<HashMap<Uuid, Vec<SubscriptionHandle>>>,
}

impl MessageRouter {
    /// A router publishing replies through `connections`.
    pub fn new(bus: EventBus, connections: Arc<ConnectionRegistry>) -> Self {
        Self {
            bus,
            connections,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one raw text frame and return the reply for the sender.
    pub fn handle_text(&self, connection_id: Uuid, text: &str) -> Envelope {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(_) => return Envelope::error("Invalid JSON format"),
        };
        match serde_json::from_value::<InboundMessage>(value.clone()) {
            Ok(msg) => self.handle_message(connection_id, msg),
            Err(e) => match value.get("type").and_then(|t| t.as_str()) {
                Some(kind) if !is_known(kind) => {
                    Envelope::error(format!("Unsupported message type: {kind}"))
                }
                Some(_) => Envelope::error(format!("Invalid message: {e}")),
                None => Envelope::error("Message is missing a type"),
            },
        }
    }

    /// Handle one decoded message.
    pub fn handle_message(&self, connection_id: Uuid, msg: InboundMessage) -> Envelope {
        match msg {
            InboundMessage::Subscribe { topic } => {
                self.subscribe(connection_id, &topic);
                Envelope::Subscribed { topic }
            }
            InboundMessage::Unsubscribe { topic } => {
                self.unsubscribe(connection_id, &topic);
                Envelope::Unsubscribed { topic }
            }
            InboundMessage::Ping => Envelope::pong(),
            InboundMessage::History { topic, limit } => {
                let events = self.bus.recent_history(&topic, limit);
                Envelope::History { topic, events }
            }
        }
    }

    fn subscribe(&self, connection_id: Uuid, topic: &str) {
        let mut subs = self.subscriptions.lock();
        let handles = subs.entry(connection_id).or_default();
        if handles.iter().any(|h| h.topic() == topic) {
            return;
        }

        let connections = self.connections.clone();
        let forward: Subscriber = Arc::new(move |event: &Event| {
            if connections.send_to(connection_id, &Envelope::topic_event(event).to_json()) {
                Ok(())
            } else {
                Err(ShiftCrewError::Channel(format!(
                    "connection {connection_id} is gone"
                )))
            }
        });
        handles.push(self.bus.subscribe(topic, forward));
        info!(connection_id = %connection_id, topic = %topic, "Subscribed");
    }

    fn unsubscribe(&self, connection_id: Uuid, topic: &str) {
        let mut subs = self.subscriptions.lock();
        if let Some(handles) = subs.get_mut(&connection_id) {
            handles.retain(|h| {
                if h.topic() == topic {
                    self.bus.unsubscribe(h);
                    false
                } else {
                    true
                }
            });
        }
        debug!(connection_id = %connection_id, topic = %topic, "Unsubscribed");
    }

    /// Topics `connection_id` is subscribed to.
    pub fn subscriptions_of(&self, connection_id: Uuid) -> Vec<String> {
        self.subscriptions
            .lock()
            .get(&connection_id)
            .map(|hs| hs.iter().map(|h| h.topic().to_string()).collect())
            .unwrap_or_default()
    }

    /// Drop every subscription of a closed connection and unregister it.
    pub fn disconnect(&self, connection_id: Uuid) {
        let handles = self.subscriptions.lock().remove(&connection_id);
        for handle in handles.unwrap_or_default() {
            self.bus.unsubscribe(&handle);
        }
        self.connections.unregister(connection_id);
    }
}

fn is_known(kind: &str) -> bool {
    matches!(kind, "subscribe" | "unsubscribe" | "ping" | "history")
}
