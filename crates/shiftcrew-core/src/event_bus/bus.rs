use super::types::{Event, Subscriber, SubscriptionHandle};
use chrono::Utc;
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default number of events retained per topic.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

struct TopicState {
    history: VecDeque<Event>,
    subscribers: Vec<(u64, Subscriber)>,
    next_sequence: u64,
    /// Serializes delivery so publish order equals delivery order.
    /// Reentrant so a subscriber may publish to its own topic.
    delivery: Arc<ReentrantMutex<()>>,
    /// Created through [`EventBus::create_topic`]; never pruned.
    declared: bool,
}

impl TopicState {
    fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity.min(64)),
            subscribers: Vec::new(),
            next_sequence: 1,
            delivery: Arc::new(ReentrantMutex::new(())),
            declared: false,
        }
    }

    fn is_unused(&self) -> bool {
        !self.declared && self.subscribers.is_empty() && self.history.is_empty()
    }
}

/// Topic-keyed publish/subscribe bus with a bounded history per topic.
///
/// Subscribers are plain callbacks invoked on the publishing task. A callback
/// that returns an error or panics is logged and skipped. Cloning the bus is cheap and
/// every clone shares the same topics.
#[derive(Clone)]
pub struct EventBus {
    topics: Arc<Mutex<HashMap<String, TopicState>>>,
    capacity: usize,
    next_subscription: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a bus retaining at most `capacity` events per topic.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
            next_subscription: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Per-topic history capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Create a topic if it does not exist yet. Publishing and subscribing
    /// create topics implicitly; this only makes them visible in [`topics`](Self::topics).
    pub fn create_topic(&self, topic: &str) {
        let mut topics = self.topics.lock();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicState::new(self.capacity))
            .declared = true;
    }

    /// Append an event to the topic history and deliver it to every current
    /// subscriber of that topic. Returns the stored event.
    pub fn publish(&self, topic: &str, payload: serde_json::Value) -> Event {
        let gate = {
            let mut topics = self.topics.lock();
            let state = topics
                .entry(topic.to_string())
                .or_insert_with(|| TopicState::new(self.capacity));
            state.delivery.clone()
        };

        let _delivering = gate.lock();

        let (event, subscribers) = {
            let mut topics = self.topics.lock();
            let state = topics
                .entry(topic.to_string())
                .or_insert_with(|| TopicState::new(self.capacity));

            let event = Event {
                topic: topic.to_string(),
                sequence: state.next_sequence,
                timestamp: Utc::now(),
                payload,
            };
            state.next_sequence += 1;

            if state.history.len() >= self.capacity {
                state.history.pop_front();
            }
            state.history.push_back(event.clone());

            let subscribers: Vec<(u64, Subscriber)> = state.subscribers.clone();
            (event, subscribers)
        };

        for (id, callback) in &subscribers {
            match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    topic = %topic,
                    subscription_id = id,
                    error = %e,
                    "Subscriber failed, continuing delivery"
                ),
                Err(panic) => warn!(
                    topic = %topic,
                    subscription_id = id,
                    panic = panic_message(panic.as_ref()),
                    "Subscriber panicked, continuing delivery"
                ),
            }
        }

        debug!(
            topic = %topic,
            sequence = event.sequence,
            subscribers = subscribers.len(),
            "Event published"
        );

        event
    }

    /// Register a callback for every future event on `topic`.
    pub fn subscribe(&self, topic: &str, callback: Subscriber) -> SubscriptionHandle {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let mut topics = self.topics.lock();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicState::new(self.capacity))
            .subscribers
            .push((id, callback));
        debug!(topic = %topic, subscription_id = id, "Subscribed");
        SubscriptionHandle {
            topic: topic.to_string(),
            id,
        }
    }

    /// Remove a subscription. Returns `false` if it was already removed.
    ///
    /// Safe to call from inside a callback: an in-flight delivery finishes
    /// against the subscriber snapshot it started with. A topic that was only
    /// ever subscribed to is dropped once its last subscriber leaves.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut topics = self.topics.lock();
        let Some(state) = topics.get_mut(&handle.topic) else {
            return false;
        };
        let before = state.subscribers.len();
        state.subscribers.retain(|(id, _)| *id != handle.id);
        let removed = before != state.subscribers.len();
        if state.is_unused() {
            topics.remove(&handle.topic);
            debug!(topic = %handle.topic, "Dropped unused topic");
        }
        removed
    }

    /// The last `limit` events of `topic`, oldest first.
    ///
    /// Returns an owned snapshot; calling again restarts from the current history.
    pub fn recent_history(&self, topic: &str, limit: usize) -> Vec<Event> {
        let topics = self.topics.lock();
        match topics.get(topic) {
            Some(state) => {
                let skip = state.history.len().saturating_sub(limit);
                state.history.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Number of events currently retained for `topic`.
    pub fn history_len(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map_or(0, |state| state.history.len())
    }

    /// Number of live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map_or(0, |state| state.subscribers.len())
    }

    /// All known topic names, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Total events retained across all topics.
    pub fn total_events(&self) -> usize {
        self.topics
            .lock()
            .values()
            .map(|state| state.history.len())
            .sum()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("topics", &self.topics())
            .finish()
    }
}
