use parking_lot::RwLock;
use shiftcrew_core::{ShiftCrewError, ShiftCrewResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Outbound half of a connection.
///
/// `send` must not block; a failed send means the peer is gone.
pub trait MessageSink: Send + Sync {
    /// Queue `message` for delivery.
    fn send(&self, message: &str) -> ShiftCrewResult<()>;
}

impl MessageSink for mpsc::UnboundedSender<String> {
    fn send(&self, message: &str) -> ShiftCrewResult<()> {
        mpsc::UnboundedSender::send(self, message.to_string())
            .map_err(|_| ShiftCrewError::Channel("connection closed".to_string()))
    }
}

/// Represents a connected client.
pub struct Connection {
    /// Identity assigned on accept; never reused.
    pub id: Uuid,
    sink: Box<dyn MessageSink>,
}

impl Connection {
    /// Wrap an arbitrary sink.
    pub fn new(id: Uuid, sink: impl MessageSink + 'static) -> Self {
        Self {
            id,
            sink: Box::new(sink),
        }
    }

    /// A connection backed by an unbounded channel, plus the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(Uuid::new_v4(), tx), rx)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}

/// Result of a [`ConnectionRegistry::broadcast`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the message was queued for.
    pub delivered: usize,
    /// Connections whose send failed; they have been unregistered.
    pub failed: Vec<Uuid>,
}

/// Manages active connections.
///
/// A failing connection never affects delivery to the others: failures are
/// collected during the sweep and removed afterwards, each exactly once.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<Uuid, Connection>>,
}

impl ConnectionRegistry {
    /// A new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a connection.
    pub fn register(&self, conn: Connection) {
        let id = conn.id;
        let total = {
            let mut conns = self.connections.write();
            conns.insert(id, conn);
            conns.len()
        };
        tracing::info!(connection_id = %id, total, "Connection added");
    }

    /// Remove a connection. Returns false if it was not registered.
    pub fn unregister(&self, id: Uuid) -> bool {
        let removed = self.connections.write().remove(&id).is_some();
        if removed {
            tracing::info!(connection_id = %id, "Connection removed");
        }
        removed
    }

    /// Send to every connection, then drop the ones that failed.
    pub fn broadcast(&self, message: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        {
            let conns = self.connections.read();
            for conn in conns.values() {
                match conn.sink.send(message) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        tracing::warn!(connection_id = %conn.id, error = %e, "Broadcast send failed");
                        report.failed.push(conn.id);
                    }
                }
            }
        }
        if !report.failed.is_empty() {
            let mut conns = self.connections.write();
            for id in &report.failed {
                conns.remove(id);
            }
            tracing::info!(removed = report.failed.len(), "Dropped failed connections");
        }
        report
    }

    /// Send to one connection. A failed send unregisters it.
    pub fn send_to(&self, id: Uuid, message: &str) -> bool {
        let result = {
            let conns = self.connections.read();
            match conns.get(&id) {
                Some(conn) => conn.sink.send(message),
                None => return false,
            }
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(connection_id = %id, error = %e, "Send failed");
                self.unregister(id);
                false
            }
        }
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: Uuid) -> bool {
        self.connections.read().contains_key(&id)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// True when nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }
}
