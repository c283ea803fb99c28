//! HTTP and WebSocket gateway for ShiftCrew.
//!
//! Serves the scheduling API, fans orchestrator progress out to live socket
//! connections, and runs the heartbeat and live-event publishers.

/// Heartbeat, live events and the platform event log.
pub mod background;
/// Bus-to-connection progress forwarding.
pub mod bridge;
/// Connection registry and outbound sinks.
pub mod connection;
/// CORS middleware.
pub mod middleware;
/// Inbound socket message routing.
pub mod router;
/// Axum routes and application state.
pub mod server;

pub use background::{log_platform_event, spawn_heartbeat, spawn_live_events};
pub use bridge::{ProgressBridge, DEFAULT_BRIDGED_TOPICS};
pub use connection::{BroadcastReport, Connection, ConnectionRegistry, MessageSink};
pub use middleware::CorsConfig;
pub use router::{InboundMessage, MessageRouter};
pub use server::{load_employees, ApiError, AppState, GatewayServer};
