//! Core types shared across the ShiftCrew crates.
//!
//! # Main types
//!
//! - [`ShiftCrewError`]: Unified error enum for all ShiftCrew subsystems.
//! - [`ShiftCrewResult`]: Convenience alias for `Result<T, ShiftCrewError>`.
//! - [`EventBus`]: Topic-keyed publish/subscribe with bounded history.
//! - [`Envelope`]: Outbound `{type, ...}` messages delivered to observers.

/// Outbound message envelopes.
pub mod envelope;
/// Error type and result alias.
pub mod error;
/// Topic-keyed publish/subscribe bus.
pub mod event_bus;

pub use envelope::Envelope;
pub use error::{ShiftCrewError, ShiftCrewResult};
pub use event_bus::{Event, EventBus, Subscriber, SubscriptionHandle};
