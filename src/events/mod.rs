//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`], [`Payload`] event classification and metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: bridges (`Connected`, `Disconnected`, `SubscriptionTrigger`),
//!   subscription workers (`SubscriptionSuccess`), the worker runner and supervisors
//!   (lifecycle), the application (`PublishTrigger`, `Unsubscribe`).
//! - **Consumers**: publish workers, bridge companion signals, the supervisor's
//!   subscriber listener (fans out to `SubscriberSet`, updates `AliveTracker`), and
//!   the application.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Decoded, Event, EventKind, Payload};
