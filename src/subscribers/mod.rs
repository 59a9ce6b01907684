//! # Event subscribers for the stompvisor runtime.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] that
//! fans events from the [`Bus`](crate::events::Bus) out to subscribers.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   bridges / workers / supervisors ── publish(Event) ──► Bus ──► subscriber_listener
//!                                                                   │
//!                                                                   ├──► AliveTracker (worker state)
//!                                                                   └──► SubscriberSet::emit
//!                                                                          ├──► LogWriter
//!                                                                          └──► custom ...
//! ```

#[cfg(feature = "logging")]
mod embedded;
mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
