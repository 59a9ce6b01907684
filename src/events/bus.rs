//! # Event bus shared by supervisors, workers and the application.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. It is the
//! emit / wait-for-event primitive of the runtime:
//!
//! ```text
//! Publishers (many):                       Receivers (many):
//!   bridges   ──┐                            ┌──► publish workers (PublishTrigger)
//!   workers   ──┼──────► Bus ────────────────┼──► bridges (companion signals)
//!   runner    ──┤  (broadcast chan)          ├──► subscriber listener ──► SubscriberSet
//!   app       ──┘                            └──► application (SubscriptionSuccess, ...)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: one ring buffer for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: a receiver only sees events sent after it subscribed.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers; dropped if there are none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new independent receiver for subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
