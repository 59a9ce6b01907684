//! # Routines: named trigger/success pairs.
//!
//! A [`Routine`] ties application events to one subscription topic or publish
//! channel. Matching is by [`EventKind`] plus the routine name carried in
//! [`Event::route`].
//!
//! ```text
//!   Routine("orders")
//!     ├─ publish(&payload)  ──► PublishTrigger      { route: "orders", Json }
//!     ├─ unsubscribe()      ──► Unsubscribe         { route: "orders" }
//!     ├─ (bridge)           ──► SubscriptionTrigger { route: "orders", Frame }
//!     └─ (worker)           ──► SubscriptionSuccess { route: "orders", Decoded }
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::events::{Decoded, Event, EventKind, Payload};
use crate::transport::Frame;

/// A named pair of trigger/success event kinds.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Routine {
    name: Arc<str>,
}

impl Routine {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds a publish trigger carrying `payload`.
    pub fn publish<T: Serialize + ?Sized>(&self, payload: &T) -> Result<Event, serde_json::Error> {
        let value = serde_json::to_value(payload)?;
        Ok(Event::new(EventKind::PublishTrigger)
            .with_route(self.name.clone())
            .with_payload(Payload::Json(value)))
    }

    /// Builds a publish trigger without payload (sent as `null`).
    pub fn trigger(&self) -> Event {
        Event::new(EventKind::PublishTrigger).with_route(self.name.clone())
    }

    /// Builds the companion signal that cancels an in-flight decode on this routine.
    pub fn unsubscribe(&self) -> Event {
        Event::new(EventKind::Unsubscribe).with_route(self.name.clone())
    }

    pub fn is_trigger(&self, ev: &Event) -> bool {
        ev.is(EventKind::SubscriptionTrigger, Some(&self.name))
    }

    pub fn is_success(&self, ev: &Event) -> bool {
        ev.is(EventKind::SubscriptionSuccess, Some(&self.name))
    }

    pub fn is_publish(&self, ev: &Event) -> bool {
        ev.is(EventKind::PublishTrigger, Some(&self.name))
    }

    pub(crate) fn subscription_trigger(&self, frame: Frame) -> Event {
        Event::new(EventKind::SubscriptionTrigger)
            .with_route(self.name.clone())
            .with_payload(Payload::Frame(frame))
    }

    pub(crate) fn success(&self, decoded: Decoded) -> Event {
        Event::new(EventKind::SubscriptionSuccess)
            .with_route(self.name.clone())
            .with_payload(Payload::Decoded(decoded))
    }
}

impl fmt::Debug for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Routine").field(&self.name).finish()
    }
}
