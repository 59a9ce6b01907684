//! # Events flowing through the runtime.
//!
//! The [`EventKind`] enum covers four groups:
//! - **Broker events**: `Connected`, `Disconnected`, emitted by bridges
//! - **Routine events**: triggers, successes and signals exchanged with the application
//! - **Lifecycle events**: workers, epochs and shutdown
//! - **Plumbing events**: subscriber overflow/panic
//!
//! The [`Event`] struct carries metadata (route, worker, epoch, reason) and an
//! optional [`Payload`].
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use stompvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::WorkerFailed)
//!     .with_worker("subscription:/topic/a")
//!     .with_epoch(2)
//!     .with_reason("invalid json");
//!
//! assert_eq!(ev.kind, EventKind::WorkerFailed);
//! assert_eq!(ev.worker.as_deref(), Some("subscription:/topic/a"));
//! assert_eq!(ev.epoch, Some(2));
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::api::Message;
use crate::transport::{CloseFrame, Frame};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Broker events ===
    /// The transport reported an established connection.
    ///
    /// Sets: `payload` = `Payload::Frame` (the `CONNECTED` frame).
    Connected,

    /// The transport reported a closed socket.
    ///
    /// Sets: `payload` = `Payload::Close`, `epoch`.
    Disconnected,

    // === Routine events ===
    /// Raw inbound message observed on a subscription.
    ///
    /// Sets: `route`, `payload` = `Payload::Frame`. Emitted by the subscription
    /// bridge; the same kind emitted by the application is ignored.
    SubscriptionTrigger,

    /// Decoded inbound message.
    ///
    /// Sets: `route`, `payload` = `Payload::Decoded` holding a [`Message<T>`].
    SubscriptionSuccess,

    /// Companion signal that cancels an in-flight subscription decode.
    ///
    /// Sets: `route`.
    Unsubscribe,

    /// Application request to publish on a channel.
    ///
    /// Sets: `route`, `payload` = `Payload::Json` (absent payload publishes `null`).
    PublishTrigger,

    /// A publish trigger could not be delivered.
    ///
    /// Sets: `route`, `worker`, `reason`.
    PublishFailed,

    // === Worker lifecycle ===
    /// Worker started.
    ///
    /// Sets: `worker`, `epoch`.
    WorkerStarting,

    /// Worker finished or was cancelled (`reason` = `"cancelled"`).
    ///
    /// Sets: `worker`, `epoch`, optional `reason`.
    WorkerStopped,

    /// Worker ended with a fault.
    ///
    /// Sets: `worker`, `epoch`, `reason`.
    WorkerFailed,

    // === Epoch lifecycle ===
    /// Workers for a new connection epoch are being installed.
    ///
    /// Sets: `epoch`.
    EpochStarted,

    /// Every worker of the epoch has finished.
    ///
    /// Sets: `epoch`.
    EpochEnded,

    // === Shutdown events ===
    /// Root cancellation observed.
    ShutdownRequested,

    /// Root task ended gracefully.
    ShutdownComplete,

    /// Grace period exceeded; some workers did not stop in time.
    ///
    /// Sets: `reason` (stuck workers).
    GraceExceeded,

    // === Subscriber events ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `worker` = subscriber name, `reason`.
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `worker` = subscriber name, `reason` = panic message.
    SubscriberPanicked,
}

/// Type-erased decoded message.
#[derive(Clone)]
pub struct Decoded {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Decoded {
    /// Wraps a decoded message.
    pub fn new<T: Send + Sync + 'static>(message: Message<T>) -> Self {
        Self {
            value: Arc::new(message),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Borrows the message if its body type is `T`.
    pub fn downcast_ref<T: Send + Sync + 'static>(&self) -> Option<&Message<T>> {
        self.value.downcast_ref::<Message<T>>()
    }

    /// Name of the body type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoded")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Opaque event payload.
#[derive(Clone, Debug)]
pub enum Payload {
    /// Application value (publish triggers).
    Json(serde_json::Value),
    /// Raw broker frame.
    Frame(Frame),
    /// Socket close details.
    Close(CloseFrame),
    /// Decoded subscription message.
    Decoded(Decoded),
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Routine name for routine events.
    pub route: Option<Arc<str>>,
    /// Worker (or subscriber) name.
    pub worker: Option<Arc<str>>,
    /// Connection epoch number (1-based).
    pub epoch: Option<u64>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Attached payload.
    pub payload: Option<Payload>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            route: None,
            worker: None,
            epoch: None,
            reason: None,
            payload: None,
        }
    }

    #[inline]
    pub fn with_route(mut self, route: impl Into<Arc<str>>) -> Self {
        self.route = Some(route.into());
        self
    }

    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    #[inline]
    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = Some(epoch);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Returns the JSON payload, if any.
    pub fn json(&self) -> Option<&serde_json::Value> {
        match &self.payload {
            Some(Payload::Json(v)) => Some(v),
            _ => None,
        }
    }

    /// Returns the frame payload, if any.
    pub fn frame(&self) -> Option<&Frame> {
        match &self.payload {
            Some(Payload::Frame(f)) => Some(f),
            _ => None,
        }
    }

    /// Returns the decoded message if its body type is `T`.
    pub fn message<T: Send + Sync + 'static>(&self) -> Option<&Message<T>> {
        match &self.payload {
            Some(Payload::Decoded(d)) => d.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Returns `true` if this event has `kind` and, when given, `route`.
    pub fn is(&self, kind: EventKind, route: Option<&str>) -> bool {
        self.kind == kind
            && match route {
                Some(r) => self.route.as_deref() == Some(r),
                None => true,
            }
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_worker(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_worker(subscriber)
            .with_reason(info)
    }
}
