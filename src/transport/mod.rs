//! # Broker transport boundary.
//!
//! The wire protocol and its WebSocket plumbing live behind the [`Transport`]
//! trait. The supervisor only ever talks to a transport through it:
//!
//! ```text
//!   Root supervisor ──► TransportFactory::build(&TransportConfig) ──► Arc<dyn Transport>
//!        │                                                             │
//!        ├─ on_connect(handler)    ──► Registration                    │
//!        ├─ activate()                                                 │
//!        │                                                             │
//!   Connection supervisor                                              │
//!        ├─ on_disconnect(handler) ──► Registration                    │
//!   Workers                                                            │
//!        ├─ subscribe(topic, handler) ──► Registration ◄── frames ─────┤
//!        └─ publish(channel, body)    ─────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - Handlers are plain callbacks; they must not block.
//! - Installing a connect/disconnect handler **replaces** the previous one.
//! - Only supervisors call `on_connect`, `on_disconnect`, `activate` and
//!   `deactivate`; workers only `subscribe` and `publish`.

mod config;
mod frame;
mod local;
mod registration;

use std::sync::Arc;

pub use config::{ConnectionConfig, HEARTBEAT_INTERVAL, RECONNECT_DELAY, TransportConfig};
pub use frame::{CloseFrame, Frame, Headers};
pub use local::{LocalTransport, Published};
pub use registration::Registration;

use crate::error::TransportError;

/// Callback invoked by a transport.
pub type Handler<A> = Arc<dyn Fn(A) + Send + Sync + 'static>;

/// A broker connection with callback-style lifecycle and message delivery.
pub trait Transport: Send + Sync + 'static {
    /// Installs the handler fired each time the connection is established.
    fn on_connect(&self, handler: Handler<Frame>) -> Registration;

    /// Installs the handler fired each time the underlying socket closes.
    fn on_disconnect(&self, handler: Handler<CloseFrame>) -> Registration;

    /// Subscribes `handler` to `topic`; dropping the registration unsubscribes.
    fn subscribe(&self, topic: &str, handler: Handler<Frame>)
    -> Result<Registration, TransportError>;

    /// Sends a serialized payload to `channel`. Fire-and-forget.
    fn publish(&self, channel: &str, body: String) -> Result<(), TransportError>;

    /// Starts connecting (and reconnecting per the configured policy).
    fn activate(&self) -> Result<(), TransportError>;

    /// Stops reconnecting and closes the connection.
    fn deactivate(&self);

    /// Whether the broker connection is established right now.
    fn is_connected(&self) -> bool;
}

/// Builds the transport for a root supervisor.
pub trait TransportFactory: Send + Sync + 'static {
    fn build(&self, cfg: &TransportConfig) -> Result<Arc<dyn Transport>, TransportError>;
}

impl<F> TransportFactory for F
where
    F: Fn(&TransportConfig) -> Result<Arc<dyn Transport>, TransportError> + Send + Sync + 'static,
{
    fn build(&self, cfg: &TransportConfig) -> Result<Arc<dyn Transport>, TransportError> {
        self(cfg)
    }
}
