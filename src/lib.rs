//! # stompvisor
//!
//! **Stompvisor** keeps the pub/sub side of an application in step with a live
//! broker connection (STOMP over WebSocket, or anything behind [`Transport`]).
//!
//! The application declares *what* it subscribes to and publishes on
//! ([`ApiDefinition`]); the runtime installs one worker per entry every time the
//! connection comes up, and tears all of them down when it drops.
//!
//! ## Architecture
//! ### Overview
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (root task)                                           │
//! │  - Transport (built from ConnectionConfig, reconnects every 5s)   │
//! │  - Bus (broadcast events)                                         │
//! │  - connect bridge (Repeat, cancelled by Disconnected)             │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        │ Connected  (epoch += 1)
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ConnectionSupervisor::run_epoch                                  │
//! │  ├─ disconnect-bridge         ──► Disconnected                    │
//! │  ├─ subscription:<topic> × N  ──► SubscriptionTrigger/Success     │
//! │  └─ publish:<channel>    × M  ◄── PublishTrigger                  │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                     (capacity: Config::bus_capacity)              │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───┬────────────────┬───┘
//!                           ▼                ▼
//!                    AliveTracker     SubscriberSet
//!                  (sequence-based)   (per-sub queues)
//! ```
//!
//! ### Epoch lifecycle
//! ```text
//! transport.on_connect ──► Connected ──► EpochStarted{n}
//!   ├─► WorkerStarting{ worker, n } × (1 + N + M)
//!   ├─► ... traffic ...
//!   ├─► transport.on_disconnect ──► Disconnected{n}
//!   │        └─► epoch token cancelled
//!   ├─► WorkerStopped{ worker, n, reason: "cancelled" } × (1 + N + M)
//!   └─► EpochEnded{n}
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **API**           | Declare subscriptions and publish channels.                  | [`ApiDefinition`], [`Routine`], [`Codec`]   |
//! | **Supervision**   | Connection epochs, graceful shutdown.                        | [`Supervisor`], [`create_ws_api_task`]      |
//! | **Transport**     | Broker boundary and an in-process implementation.            | [`Transport`], [`LocalTransport`]           |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics).               | [`Subscribe`]                               |
//! | **Policies**      | Reconnect schedule of a transport.                           | [`ReconnectPolicy`]                         |
//! | **Errors**        | Typed errors for the runtime, workers and transports.        | [`RuntimeError`], [`WorkerError`]           |
//! | **Configuration** | Runtime and connection settings.                             | [`Config`], [`ConnectionConfig`]            |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogWriter`] that renders events through `tracing`.
//!
//! ## Example
//! ```rust
//! use serde::Deserialize;
//! use serde_json::json;
//! use stompvisor::{
//!     ApiDefinition, ConnectionConfig, Frame, LocalTransport, PublishSpec, Routine,
//!     Subscribe, SubscriptionSpec, Supervisor,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Deserialize)]
//! struct Chat {
//!     text: String,
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let chat = Routine::new("chat");
//!     let send = Routine::new("send");
//!     let api = ApiDefinition::new()
//!         .subscribe(SubscriptionSpec::json::<Chat>("/topic/chat", chat.clone()))
//!         .publish(PublishSpec::new("/app/send", send.clone()));
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(stompvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!
//!     let broker = LocalTransport::default();
//!     let sup = Supervisor::builder(ConnectionConfig::new("ws://localhost:8080/ws"), api)
//!         .with_subscribers(subs)
//!         .build(broker.factory())?;
//!
//!     let mut events = sup.bus().subscribe();
//!     let run = tokio::spawn({
//!         let sup = sup.clone();
//!         async move { sup.run().await }
//!     });
//!
//!     // Broker accepts the connection: epoch 1 starts.
//!     while !broker.connect_now() {
//!         tokio::task::yield_now().await;
//!     }
//!     while broker.subscriber_count("/topic/chat") == 0 {
//!         tokio::task::yield_now().await;
//!     }
//!
//!     broker.deliver("/topic/chat", Frame::message(r#"{"text":"hi"}"#));
//!     loop {
//!         let ev = events.recv().await?;
//!         if chat.is_success(&ev) {
//!             assert_eq!(ev.message::<Chat>().map(|m| m.body.text.as_str()), Some("hi"));
//!             break;
//!         }
//!     }
//!     sup.emit(send.publish(&json!({ "text": "hello" }))?);
//!
//!     sup.shutdown();
//!     run.await??;
//!     assert!(!broker.is_active());
//!     Ok(())
//! }
//! ```

mod api;
mod core;
mod error;
mod events;
mod policies;
mod subscribers;
mod tasks;
mod transport;

// ---- Public re-exports ----

pub use api::{
    ApiDefinition, Codec, FnCodec, JsonCodec, Message, PublishSpec, Routine, SubscriptionSpec,
    TextCodec,
};
pub use self::core::{Config, Supervisor, SupervisorBuilder, create_ws_api_task};
pub use error::{DecodeError, RuntimeError, TransportError, WorkerError};
pub use events::{Bus, Decoded, Event, EventKind, Payload};
pub use policies::ReconnectPolicy;
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{Task, TaskRef};
pub use transport::{
    CloseFrame, ConnectionConfig, Frame, HEARTBEAT_INTERVAL, Handler, Headers, LocalTransport,
    Published, RECONNECT_DELAY, Registration, Transport, TransportConfig, TransportFactory,
};

// Optional: expose a built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
