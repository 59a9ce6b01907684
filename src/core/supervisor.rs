//! # Root supervisor: one broker connection for the lifetime of the application.
//!
//! The [`Supervisor`] owns the transport, the event bus and the connect bridge.
//! Each time the transport reports a connection, the connect bridge starts a new
//! connection epoch; each time it reports a close, the epoch is torn down.
//! Reconnecting is the transport's job (fixed 5 s delay); the supervisor only
//! reacts to what the transport reports.
//!
//! ## High-level architecture
//! ```text
//! Supervisor::run()
//!   ├─ connect bridge  (Repeat, cancel_on Disconnected)
//!   │     on Connected ──► epoch += 1 ──► ConnectionSupervisor::run_epoch(epoch, child)
//!   │                                      ├─ disconnect-bridge
//!   │                                      ├─ subscription:<topic> ...
//!   │                                      └─ publish:<channel> ...
//!   │     on Disconnected (while an epoch runs) ──► cancel child, await epoch end
//!   └─ transport.activate()
//!
//! Shutdown path:
//!   shutdown() / ctx cancelled / OS signal
//!             └─► Bus.publish(ShutdownRequested)
//!             └─► root token cancel → connect bridge → epoch → workers
//!             └─► wait up to cfg.grace:
//!                    ├─ finished in time → deactivate, Bus.publish(ShutdownComplete)
//!                    └─ timeout          → abort, deactivate, Bus.publish(GraceExceeded)
//!                                          (AliveTracker.snapshot() for stuck workers)
//!             └─► await subscriber listener (bounded by cfg.grace): subscriber queues drained
//! ```
//!
//! ## Example
//! ```rust
//! use stompvisor::{
//!     ApiDefinition, ConnectionConfig, LocalTransport, PublishSpec, Routine, Supervisor,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = LocalTransport::default();
//!     let api = ApiDefinition::new().publish(PublishSpec::new("/app/ping", Routine::new("ping")));
//!
//!     let sup = Supervisor::builder(ConnectionConfig::new("ws://localhost:8080/ws"), api)
//!         .build(broker.factory())?;
//!
//!     sup.shutdown();
//!     sup.run().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{
    alive::AliveTracker,
    bridge::{BridgeMode, CallbackBridge, Reaction, Signal},
    builder::SupervisorBuilder,
    config::Config,
    connection::ConnectionSupervisor,
    shutdown,
};
use crate::{
    api::ApiDefinition,
    error::{RuntimeError, WorkerError},
    events::{Bus, Event, EventKind, Payload},
    tasks::{Task, TaskRef},
    transport::{ConnectionConfig, Frame, Transport, TransportFactory},
};

/// Name of the root connect bridge.
const CONNECT_BRIDGE: &str = "connect-bridge";

/// Supervises the connection lifecycle of one broker endpoint.
pub struct Supervisor {
    name: String,
    cfg: Config,
    bus: Bus,
    alive: Arc<AliveTracker>,
    transport: Arc<dyn Transport>,
    api: Arc<ApiDefinition>,
    token: CancellationToken,
    running: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    /// Starts building a supervisor for `connection` serving `api`.
    pub fn builder(connection: ConnectionConfig, api: ApiDefinition) -> SupervisorBuilder {
        SupervisorBuilder::new(connection, api)
    }

    pub(crate) fn new_internal(
        name: String,
        cfg: Config,
        bus: Bus,
        alive: Arc<AliveTracker>,
        transport: Arc<dyn Transport>,
        api: Arc<ApiDefinition>,
        listener: JoinHandle<()>,
    ) -> Self {
        Self {
            name,
            cfg,
            bus,
            alive,
            transport,
            api,
            token: CancellationToken::new(),
            running: AtomicBool::new(false),
            listener: Mutex::new(Some(listener)),
        }
    }

    /// The event bus. Publish triggers here, subscribe for successes.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Publishes an application event (e.g. [`Routine::publish`](crate::Routine::publish)).
    pub fn emit(&self, ev: Event) {
        self.bus.publish(ev);
    }

    /// Sorted names of the epoch workers currently alive (eventually consistent).
    pub async fn alive_workers(&self) -> Vec<String> {
        self.alive.snapshot().await
    }

    /// Returns `true` if the named worker is currently alive.
    pub async fn is_alive(&self, worker: &str) -> bool {
        self.alive.is_alive(worker).await
    }

    /// Requests graceful shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Runs until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        self.run_with(CancellationToken::new()).await
    }

    /// Runs until shutdown is requested or a termination signal arrives.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        let ctx = CancellationToken::new();
        let run = self.run_with(ctx.clone());
        tokio::pin!(run);

        tokio::select! {
            res = &mut run => return res,
            sig = shutdown::wait_for_shutdown_signal() => {
                ctx.cancel();
                let res = run.await;
                sig.map_err(RuntimeError::Signal)?;
                res
            }
        }
    }

    /// Runs until shutdown is requested or `ctx` is cancelled.
    pub async fn run_with(&self, ctx: CancellationToken) -> Result<(), RuntimeError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::AlreadyRunning);
        }
        let res = self.drive(ctx).await;
        self.running.store(false, Ordering::SeqCst);
        res
    }

    async fn drive(&self, ctx: CancellationToken) -> Result<(), RuntimeError> {
        let bridge_token = self.token.child_token();
        let transport = Arc::clone(&self.transport);
        let bridge = CallbackBridge::install(
            BridgeMode::Repeat,
            &self.bus,
            |handler| Ok(transport.on_connect(handler)),
            |frame: &Frame| Event::new(EventKind::Connected).with_payload(Payload::Frame(frame.clone())),
        )?
        .cancel_on(Signal::new(EventKind::Disconnected))
        .react_with(self.epoch_reaction());

        let mut handle = tokio::spawn(bridge.run(bridge_token.clone()));
        if let Err(e) = self.transport.activate() {
            bridge_token.cancel();
            let _ = handle.await;
            return Err(e.into());
        }

        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = ctx.cancelled() => self.shutdown(),
            _ = &mut handle => {
                self.transport.deactivate();
                return Err(RuntimeError::BridgeDetached { bridge: CONNECT_BRIDGE.to_string() });
            }
        }

        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.wait_with_grace(handle).await
    }

    /// Starts a fresh epoch for every `Connected` firing.
    fn epoch_reaction(&self) -> Reaction<Frame> {
        let conn = Arc::new(ConnectionSupervisor::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.api),
            self.bus.clone(),
        ));
        let epochs = Arc::new(AtomicU64::new(0));

        Arc::new(move |_frame: Frame, token: CancellationToken| {
            let conn = Arc::clone(&conn);
            let epoch = epochs.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move {
                conn.run_epoch(epoch, token).await;
                Ok(())
            })
        })
    }

    /// Waits for the connect bridge (and so the current epoch) within `cfg.grace`.
    async fn wait_with_grace(
        &self,
        mut handle: JoinHandle<Result<(), WorkerError>>,
    ) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        let res = match tokio::time::timeout(grace, &mut handle).await {
            Ok(_) => {
                self.transport.deactivate();
                self.bus.publish(Event::new(EventKind::ShutdownComplete));
                Ok(())
            }
            Err(_) => {
                let stuck = self.alive.snapshot().await;
                handle.abort();
                self.transport.deactivate();
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        };
        self.drain_subscribers().await;
        res
    }

    /// Waits (bounded by `cfg.grace`) until subscribers have seen the final event.
    async fn drain_subscribers(&self) {
        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            let _ = tokio::time::timeout(self.cfg.grace, listener).await;
        }
    }
}

#[async_trait]
impl Task for Supervisor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), RuntimeError> {
        self.run_with(ctx).await
    }
}

/// Builds the root supervisor for `connection` serving `api`, as a task.
///
/// Uses the default [`Config`] and no subscribers. Cancelling the token passed
/// to [`Task::run`] shuts the connection down gracefully.
pub fn create_ws_api_task(
    connection: ConnectionConfig,
    api: ApiDefinition,
    factory: impl TransportFactory,
) -> Result<TaskRef, RuntimeError> {
    let task: TaskRef = Supervisor::builder(connection, api).build(factory)?;
    Ok(task)
}
