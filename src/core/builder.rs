use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::{alive::AliveTracker, config::Config, supervisor::Supervisor};
use crate::{
    api::ApiDefinition,
    error::RuntimeError,
    events::{Bus, EventKind},
    subscribers::{Subscribe, SubscriberSet},
    transport::{ConnectionConfig, TransportConfig, TransportFactory},
};

/// Builder for a root [`Supervisor`].
pub struct SupervisorBuilder {
    connection: ConnectionConfig,
    api: ApiDefinition,
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    pub(crate) fn new(connection: ConnectionConfig, api: ApiDefinition) -> Self {
        Self {
            connection,
            api,
            cfg: Config::default(),
            subscribers: Vec::new(),
        }
    }

    /// Overrides the runtime configuration.
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (epochs, worker lifecycle, failures)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the API, builds the transport and starts event delivery.
    ///
    /// Must be called from within a tokio runtime. The transport is built but not
    /// activated; [`Supervisor::run`] activates it.
    pub fn build(self, factory: impl TransportFactory) -> Result<Arc<Supervisor>, RuntimeError> {
        self.api.validate()?;

        let transport = factory.build(&TransportConfig::from(&self.connection))?;
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let alive = Arc::new(AliveTracker::new());

        let listener = subscriber_listener(&bus, subs, Arc::clone(&alive));

        Ok(Arc::new(Supervisor::new_internal(
            format!("ws-api:{}", self.connection.endpoint),
            self.cfg,
            bus,
            alive,
            transport,
            Arc::new(self.api),
            listener,
        )))
    }
}

/// Feeds every bus event to the alive tracker, then to the subscriber set.
///
/// Ends after forwarding the final shutdown event and drains the subscriber
/// queues before returning.
fn subscriber_listener(
    bus: &Bus,
    subs: SubscriberSet,
    alive: Arc<AliveTracker>,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    alive.update(&ev).await;
                    subs.emit(&ev);
                    if matches!(ev.kind, EventKind::ShutdownComplete | EventKind::GraceExceeded) {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        subs.shutdown().await;
    })
}
