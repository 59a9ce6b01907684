//! # Connection supervisor: the worker group of one connection epoch.
//!
//! Started by the connect bridge each time the transport reports a connection.
//!
//! ```text
//! run_epoch(epoch, ctx)
//!   publish EpochStarted
//!   group = ctx.child_token()
//!   JoinSet:
//!     ├─ disconnect-bridge            (Repeat; emits Disconnected)
//!     ├─ subscription:<topic>  × N    (one per SubscriptionSpec; only while connected)
//!     └─ publish:<channel>     × M    (one per PublishSpec; only while connected)
//!   not connected any more → publish Disconnected, cancel group
//!   wait for every worker
//!   publish EpochEnded
//! ```
//!
//! ## Rules
//! - Every worker is installed (handler registered, bus receiver created) before
//!   any of them is spawned.
//! - The disconnect handler goes first. If the connection is gone once the
//!   workers are installed, the epoch publishes `Disconnected` itself and ends:
//!   the close may have fired before any handler could see it.
//! - The epoch ends when `ctx` is cancelled: by the connect bridge on
//!   `Disconnected`, or by the root on shutdown.
//! - A failing worker ends alone; its siblings keep running until the epoch ends.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::bridge::{BridgeMode, CallbackBridge};
use super::publisher::PublishWorker;
use super::runner::{publish_install_failed, run_worker};
use super::subscription::SubscriptionWorker;
use crate::api::ApiDefinition;
use crate::error::WorkerError;
use crate::events::{Bus, Event, EventKind, Payload};
use crate::transport::{CloseFrame, Transport};

/// Name of the per-epoch disconnect bridge worker.
pub(crate) const DISCONNECT_BRIDGE: &str = "disconnect-bridge";

/// Reason of the `Disconnected` an epoch publishes for a close it never saw.
const CLOSED_BEFORE_START: &str = "closed before epoch start";

pub(crate) struct ConnectionSupervisor {
    transport: Arc<dyn Transport>,
    api: Arc<ApiDefinition>,
    bus: Bus,
}

impl ConnectionSupervisor {
    pub(crate) fn new(transport: Arc<dyn Transport>, api: Arc<ApiDefinition>, bus: Bus) -> Self {
        Self {
            transport,
            api,
            bus,
        }
    }

    /// Runs one epoch until `ctx` is cancelled and every worker has finished.
    pub(crate) async fn run_epoch(&self, epoch: u64, ctx: CancellationToken) {
        self.bus
            .publish(Event::new(EventKind::EpochStarted).with_epoch(epoch));

        let group = ctx.child_token();
        let mut set = JoinSet::new();

        let transport = Arc::clone(&self.transport);
        match CallbackBridge::install(
            BridgeMode::Repeat,
            &self.bus,
            |handler| Ok(transport.on_disconnect(handler)),
            move |close: &CloseFrame| {
                Event::new(EventKind::Disconnected)
                    .with_epoch(epoch)
                    .with_payload(Payload::Close(close.clone()))
            },
        ) {
            Ok(bridge) => self.spawn(&mut set, DISCONNECT_BRIDGE.into(), epoch, bridge.run(group.clone())),
            Err(source) => self.install_failed(
                DISCONNECT_BRIDGE,
                epoch,
                WorkerError::Transport {
                    route: DISCONNECT_BRIDGE.to_string(),
                    source,
                },
            ),
        }

        if self.transport.is_connected() {
            self.install_routines(&mut set, epoch, &group);
        }
        // A close that fired before the disconnect handler existed was never reported.
        if !self.transport.is_connected() {
            self.bus.publish(
                Event::new(EventKind::Disconnected)
                    .with_epoch(epoch)
                    .with_reason(CLOSED_BEFORE_START),
            );
            group.cancel();
        }

        // Panics are contained by the runner; a join error means the runtime is going away.
        while set.join_next().await.is_some() {}
        group.cancel();

        self.bus
            .publish(Event::new(EventKind::EpochEnded).with_epoch(epoch));
    }

    fn install_routines(
        &self,
        set: &mut JoinSet<Result<(), WorkerError>>,
        epoch: u64,
        group: &CancellationToken,
    ) {
        for spec in self.api.subscriptions() {
            let name = SubscriptionWorker::name(spec);
            match SubscriptionWorker::install(spec, &self.transport, &self.bus) {
                Ok(worker) => self.spawn(set, name.into(), epoch, worker.run(group.clone())),
                Err(err) => self.install_failed(&name, epoch, err),
            }
        }

        for spec in self.api.publish_definitions() {
            let worker = PublishWorker::install(spec, &self.transport, &self.bus);
            let name = PublishWorker::name(spec);
            self.spawn(set, name.into(), epoch, worker.run(group.clone()));
        }
    }

    fn spawn<F>(&self, set: &mut JoinSet<Result<(), WorkerError>>, name: Arc<str>, epoch: u64, fut: F)
    where
        F: Future<Output = Result<(), WorkerError>> + Send + 'static,
    {
        set.spawn(run_worker(name, epoch, self.bus.clone(), fut));
    }

    fn install_failed(&self, name: &str, epoch: u64, err: WorkerError) {
        publish_install_failed(&self.bus, name, epoch, &err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{PublishSpec, Routine, SubscriptionSpec, TextCodec};
    use crate::transport::{Frame, LocalTransport};
    use tokio::sync::broadcast;

    async fn next_of(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
        loop {
            let ev = rx.recv().await.unwrap();
            if ev.kind == kind {
                return ev;
            }
        }
    }

    fn api() -> Arc<ApiDefinition> {
        Arc::new(
            ApiDefinition::new()
                .subscribe(SubscriptionSpec::new("/topic/a", Routine::new("a"), TextCodec))
                .subscribe(SubscriptionSpec::new("/topic/b", Routine::new("b"), TextCodec))
                .publish(PublishSpec::new("/app/c", Routine::new("c"))),
        )
    }

    #[tokio::test]
    async fn test_epoch_installs_and_tears_down_all_workers() {
        let local = LocalTransport::default();
        local.activate().unwrap();
        local.connect_now();
        let bus = Bus::new(256);
        let mut rx = bus.subscribe();
        let conn = Arc::new(ConnectionSupervisor::new(Arc::new(local.clone()), api(), bus.clone()));

        let ctx = CancellationToken::new();
        let handle = tokio::spawn({
            let conn = conn.clone();
            let ctx = ctx.clone();
            async move { conn.run_epoch(3, ctx).await }
        });

        let mut started = Vec::new();
        while started.len() < 4 {
            let ev = next_of(&mut rx, EventKind::WorkerStarting).await;
            assert_eq!(ev.epoch, Some(3));
            started.push(ev.worker.as_deref().unwrap_or_default().to_string());
        }
        started.sort();
        assert_eq!(
            started,
            vec![
                "disconnect-bridge",
                "publish:/app/c",
                "subscription:/topic/a",
                "subscription:/topic/b"
            ]
        );
        assert!(local.has_disconnect_handler());
        assert_eq!(local.subscriber_count("/topic/a"), 1);

        ctx.cancel();
        handle.await.unwrap();

        let ended = next_of(&mut rx, EventKind::EpochEnded).await;
        assert_eq!(ended.epoch, Some(3));
        assert!(!local.has_disconnect_handler());
        assert_eq!(local.subscriber_count("/topic/a"), 0);
        assert_eq!(local.subscriber_count("/topic/b"), 0);
        assert_eq!(local.unsubscribe_calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_worker_does_not_stop_siblings() {
        let local = LocalTransport::default();
        local.activate().unwrap();
        local.connect_now();
        let bus = Bus::new(256);
        let mut rx = bus.subscribe();
        let api = Arc::new(
            ApiDefinition::new()
                .subscribe(SubscriptionSpec::json::<u32>("/topic/n", Routine::new("n")))
                .subscribe(SubscriptionSpec::new("/topic/t", Routine::new("t"), TextCodec)),
        );
        let conn = Arc::new(ConnectionSupervisor::new(Arc::new(local.clone()), api, bus.clone()));

        let ctx = CancellationToken::new();
        let handle = tokio::spawn({
            let conn = conn.clone();
            let ctx = ctx.clone();
            async move { conn.run_epoch(1, ctx).await }
        });
        next_of(&mut rx, EventKind::EpochStarted).await;
        tokio::task::yield_now().await;

        local.deliver("/topic/n", Frame::message("nope"));
        let failed = next_of(&mut rx, EventKind::WorkerFailed).await;
        assert_eq!(failed.worker.as_deref(), Some("subscription:/topic/n"));

        local.deliver("/topic/t", Frame::message("still here"));
        let ok = next_of(&mut rx, EventKind::SubscriptionSuccess).await;
        assert_eq!(ok.message::<String>().unwrap().body, "still here");

        ctx.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_epoch_on_closed_connection_ends_at_once() {
        // Never connected: the close happened before the epoch could watch for it.
        let local = LocalTransport::default();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let conn = ConnectionSupervisor::new(Arc::new(local.clone()), api(), bus.clone());

        conn.run_epoch(1, CancellationToken::new()).await;

        let disc = next_of(&mut rx, EventKind::Disconnected).await;
        assert_eq!(disc.epoch, Some(1));
        assert_eq!(disc.reason.as_deref(), Some(CLOSED_BEFORE_START));
        next_of(&mut rx, EventKind::EpochEnded).await;

        assert_eq!(local.subscribe_calls(), 0);
        assert!(!local.has_disconnect_handler());
        while let Ok(ev) = rx.try_recv() {
            assert_ne!(ev.kind, EventKind::WorkerFailed, "unexpected {ev:?}");
        }
    }
}
