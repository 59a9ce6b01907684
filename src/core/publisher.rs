//! # Publish worker: one channel, one epoch.
//!
//! Waits for `PublishTrigger` events of its routine and forwards each payload to
//! the transport.
//!
//! ```text
//! loop:
//!   Bus ─► PublishTrigger{route} ─► serde_json::to_string(payload) ─► transport.publish(channel, body)
//!                                          │                                 │
//!                                          └──────────── error ──────────────┴─► PublishFailed
//! ```
//!
//! ## Rules
//! - The bus receiver is created at install time; triggers published before the
//!   epoch started are not replayed.
//! - A trigger observed after cancellation began is never sent.
//! - Send failures and lost triggers are reported as `PublishFailed`; the worker
//!   keeps running.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use crate::api::{PublishSpec, Routine};
use crate::error::{TransportError, WorkerError};
use crate::events::{Bus, Event, EventKind, Payload};
use crate::transport::Transport;

pub(crate) struct PublishWorker {
    name: Arc<str>,
    channel: Arc<str>,
    routine: Routine,
    transport: Arc<dyn Transport>,
    bus: Bus,
    rx: broadcast::Receiver<Event>,
}

impl PublishWorker {
    /// Worker name used in lifecycle events.
    pub(crate) fn name(spec: &PublishSpec) -> String {
        format!("publish:{}", spec.channel())
    }

    pub(crate) fn install(spec: &PublishSpec, transport: &Arc<dyn Transport>, bus: &Bus) -> Self {
        Self {
            name: Self::name(spec).into(),
            channel: Arc::from(spec.channel()),
            routine: spec.routine().clone(),
            transport: Arc::clone(transport),
            bus: bus.clone(),
            rx: bus.subscribe(),
        }
    }

    pub(crate) async fn run(mut self, ctx: CancellationToken) -> Result<(), WorkerError> {
        loop {
            let ev = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(WorkerError::Canceled),
                res = self.rx.recv() => match res {
                    Ok(ev) => ev,
                    Err(RecvError::Lagged(n)) => {
                        self.failed(format!("lagged behind; {n} events skipped"));
                        continue;
                    }
                    Err(RecvError::Closed) => return Ok(()),
                },
            };
            if !self.routine.is_publish(&ev) {
                continue;
            }
            if ctx.is_cancelled() {
                return Err(WorkerError::Canceled);
            }

            let sent = encode(ev.payload.as_ref())
                .and_then(|body| self.transport.publish(&self.channel, body));
            if let Err(e) = sent {
                self.failed(e.to_string());
            }
        }
    }

    fn failed(&self, reason: String) {
        self.bus.publish(
            Event::new(EventKind::PublishFailed)
                .with_route(self.routine.name())
                .with_worker(self.name.clone())
                .with_reason(reason),
        );
    }
}

/// Wire body of a trigger payload; a missing payload is sent as `null`.
fn encode(payload: Option<&Payload>) -> Result<String, TransportError> {
    match payload {
        None => Ok("null".to_string()),
        Some(Payload::Json(value)) => Ok(serde_json::to_string(value)?),
        Some(_) => Err(TransportError::Rejected("payload is not json".to_string())),
    }
}
