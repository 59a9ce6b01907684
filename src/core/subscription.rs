//! # Subscription worker: one topic, one epoch.
//!
//! ```text
//! install():  transport.subscribe(topic, handler) ──► Registration
//!
//! per inbound frame (in delivery order, one at a time):
//!   publish SubscriptionTrigger { route, Frame }
//!   codec.decode_frame(frame)            ◄── Unsubscribe{route} / epoch cancel → Canceled
//!   publish SubscriptionSuccess { route, Decoded }
//! ```
//!
//! A decode failure ends this worker only (`WorkerFailed`); sibling workers of
//! the epoch keep running.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::bridge::{BridgeMode, CallbackBridge, Reaction, Signal};
use crate::api::{ErasedCodec, Routine, SubscriptionSpec};
use crate::error::WorkerError;
use crate::events::{Bus, EventKind};
use crate::transport::{Frame, Transport};

pub(crate) struct SubscriptionWorker {
    bridge: CallbackBridge<Frame>,
}

impl SubscriptionWorker {
    /// Worker name used in lifecycle events.
    pub(crate) fn name(spec: &SubscriptionSpec) -> String {
        format!("subscription:{}", spec.topic())
    }

    /// Subscribes the topic on `transport`. Fails if the transport refuses.
    pub(crate) fn install(
        spec: &SubscriptionSpec,
        transport: &Arc<dyn Transport>,
        bus: &Bus,
    ) -> Result<Self, WorkerError> {
        let topic: Arc<str> = Arc::from(spec.topic());
        let routine = spec.routine().clone();

        let trigger = routine.clone();
        let bridge = CallbackBridge::install(
            BridgeMode::Repeat,
            bus,
            |handler| transport.subscribe(&topic, handler),
            move |frame: &Frame| trigger.subscription_trigger(frame.clone()),
        )
        .map_err(|source| WorkerError::Transport {
            route: topic.to_string(),
            source,
        })?
        .cancel_on(Signal::new(EventKind::Unsubscribe).with_route(routine.name()))
        .react_with(decode(topic, routine, spec.codec(), bus.clone()));

        Ok(Self { bridge })
    }

    pub(crate) async fn run(self, ctx: CancellationToken) -> Result<(), WorkerError> {
        self.bridge.run(ctx).await
    }
}

fn decode(
    topic: Arc<str>,
    routine: Routine,
    codec: Arc<dyn ErasedCodec>,
    bus: Bus,
) -> Reaction<Frame> {
    Arc::new(move |frame: Frame, token: CancellationToken| {
        let topic = topic.clone();
        let routine = routine.clone();
        let codec = codec.clone();
        let bus = bus.clone();

        Box::pin(async move {
            let decoded = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(WorkerError::Canceled),
                res = codec.decode_frame(frame) => res.map_err(|source| WorkerError::Decode {
                    route: topic.to_string(),
                    source,
                })?,
            };
            if token.is_cancelled() {
                return Err(WorkerError::Canceled);
            }
            bus.publish(routine.success(decoded));
            Ok(())
        })
    })
}
