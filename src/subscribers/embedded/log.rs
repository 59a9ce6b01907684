//! # LogWriter: renders runtime events through `tracing`.
//!
//! Lifecycle events go to `info!`, lost events and publish failures to `warn!`,
//! worker faults to `error!`. Routine traffic (triggers, successes) goes to `debug!`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  stompvisor: [epoch-started] epoch=1
//! INFO  stompvisor: [worker-starting] worker="subscription:/topic/chat" epoch=1
//! ERROR stompvisor: [worker-failed] worker="subscription:/topic/chat" epoch=1 reason="decode failed on /topic/chat: invalid json: ..."
//! WARN  stompvisor: [publish-failed] route="send" reason="not connected"
//! INFO  stompvisor: [shutdown-complete]
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker.as_deref().unwrap_or("-");
        let route = e.route.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::Connected => info!(target: "stompvisor", "[connected]"),
            EventKind::Disconnected => {
                info!(target: "stompvisor", "[disconnected] epoch={:?} reason={:?}", e.epoch, e.reason)
            }
            EventKind::EpochStarted => {
                info!(target: "stompvisor", "[epoch-started] epoch={:?}", e.epoch)
            }
            EventKind::EpochEnded => {
                info!(target: "stompvisor", "[epoch-ended] epoch={:?}", e.epoch)
            }
            EventKind::WorkerStarting => {
                info!(target: "stompvisor", "[worker-starting] worker={worker:?} epoch={:?}", e.epoch)
            }
            EventKind::WorkerStopped => info!(
                target: "stompvisor",
                "[worker-stopped] worker={worker:?} epoch={:?} reason={reason:?}",
                e.epoch
            ),
            EventKind::WorkerFailed => error!(
                target: "stompvisor",
                "[worker-failed] worker={worker:?} epoch={:?} reason={reason:?}",
                e.epoch
            ),
            EventKind::SubscriptionTrigger => {
                debug!(target: "stompvisor", "[subscription-trigger] route={route:?}")
            }
            EventKind::SubscriptionSuccess => {
                debug!(target: "stompvisor", "[subscription-success] route={route:?}")
            }
            EventKind::Unsubscribe => debug!(target: "stompvisor", "[unsubscribe] route={route:?}"),
            EventKind::PublishTrigger => {
                debug!(target: "stompvisor", "[publish-trigger] route={route:?}")
            }
            EventKind::PublishFailed => {
                warn!(target: "stompvisor", "[publish-failed] route={route:?} reason={reason:?}")
            }
            EventKind::ShutdownRequested => info!(target: "stompvisor", "[shutdown-requested]"),
            EventKind::ShutdownComplete => info!(target: "stompvisor", "[shutdown-complete]"),
            EventKind::GraceExceeded => {
                warn!(target: "stompvisor", "[grace-exceeded] stuck={reason:?}")
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "stompvisor", "[subscriber-overflow] subscriber={worker:?} reason={reason:?}")
            }
            EventKind::SubscriberPanicked => {
                error!(target: "stompvisor", "[subscriber-panicked] subscriber={worker:?} info={reason:?}")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
