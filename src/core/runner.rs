//! # Run one epoch worker and report its lifecycle.
//!
//! Wraps a worker future so that the [`Bus`] sees exactly one start and one
//! terminal event for it.
//!
//! ## Event flow
//!
//! ```text
//! run_worker(name, epoch, ..)   ──► publish WorkerStarting     (synchronously)
//!
//! Success:       fut → Ok(())                 → publish WorkerStopped
//! Cancellation:  fut → Err(Canceled)          → publish WorkerStopped { reason: "cancelled" }
//! Failure:       fut → Err(Decode/Transport)  → publish WorkerFailed  { reason: err }
//! Panic:         fut panics                   → publish WorkerFailed  { reason: "worker_panic" }
//! ```
//!
//! ## Rules
//! - `WorkerStarting` is published before the future is returned, so a caller
//!   that spawns the future can rely on the worker being counted as alive.
//! - Always publishes **exactly one** terminal event.
//! - `Canceled` is a graceful exit → `WorkerStopped` (not `WorkerFailed`).
//! - A panic never escapes: it is converted into [`WorkerError::Panicked`].

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::{
    error::WorkerError,
    events::{Bus, Event, EventKind},
};

/// Reason attached to `WorkerStopped` for a cancelled worker.
pub(crate) const REASON_CANCELLED: &str = "cancelled";
/// Reason attached to `WorkerFailed` for a panicked worker.
pub(crate) const REASON_PANIC: &str = "worker_panic";

/// Publishes `WorkerStarting` for `name` and returns the supervised future.
pub(crate) fn run_worker<F>(
    name: Arc<str>,
    epoch: u64,
    bus: Bus,
    fut: F,
) -> impl Future<Output = Result<(), WorkerError>> + Send + 'static
where
    F: Future<Output = Result<(), WorkerError>> + Send + 'static,
{
    bus.publish(
        Event::new(EventKind::WorkerStarting)
            .with_worker(name.clone())
            .with_epoch(epoch),
    );

    async move {
        let res = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(res) => res,
            Err(panic) => Err(WorkerError::Panicked {
                info: panic_info(&*panic),
            }),
        };

        match &res {
            Ok(()) => publish_stopped(&bus, &name, epoch, None),
            Err(WorkerError::Canceled) => {
                publish_stopped(&bus, &name, epoch, Some(REASON_CANCELLED))
            }
            Err(WorkerError::Panicked { .. }) => publish_failed(&bus, &name, epoch, REASON_PANIC),
            Err(e) => publish_failed(&bus, &name, epoch, &e.to_string()),
        }
        res
    }
}

/// Publishes `WorkerFailed` for a worker that never got to run (install failure).
pub(crate) fn publish_install_failed(bus: &Bus, name: &str, epoch: u64, err: &WorkerError) {
    publish_failed(bus, name, epoch, &err.to_string());
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_info(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn publish_stopped(bus: &Bus, name: &str, epoch: u64, reason: Option<&str>) {
    let mut ev = Event::new(EventKind::WorkerStopped)
        .with_worker(name)
        .with_epoch(epoch);
    if let Some(r) = reason {
        ev = ev.with_reason(r);
    }
    bus.publish(ev);
}

fn publish_failed(bus: &Bus, name: &str, epoch: u64, reason: &str) {
    bus.publish(
        Event::new(EventKind::WorkerFailed)
            .with_worker(name)
            .with_epoch(epoch)
            .with_reason(reason),
    );
}
