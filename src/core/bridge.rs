//! # Callback-to-event bridge.
//!
//! A [`CallbackBridge`] turns a callback-style API ("install this handler, I will
//! call it later") into a cooperative wait point. It is the one primitive behind
//! the connect bridge, the disconnect bridge and every subscription worker.
//!
//! ```text
//! install():  register(handler) ──► Registration (held until run() returns)
//!                  │
//!   transport ─────┘ handler(arg) ──► [unbounded queue] ──► run()
//!
//! run():
//!   loop {
//!     idle   : wait for next arg | cancellation | (Once) companion signal
//!     firing : bus.publish(emit(&arg))
//!     react  : reaction(arg, child_token) | companion signal → cancel child, await
//!     Once   → return Ok
//!   }
//! ```
//!
//! ## Rules
//! - The handler is installed synchronously in [`CallbackBridge::install`], before
//!   the bridge task is spawned.
//! - Every exit path of [`CallbackBridge::run`] (return, fault, cancellation, the
//!   future being dropped) drops the [`Registration`] and so removes the handler.
//! - Arguments that arrive while a reaction runs are queued and processed in order.
//! - A companion signal only counts if it was published after the firing event.
//! - An idle `Repeat` bridge ignores signals; an idle `Once` bridge ends on one.

use std::future::pending;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{TransportError, WorkerError};
use crate::events::{Bus, Event, EventKind};
use crate::transport::{Handler, Registration};

/// How many firings a bridge serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BridgeMode {
    /// Ends after the first firing.
    Once,
    /// Serves firings until cancelled.
    Repeat,
}

/// Companion event that cancels an in-flight reaction.
#[derive(Debug, Clone)]
pub(crate) struct Signal {
    kind: EventKind,
    route: Option<Arc<str>>,
}

impl Signal {
    pub(crate) fn new(kind: EventKind) -> Self {
        Self { kind, route: None }
    }

    pub(crate) fn with_route(mut self, route: impl Into<Arc<str>>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub(crate) fn matches(&self, ev: &Event) -> bool {
        ev.is(self.kind, self.route.as_deref())
    }
}

/// Work started for each firing. Receives the callback argument and a token
/// that is cancelled by the companion signal or by the bridge's parent.
pub(crate) type Reaction<A> =
    Arc<dyn Fn(A, CancellationToken) -> BoxFuture<'static, Result<(), WorkerError>> + Send + Sync>;

type Emit<A> = Box<dyn Fn(&A) -> Event + Send + Sync>;

struct SignalWatch {
    signal: Signal,
    rx: broadcast::Receiver<Event>,
}

impl SignalWatch {
    /// Resolves on the first matching signal with `seq > after`.
    async fn after(&mut self, after: u64) {
        loop {
            match self.rx.recv().await {
                Ok(ev) if ev.seq > after && self.signal.matches(&ev) => return,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return pending().await,
            }
        }
    }
}

async fn next_signal(watch: &mut Option<SignalWatch>, after: u64) {
    match watch {
        Some(w) => w.after(after).await,
        None => pending().await,
    }
}

/// Bridge between one transport callback slot and the event bus.
pub(crate) struct CallbackBridge<A> {
    mode: BridgeMode,
    bus: Bus,
    rx: mpsc::UnboundedReceiver<A>,
    registration: Registration,
    emit: Emit<A>,
    signal: Option<SignalWatch>,
    reaction: Option<Reaction<A>>,
}

impl<A: Send + 'static> CallbackBridge<A> {
    /// Installs the handler via `register` and returns the idle bridge.
    ///
    /// `emit` builds the event published for every firing.
    pub(crate) fn install<R, E>(
        mode: BridgeMode,
        bus: &Bus,
        register: R,
        emit: E,
    ) -> Result<Self, TransportError>
    where
        R: FnOnce(Handler<A>) -> Result<Registration, TransportError>,
        E: Fn(&A) -> Event + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: Handler<A> = Arc::new(move |arg: A| {
            let _ = tx.send(arg);
        });
        let registration = register(handler)?;

        Ok(Self {
            mode,
            bus: bus.clone(),
            rx,
            registration,
            emit: Box::new(emit),
            signal: None,
            reaction: None,
        })
    }

    /// Attaches a companion signal. Only signals published after this call are seen.
    pub(crate) fn cancel_on(mut self, signal: Signal) -> Self {
        let rx = self.bus.subscribe();
        self.signal = Some(SignalWatch { signal, rx });
        self
    }

    /// Attaches the per-firing reaction.
    pub(crate) fn react_with(mut self, reaction: Reaction<A>) -> Self {
        self.reaction = Some(reaction);
        self
    }

    /// Serves firings until the mode, a fault or `ctx` ends the bridge.
    ///
    /// Returns:
    /// - `Ok(())` when a `Once` bridge is done, or when the transport dropped the handler;
    /// - `Err(Canceled)` when `ctx` was cancelled;
    /// - the reaction's error when it failed.
    pub(crate) async fn run(self, ctx: CancellationToken) -> Result<(), WorkerError> {
        let Self {
            mode,
            bus,
            mut rx,
            registration,
            emit,
            mut signal,
            reaction,
        } = self;
        let _registration = registration;

        loop {
            let arg = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(WorkerError::Canceled),
                _ = next_signal(&mut signal, 0), if mode == BridgeMode::Once => return Ok(()),
                arg = rx.recv() => match arg {
                    Some(arg) => arg,
                    None => return Ok(()),
                },
            };

            let ev = emit(&arg);
            let fired = ev.seq;
            bus.publish(ev);

            if let Some(react) = reaction.as_ref() {
                let child = ctx.child_token();
                let mut fut = react(arg, child.clone());

                let res = tokio::select! {
                    biased;
                    res = &mut fut => res,
                    _ = next_signal(&mut signal, fired) => {
                        child.cancel();
                        fut.await
                    }
                };

                if ctx.is_cancelled() {
                    return Err(WorkerError::Canceled);
                }
                match res {
                    Ok(()) | Err(WorkerError::Canceled) => {}
                    Err(e) => return Err(e),
                }
            }

            if mode == BridgeMode::Once {
                return Ok(());
            }
        }
    }
}
