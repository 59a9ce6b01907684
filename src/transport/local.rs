//! # In-process transport.
//!
//! [`LocalTransport`] is a complete in-memory [`Transport`]: there is no socket,
//! the "broker side" is driven through methods on the handle instead.
//!
//! ```text
//!  broker side (tests, demos)            supervisor side (via Transport)
//!  ─────────────────────────             ───────────────────────────────
//!  connect_now()      ──► on_connect handler
//!  drop_connection()  ──► on_disconnect handler ──► reconnect after policy delay
//!  deliver(topic, f)  ──► every subscribe(topic) handler
//!  published()        ◄── publish(channel, body)
//! ```
//!
//! Handlers are invoked outside the internal lock, so a handler may call back
//! into the transport.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{
    CloseFrame, ConnectionConfig, Frame, Handler, Registration, Transport, TransportConfig,
    TransportFactory,
};
use crate::error::TransportError;

/// A payload observed by the local broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// Destination channel.
    pub channel: String,
    /// Serialized body.
    pub body: String,
}

struct Slot<A> {
    id: u64,
    handler: Handler<A>,
}

#[derive(Default)]
struct State {
    active: bool,
    connected: bool,
    next_id: u64,
    /// Bumped on activate/deactivate; pending reconnects from older generations are void.
    generation: u64,
    connect: Option<Slot<Frame>>,
    disconnect: Option<Slot<CloseFrame>>,
    topics: HashMap<String, Vec<Slot<Frame>>>,
    published: Vec<Published>,
    subscribe_calls: usize,
    unsubscribe_calls: usize,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

struct Inner {
    cfg: RwLock<TransportConfig>,
    state: Mutex<State>,
}

/// In-memory broker connection. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct LocalTransport {
    inner: Arc<Inner>,
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new(TransportConfig::from(&ConnectionConfig::new("local://broker")))
    }
}

impl LocalTransport {
    /// Creates an inactive, disconnected transport.
    pub fn new(cfg: TransportConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg: RwLock::new(cfg),
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Returns a factory that hands out this transport, reconfigured with
    /// whatever [`TransportConfig`] the supervisor builds it with.
    pub fn factory(&self) -> impl TransportFactory + use<> {
        let me = self.clone();
        move |cfg: &TransportConfig| -> Result<Arc<dyn Transport>, TransportError> {
            *me.inner.cfg.write() = cfg.clone();
            Ok(Arc::new(me.clone()))
        }
    }

    /// Current configuration.
    pub fn config(&self) -> TransportConfig {
        self.inner.cfg.read().clone()
    }

    /// Accepts the connection: fires the connect handler with a `CONNECTED` frame.
    ///
    /// Returns `false` if the transport is inactive or already connected.
    pub fn connect_now(&self) -> bool {
        self.inner.connect_now()
    }

    /// Closes the connection: fires the disconnect handler and, while active,
    /// schedules a reconnect according to the configured policy.
    ///
    /// Returns `false` if there was no connection to drop.
    pub fn drop_connection(&self, close: CloseFrame) -> bool {
        let (handler, reconnect) = {
            let mut st = self.inner.state.lock();
            if !st.connected {
                return false;
            }
            st.connected = false;
            let reconnect = st.active;
            (st.disconnect.as_ref().map(|s| s.handler.clone()), reconnect)
        };
        self.inner
            .trace(|| format!("Connection closed to {} ({})", close.code, close.reason));
        if let Some(h) = handler {
            h(close);
        }
        if reconnect {
            Inner::schedule_reconnect(&self.inner);
        }
        true
    }

    /// Delivers `frame` to every handler subscribed to `topic`.
    ///
    /// Returns the number of handlers invoked (0 while disconnected).
    pub fn deliver(&self, topic: &str, frame: Frame) -> usize {
        let handlers: Vec<Handler<Frame>> = {
            let st = self.inner.state.lock();
            if !st.connected {
                return 0;
            }
            st.topics
                .get(topic)
                .map(|slots| slots.iter().map(|s| s.handler.clone()).collect())
                .unwrap_or_default()
        };
        self.inner
            .trace(|| format!("<<< MESSAGE destination:{topic} handlers:{}", handlers.len()));
        let frame = frame.with_header("destination", topic);
        for h in &handlers {
            h(frame.clone());
        }
        handlers.len()
    }

    /// Everything published so far, in order.
    pub fn published(&self) -> Vec<Published> {
        self.inner.state.lock().published.clone()
    }

    /// Number of live handlers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .state
            .lock()
            .topics
            .get(topic)
            .map_or(0, Vec::len)
    }

    /// Total `subscribe` calls accepted.
    pub fn subscribe_calls(&self) -> usize {
        self.inner.state.lock().subscribe_calls
    }

    /// Total handlers actually removed by releasing a subscription.
    pub fn unsubscribe_calls(&self) -> usize {
        self.inner.state.lock().unsubscribe_calls
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active
    }

    /// Whether an `on_connect` handler is currently installed.
    pub fn has_connect_handler(&self) -> bool {
        self.inner.state.lock().connect.is_some()
    }

    /// Whether an `on_disconnect` handler is currently installed.
    pub fn has_disconnect_handler(&self) -> bool {
        self.inner.state.lock().disconnect.is_some()
    }
}

impl Inner {
    fn trace(&self, msg: impl FnOnce() -> String) {
        if self.cfg.read().verbose {
            debug!(target: "stompvisor::transport", "::: {}", msg());
        }
    }

    fn connect_now(&self) -> bool {
        let handler = {
            let mut st = self.state.lock();
            if !st.active || st.connected {
                return false;
            }
            st.connected = true;
            st.connect.as_ref().map(|s| s.handler.clone())
        };
        let frame = Frame::new("CONNECTED")
            .with_header("version", "1.2")
            .with_header("heart-beat", self.cfg.read().heartbeat_header());
        self.trace(|| format!("<<< CONNECTED heart-beat:{}", frame.header("heart-beat").unwrap_or("")));
        if let Some(h) = handler {
            h(frame);
        }
        true
    }

    fn schedule_reconnect(me: &Arc<Inner>) {
        let Some(delay) = me.cfg.read().reconnect.delay() else {
            return;
        };
        let Ok(rt) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let generation = me.state.lock().generation;
        me.trace(|| format!("scheduling reconnection in {}ms", delay.as_millis()));

        let inner = Arc::clone(me);
        rt.spawn(async move {
            tokio::time::sleep(delay).await;
            if inner.state.lock().generation != generation {
                return;
            }
            inner.connect_now();
        });
    }
}

impl Transport for LocalTransport {
    fn on_connect(&self, handler: Handler<Frame>) -> Registration {
        let id = {
            let mut st = self.inner.state.lock();
            let id = st.next_id();
            st.connect = Some(Slot { id, handler });
            id
        };
        let inner = Arc::clone(&self.inner);
        Registration::new(move || {
            let mut st = inner.state.lock();
            if st.connect.as_ref().is_some_and(|s| s.id == id) {
                st.connect = None;
            }
        })
    }

    fn on_disconnect(&self, handler: Handler<CloseFrame>) -> Registration {
        let id = {
            let mut st = self.inner.state.lock();
            let id = st.next_id();
            st.disconnect = Some(Slot { id, handler });
            id
        };
        let inner = Arc::clone(&self.inner);
        Registration::new(move || {
            let mut st = inner.state.lock();
            if st.disconnect.as_ref().is_some_and(|s| s.id == id) {
                st.disconnect = None;
            }
        })
    }

    fn subscribe(
        &self,
        topic: &str,
        handler: Handler<Frame>,
    ) -> Result<Registration, TransportError> {
        let id = {
            let mut st = self.inner.state.lock();
            if !st.connected {
                return Err(TransportError::NotConnected);
            }
            let id = st.next_id();
            st.topics
                .entry(topic.to_string())
                .or_default()
                .push(Slot { id, handler });
            st.subscribe_calls += 1;
            id
        };
        self.inner.trace(|| format!(">>> SUBSCRIBE id:sub-{id} destination:{topic}"));

        let inner = Arc::clone(&self.inner);
        let topic = topic.to_string();
        Ok(Registration::new(move || {
            let removed = {
                let mut st = inner.state.lock();
                let removed = match st.topics.get_mut(&topic) {
                    Some(slots) => {
                        let before = slots.len();
                        slots.retain(|s| s.id != id);
                        before != slots.len()
                    }
                    None => false,
                };
                if removed {
                    st.unsubscribe_calls += 1;
                }
                removed
            };
            if removed {
                inner.trace(|| format!(">>> UNSUBSCRIBE id:sub-{id}"));
            }
        }))
    }

    fn publish(&self, channel: &str, body: String) -> Result<(), TransportError> {
        {
            let mut st = self.inner.state.lock();
            if !st.connected {
                return Err(TransportError::NotConnected);
            }
            st.published.push(Published {
                channel: channel.to_string(),
                body: body.clone(),
            });
        }
        self.inner
            .trace(|| format!(">>> SEND destination:{channel} content-length:{}", body.len()));
        Ok(())
    }

    fn activate(&self) -> Result<(), TransportError> {
        {
            let mut st = self.inner.state.lock();
            st.active = true;
            st.generation += 1;
        }
        let endpoint = self.inner.cfg.read().endpoint.clone();
        self.inner.trace(|| format!("Opening Web Socket to {endpoint}..."));
        Ok(())
    }

    fn deactivate(&self) {
        let handler = {
            let mut st = self.inner.state.lock();
            st.active = false;
            st.generation += 1;
            if st.connected {
                st.connected = false;
                st.disconnect.as_ref().map(|s| s.handler.clone())
            } else {
                None
            }
        };
        self.inner.trace(|| "Deactivating transport".to_string());
        if let Some(h) = handler {
            h(CloseFrame::new(1000, "deactivated"));
        }
    }

    fn is_connected(&self) -> bool {
        self.inner.state.lock().connected
    }
}
