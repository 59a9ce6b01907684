//! Reconnect policies.
//!
//! ## Contents
//! - [`ReconnectPolicy`] whether, and after how long, a transport reconnects
//!
//! ## Wiring
//! ```text
//! ConnectionConfig ──► TransportConfig { reconnect: ReconnectPolicy, heartbeats, .. }
//!                          └─► Transport after a close: sleep(reconnect.delay()) → connect
//! ```
//!
//! ## Defaults
//! - `ReconnectPolicy::default()` → fixed 5s.

mod reconnect;

pub use reconnect::ReconnectPolicy;
