//! # Reconnect schedule.
//!
//! Broker connections retry on a fixed delay; there is no growth and no jitter.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use stompvisor::ReconnectPolicy;
//!
//! let fixed = ReconnectPolicy::Fixed(Duration::from_secs(5));
//! assert_eq!(fixed.delay(), Some(Duration::from_secs(5)));
//! assert_eq!(ReconnectPolicy::Never.delay(), None);
//! ```

use std::time::Duration;

use crate::transport::RECONNECT_DELAY;

/// What a transport does after an unexpected close.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Stay closed.
    Never,
    /// Reconnect after the same delay every time.
    Fixed(Duration),
}

impl Default for ReconnectPolicy {
    /// Fixed [`RECONNECT_DELAY`].
    fn default() -> Self {
        Self::Fixed(RECONNECT_DELAY)
    }
}

impl ReconnectPolicy {
    /// Delay before the next attempt, `None` if the transport stays closed.
    ///
    /// A zero fixed delay counts as [`ReconnectPolicy::Never`].
    pub fn delay(&self) -> Option<Duration> {
        match *self {
            Self::Fixed(d) if !d.is_zero() => Some(d),
            _ => None,
        }
    }
}
