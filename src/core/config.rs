//! # Global runtime configuration.
//!
//! Provides [`Config`], the settings of the root [`Supervisor`](crate::Supervisor).
//! Connection-level settings (endpoint, verbosity) live in
//! [`ConnectionConfig`](crate::ConnectionConfig).
//!
//! ## Sentinel values
//! - `grace = 0s` → do not wait for workers after cancellation
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `grace`: Maximum wait for the connection tree to stop after shutdown is requested
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for graceful shutdown.
    ///
    /// When shutdown is requested:
    /// - The root `CancellationToken` is cancelled
    /// - The supervisor waits up to `grace` for the connect bridge and all epoch workers
    /// - If the wait times out, `run` returns `RuntimeError::GraceExceeded`
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 5s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.grace, Duration::from_secs(5));
        assert_eq!(cfg.bus_capacity, 1024);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
