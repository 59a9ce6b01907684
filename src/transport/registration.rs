//! # Scoped handler registration.
//!
//! Every handler a [`Transport`](crate::Transport) accepts is tied to a
//! [`Registration`]. Dropping the guard (or calling [`Registration::release`])
//! removes the handler, so a worker that ends for any reason, cancellation
//! included, never leaves a callback behind.
//!
//! ```text
//! install:  transport.subscribe(topic, handler) ──► Registration
//! exit:     drop(Registration) ──► release closure runs exactly once
//! ```

use std::fmt;

type Release = Box<dyn FnOnce() + Send + 'static>;

/// Guard that removes an installed handler when dropped.
#[must_use = "dropping a Registration removes the handler immediately"]
pub struct Registration {
    release: Option<Release>,
}

impl Registration {
    /// Creates a guard that runs `release` once, on drop or explicit release.
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A guard with nothing to release.
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// Removes the handler now.
    pub fn release(mut self) {
        self.run_release();
    }

    /// Returns `true` while the handler is still installed.
    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    fn run_release(&mut self) {
        if let Some(f) = self.release.take() {
            f();
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("active", &self.is_active())
            .finish()
    }
}
