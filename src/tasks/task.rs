//! # Task abstraction.
//!
//! This module defines the [`Task`] trait (async, cancelable) and the shared
//! handle type [`TaskRef`]. The root [`Supervisor`](crate::Supervisor) is a task:
//! an application that runs several long-lived units can treat the WebSocket API
//! as one of them.
//!
//! A task receives a [`CancellationToken`]; cancelling it asks the task to stop
//! gracefully.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::RuntimeError;

/// # Asynchronous, cancelable unit.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use async_trait::async_trait;
/// use stompvisor::{RuntimeError, Task};
///
/// struct Demo;
///
/// #[async_trait]
/// impl Task for Demo {
///     fn name(&self) -> &str { "demo" }
///
///     async fn run(&self, ctx: CancellationToken) -> Result<(), RuntimeError> {
///         ctx.cancelled().await;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Runs until completion or until `ctx` is cancelled.
    async fn run(&self, ctx: CancellationToken) -> Result<(), RuntimeError>;
}

/// Shared handle to a task.
pub type TaskRef = Arc<dyn Task>;
