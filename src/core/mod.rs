//! Runtime core: connection lifecycle and worker supervision.
//!
//! The public API of this module is [`Supervisor`] (with [`SupervisorBuilder`],
//! [`Config`] and [`create_ws_api_task`]).
//!
//! Internal modules:
//! - [`bridge`]: callback-to-event bridge shared by every callback-driven worker;
//! - [`connection`]: installs and joins the worker group of one connection epoch;
//! - [`subscription`] / [`publisher`]: per-topic and per-channel epoch workers;
//! - [`runner`]: publishes worker lifecycle events and contains panics;
//! - [`alive`]: sequence-ordered tracker of alive workers;
//! - [`shutdown`]: cross-platform shutdown signal handling;
//! - [`supervisor`]: root task, grace period and shutdown.

mod alive;
mod bridge;
mod builder;
mod config;
mod connection;
mod publisher;
mod runner;
mod shutdown;
mod subscription;
mod supervisor;

#[cfg(test)]
mod tests;

pub use builder::SupervisorBuilder;
pub use config::Config;
pub(crate) use runner::panic_info;
pub use supervisor::{Supervisor, create_ws_api_task};
