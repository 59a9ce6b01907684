//! # Task abstraction.
//!
//! - [`Task`] - trait for async cancelable units
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task>`)

mod task;

pub use task::{Task, TaskRef};
