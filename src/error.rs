//! Error types used by the stompvisor runtime, its workers and transports.
//!
//! This module defines four enums:
//!
//! - [`RuntimeError`]: errors raised by the root supervisor itself.
//! - [`WorkerError`]: the outcome of a single epoch worker or bridge.
//! - [`TransportError`]: failures reported by a [`Transport`](crate::Transport).
//! - [`DecodeError`]: failures of a subscription [`Codec`](crate::Codec).
//!
//! The runtime-facing types provide `as_label` / `as_message` helpers for logs.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the root supervisor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some workers were still alive.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of workers that did not stop in time.
        stuck: Vec<String>,
    },

    /// `run` was called while another run of the same supervisor is in progress.
    #[error("supervisor is already running")]
    AlreadyRunning,

    /// Two subscriptions (or two publish channels) share the same path.
    #[error("duplicate route in api definition: {route}")]
    DuplicateRoute {
        /// The offending topic or channel path.
        route: String,
    },

    /// The transport dropped a bridge handler without the supervisor asking for it.
    #[error("bridge {bridge} detached from transport")]
    BridgeDetached {
        /// Name of the bridge.
        bridge: String,
    },

    /// The transport could not be built or activated.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// OS signal handlers could not be installed.
    #[error("signal handler error: {0}")]
    Signal(#[source] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use stompvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::AlreadyRunning => "runtime_already_running",
            RuntimeError::DuplicateRoute { .. } => "runtime_duplicate_route",
            RuntimeError::BridgeDetached { .. } => "runtime_bridge_detached",
            RuntimeError::Transport(_) => "runtime_transport",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck workers={stuck:?}")
            }
            RuntimeError::AlreadyRunning => "already running".to_string(),
            RuntimeError::DuplicateRoute { route } => format!("duplicate route: {route}"),
            RuntimeError::BridgeDetached { bridge } => format!("bridge detached: {bridge}"),
            RuntimeError::Transport(e) => format!("transport: {e}"),
            RuntimeError::Signal(e) => format!("signal: {e}"),
        }
    }
}

/// # Outcome of an epoch worker or callback bridge.
///
/// `Canceled` is not a fault: it marks a worker that ended because its
/// connection epoch (or the whole runtime) was torn down.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The subscription codec rejected an inbound message.
    #[error("decode failed on {route}: {source}")]
    Decode {
        /// Topic path of the subscription.
        route: String,
        /// The codec failure.
        #[source]
        source: DecodeError,
    },

    /// The transport refused an operation the worker depends on.
    #[error("transport failed on {route}: {source}")]
    Transport {
        /// Topic or channel path.
        route: String,
        /// The transport failure.
        #[source]
        source: TransportError,
    },

    /// Worker panicked; the panic was contained by the runner.
    #[error("worker panicked: {info}")]
    Panicked {
        /// Panic message, when it was a string.
        info: String,
    },

    /// Worker was cancelled by its parent token.
    #[error("context cancelled")]
    Canceled,
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use stompvisor::WorkerError;
    ///
    /// assert_eq!(WorkerError::Canceled.as_label(), "worker_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Decode { .. } => "worker_decode",
            WorkerError::Transport { .. } => "worker_transport",
            WorkerError::Panicked { .. } => "worker_panic",
            WorkerError::Canceled => "worker_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            WorkerError::Decode { route, source } => format!("decode {route}: {source}"),
            WorkerError::Transport { route, source } => format!("transport {route}: {source}"),
            WorkerError::Panicked { info } => format!("panic: {info}"),
            WorkerError::Canceled => "context cancelled".to_string(),
        }
    }

    /// Returns `true` when the worker ended because it was cancelled.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, WorkerError::Canceled)
    }
}

/// # Errors reported by a transport implementation.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    /// The broker connection is not currently established.
    #[error("not connected")]
    NotConnected,

    /// The transport rejected the operation.
    #[error("rejected: {0}")]
    Rejected(String),

    /// A payload could not be serialized for the wire.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// # Errors produced by subscription codecs.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The body is not valid JSON for the target type.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// The codec rejected the body for another reason.
    #[error("invalid payload: {0}")]
    Invalid(String),
}
