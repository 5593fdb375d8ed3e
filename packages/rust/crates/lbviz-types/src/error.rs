//! Error taxonomy shared by the decision client and the simulation core.
//!
//! Library crates use `thiserror` enums; binaries wrap them with `anyhow`.

use thiserror::Error;

/// Result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;

/// Failure talking to the remote decision service.
///
/// Always recoverable from the point of view of a run: a failed cycle is
/// logged and the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection refused, reset, DNS failure and similar.
    #[error("request to {endpoint} failed: {message}")]
    Network {
        /// Request path (e.g. `/api/get_ip`).
        endpoint: String,
        /// Underlying client error text.
        message: String,
    },

    /// The service answered with a non-success HTTP status.
    #[error("{endpoint} answered HTTP {status}")]
    Status {
        /// Request path.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// No answer within the configured request timeout.
    #[error("{endpoint} timed out after {timeout_ms}ms")]
    Timeout {
        /// Request path.
        endpoint: String,
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// The service answered 2xx but reported `success: false`.
    #[error("{endpoint} rejected the request: {message}")]
    Rejected {
        /// Request path.
        endpoint: String,
        /// Server-provided reason.
        message: String,
    },

    /// The body could not be decoded into the expected shape.
    #[error("malformed response from {endpoint}: {message}")]
    Decode {
        /// Request path.
        endpoint: String,
        /// Decoder error text.
        message: String,
    },
}

impl TransportError {
    /// Request path the failure belongs to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Network { endpoint, .. }
            | Self::Status { endpoint, .. }
            | Self::Timeout { endpoint, .. }
            | Self::Rejected { endpoint, .. }
            | Self::Decode { endpoint, .. } => endpoint,
        }
    }
}

/// Errors surfaced by the topology store and the run controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// Remote call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A target with this id is already part of the topology.
    #[error("target `{0}` already exists")]
    DuplicateId(String),

    /// A run is in progress; only one may run at a time.
    #[error("a run is already in progress ({completed} cycles completed)")]
    AlreadyRunning {
        /// Cycles completed by the in-progress run.
        completed: u64,
        /// Total cycles of the in-progress run, `None` for continuous runs.
        total: Option<u64>,
    },

    /// Rejected run configuration.
    #[error("invalid run config: {0}")]
    InvalidRunConfig(String),

    /// The controller task has shut down.
    #[error("run controller has shut down")]
    ControllerClosed,
}
