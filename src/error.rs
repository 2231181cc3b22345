//! Error types for the scheduler and its resource managers.

use crate::types::RequestKind;
use thiserror::Error;

/// Errors produced by the scheduler, the resource managers, and the
/// collaborators they call.
///
/// The type is `Clone` because a failed request keeps its error in its
/// lifecycle record and every reader of the record gets a copy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyscallError {
    #[error("Out of memory: no free range of {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("Out of range: {len} bytes at offset {offset} exceeds capacity {capacity}")]
    OutOfRange {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Allocation conflict: {0}")]
    AllocationConflict(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Compression error: {0}")]
    CompressionError(String),

    #[error("Queue full for {kind} requests (capacity {capacity})")]
    QueueFull { kind: RequestKind, capacity: usize },

    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Invalid request transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Request deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u128 },

    #[error("Tool {0} is already being processed")]
    ToolBusy(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Resource manager panicked: {0}")]
    ManagerPanicked(String),

    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for SyscallError {
    fn from(err: config::ConfigError) -> Self {
        SyscallError::ConfigError(err.to_string())
    }
}
