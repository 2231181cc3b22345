//! Resource managers
//!
//! One manager per [`RequestKind`]. The scheduler's worker for a kind hands
//! every dequeued request to that kind's manager and records whatever comes
//! back on the request's lifecycle.

pub mod inference;
pub mod memory;
pub mod storage;
pub mod tool;

use crate::error::SyscallError;
use crate::request::{Request, Response};
use crate::types::RequestKind;
use async_trait::async_trait;

pub use inference::{EchoBackend, InferenceBackend, InferenceManager};
pub use memory::MemoryManager;
pub use storage::StorageManager;
pub use tool::ToolManager;

/// Uniform contract between the scheduler and a resource
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// Kind this manager serves
    fn kind(&self) -> RequestKind;

    /// Execute one request
    async fn handle(&self, request: &Request) -> Result<Response, SyscallError>;
}

/// Error for a payload routed to the wrong manager
pub(crate) fn mismatched(manager: RequestKind, request: &Request) -> SyscallError {
    SyscallError::UnsupportedOperation(format!(
        "{} manager cannot handle a {} payload",
        manager,
        request.kind()
    ))
}
