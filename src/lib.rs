//! syscore: Multi-Resource Request Scheduler
//!
//! Dispatches agent requests for inference, memory, storage, and tool
//! resources through one FIFO queue and worker per kind, backed by a
//! block-based memory pool and a capacity-bounded resource store.

pub mod concurrency;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod memory;
pub mod metrics;
pub mod request;
pub mod scheduler;
pub mod store;
pub mod tool;
pub mod tooling;
pub mod types;

pub use error::SyscallError;
pub use manager::ResourceManager;
pub use request::{Request, RequestHandle, RequestStatus, Response};
pub use scheduler::{Scheduler, SchedulerBuilder};
pub use types::RequestKind;
