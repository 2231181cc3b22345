//! Block-based memory manager
//!
//! Fixed-size blocks with first-fit free-lists, pooled behind a min-heap of
//! free block ids, plus the compressor the memory manager applies to payloads.

pub mod block;
pub mod compressor;
pub mod pool;

pub use block::{Block, FreeRange};
pub use compressor::{Compressor, IdentityCompressor, ZlibCompressor};
pub use pool::{Address, AllocationRecord, BlockPool, PoolStatus};
