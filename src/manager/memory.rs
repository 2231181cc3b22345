//! Memory manager: block pool plus payload compression.

use super::{mismatched, ResourceManager};
use crate::error::SyscallError;
use crate::memory::{
    Address, AllocationRecord, BlockPool, Compressor, PoolStatus, ZlibCompressor,
};
use crate::request::{MemoryOp, Payload, Request, Response};
use crate::types::{RequestKind, RoundID};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Serves memory requests against a shared [`BlockPool`]
///
/// Round contents are compressed before they reach a block and decompressed
/// on the way out, so allocation records describe compressed lengths.
pub struct MemoryManager {
    pool: BlockPool,
    compressor: Arc<dyn Compressor>,
}

impl MemoryManager {
    pub fn new(pool: BlockPool, compressor: Arc<dyn Compressor>) -> Self {
        Self { pool, compressor }
    }

    /// Pool of `block_count` blocks of `block_size` bytes with zlib at `level`
    pub fn with_zlib(block_size: usize, block_count: usize, level: u32) -> Self {
        Self::new(
            BlockPool::new(block_size, block_count),
            Arc::new(ZlibCompressor::new(level)),
        )
    }

    pub fn pool(&self) -> &BlockPool {
        &self.pool
    }

    pub fn alloc(&self, agent_id: &str, size: usize) -> Result<Address, SyscallError> {
        self.pool.mem_alloc(agent_id, size)
    }

    /// Compress `content` and store it as round `round_id`.
    pub fn write(
        &self,
        agent_id: &str,
        round_id: RoundID,
        content: &[u8],
    ) -> Result<AllocationRecord, SyscallError> {
        let compressed = self.compressor.compress(content)?;
        debug!(
            agent_id,
            round_id,
            raw = content.len(),
            compressed = compressed.len(),
            "Compressed memory round"
        );
        self.pool.mem_write(agent_id, round_id, &compressed)
    }

    pub fn read(&self, agent_id: &str, round_id: RoundID) -> Result<Vec<u8>, SyscallError> {
        let stored = self.pool.mem_read(agent_id, round_id)?;
        self.compressor.decompress(&stored)
    }

    pub fn release(&self, agent_id: &str, round_id: RoundID) -> Result<(), SyscallError> {
        self.pool.mem_release(agent_id, round_id)
    }

    pub fn clear(&self, agent_id: &str) -> Result<(), SyscallError> {
        self.pool.mem_clear(agent_id)
    }

    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }
}

#[async_trait]
impl ResourceManager for MemoryManager {
    fn kind(&self) -> RequestKind {
        RequestKind::Memory
    }

    async fn handle(&self, request: &Request) -> Result<Response, SyscallError> {
        let op = match &request.payload {
            Payload::Memory(op) => op,
            _ => return Err(mismatched(self.kind(), request)),
        };
        let agent_id = request.agent_id.as_str();

        match op {
            MemoryOp::Alloc { size } => self.alloc(agent_id, *size).map(Response::Address),
            MemoryOp::Write { round_id, content } => {
                self.write(agent_id, *round_id, content).map(Response::Record)
            }
            MemoryOp::Read { round_id } => self.read(agent_id, *round_id).map(Response::Bytes),
            MemoryOp::Release { round_id } => {
                self.release(agent_id, *round_id).map(|_| Response::Ack)
            }
            MemoryOp::Clear => self.clear(agent_id).map(|_| Response::Ack),
            MemoryOp::Status => Ok(Response::MemoryStatus(self.status())),
        }
    }
}
