//! Block pool and per-agent allocation records.
//!
//! Each agent leases one whole block from the pool. The lease starts with a
//! reserved base region (`mem_alloc`) and grows one allocation record per
//! round written into it. Clearing the agent frees every range it holds and
//! hands the block id back to the min-heap of free blocks.

use super::block::Block;
use crate::error::SyscallError;
use crate::types::{AgentID, BlockID, RoundID};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, warn};

/// Location of an allocation inside the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub block_id: BlockID,
    pub offset: usize,
}

/// A live allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub block_id: BlockID,
    pub offset: usize,
    pub len: usize,
}

impl AllocationRecord {
    pub fn address(&self) -> Address {
        Address {
            block_id: self.block_id,
            offset: self.offset,
        }
    }

    /// Empty rounds hold no bytes in their block
    fn free_in(&self, block: &Block) -> Result<(), SyscallError> {
        if self.len == 0 {
            return Ok(());
        }
        block.free(self.offset, self.len)
    }
}

/// Pool occupancy snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Ids of blocks not leased to any agent, ascending
    pub free_blocks: Vec<BlockID>,
    pub allocated_blocks: usize,
    pub total_blocks: usize,
    /// Free bytes summed over every block
    pub free_bytes: usize,
}

struct Lease {
    base: AllocationRecord,
    rounds: HashMap<RoundID, AllocationRecord>,
}

struct PoolState {
    free_blocks: BinaryHeap<Reverse<BlockID>>,
    leases: HashMap<AgentID, Lease>,
}

/// Pool of fixed-size blocks shared by every agent
///
/// Lock order is pool state first, then the block; no guard is held across
/// anything that can block.
pub struct BlockPool {
    blocks: Vec<Block>,
    block_size: usize,
    state: Mutex<PoolState>,
}

impl BlockPool {
    /// Create `block_count` blocks of `block_size` bytes each
    pub fn new(block_size: usize, block_count: usize) -> Self {
        let blocks = (0..block_count).map(|id| Block::new(id, block_size)).collect();
        let free_blocks = (0..block_count).map(Reverse).collect();
        Self {
            blocks,
            block_size,
            state: Mutex::new(PoolState {
                free_blocks,
                leases: HashMap::new(),
            }),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block(&self, block_id: BlockID) -> Option<&Block> {
        self.blocks.get(block_id)
    }

    /// Lease the lowest free block to `agent_id` and reserve `size` bytes in it.
    pub fn mem_alloc(&self, agent_id: &str, size: usize) -> Result<Address, SyscallError> {
        let mut state = self.state.lock();
        if state.leases.contains_key(agent_id) {
            return Err(SyscallError::AllocationConflict(format!(
                "agent {} already holds a memory block",
                agent_id
            )));
        }

        let Reverse(block_id) = state.free_blocks.pop().ok_or_else(|| {
            warn!(agent_id, size, "No free memory blocks available");
            SyscallError::OutOfMemory { requested: size }
        })?;

        let offset = match self.blocks[block_id].allocate(size) {
            Ok(offset) => offset,
            Err(e) => {
                state.free_blocks.push(Reverse(block_id));
                return Err(e);
            }
        };

        let base = AllocationRecord {
            block_id,
            offset,
            len: size,
        };
        state.leases.insert(
            agent_id.to_string(),
            Lease {
                base,
                rounds: HashMap::new(),
            },
        );

        debug!(agent_id, block_id, offset, size, "Leased memory block");
        Ok(base.address())
    }

    /// Store `bytes` as the contents of `round_id` in the agent's block.
    ///
    /// An existing round is overwritten in place when the new payload fits;
    /// otherwise a new range is allocated and the old one freed. An empty
    /// payload is recorded without reserving any bytes.
    pub fn mem_write(
        &self,
        agent_id: &str,
        round_id: RoundID,
        bytes: &[u8],
    ) -> Result<AllocationRecord, SyscallError> {
        let mut state = self.state.lock();
        let lease = state
            .leases
            .get_mut(agent_id)
            .ok_or_else(|| SyscallError::KeyNotFound(format!("agent {}", agent_id)))?;
        let block = &self.blocks[lease.base.block_id];

        let record = match lease.rounds.get(&round_id).copied() {
            existing if bytes.is_empty() => {
                if let Some(existing) = existing {
                    existing.free_in(block)?;
                }
                AllocationRecord {
                    block_id: lease.base.block_id,
                    offset: 0,
                    len: 0,
                }
            }
            Some(existing) if bytes.len() <= existing.len => {
                block.write(existing.offset, bytes)?;
                if bytes.len() < existing.len {
                    block.shrink(existing.offset, bytes.len())?;
                }
                AllocationRecord {
                    len: bytes.len(),
                    ..existing
                }
            }
            Some(existing) => {
                let offset = block.allocate(bytes.len())?;
                block.write(offset, bytes)?;
                existing.free_in(block)?;
                AllocationRecord {
                    block_id: existing.block_id,
                    offset,
                    len: bytes.len(),
                }
            }
            None => {
                let offset = block.allocate(bytes.len())?;
                if let Err(e) = block.write(offset, bytes) {
                    block.free(offset, bytes.len())?;
                    return Err(e);
                }
                AllocationRecord {
                    block_id: lease.base.block_id,
                    offset,
                    len: bytes.len(),
                }
            }
        };

        lease.rounds.insert(round_id, record);
        debug!(
            agent_id,
            round_id,
            block_id = record.block_id,
            offset = record.offset,
            len = record.len,
            "Wrote memory round"
        );
        Ok(record)
    }

    /// Read back the bytes stored for `round_id`.
    ///
    /// The pool lock is held across the block read so a concurrent clear
    /// cannot hand the range to another agent mid-read.
    pub fn mem_read(&self, agent_id: &str, round_id: RoundID) -> Result<Vec<u8>, SyscallError> {
        let state = self.state.lock();
        let record = Self::round(&state, agent_id, round_id)?;
        if record.len == 0 {
            return Ok(Vec::new());
        }
        self.blocks[record.block_id].read(record.offset, record.len)
    }

    /// Free a single round, keeping the agent's lease.
    pub fn mem_release(&self, agent_id: &str, round_id: RoundID) -> Result<(), SyscallError> {
        let mut state = self.state.lock();
        let lease = state
            .leases
            .get_mut(agent_id)
            .ok_or_else(|| SyscallError::KeyNotFound(format!("agent {}", agent_id)))?;
        let record = lease.rounds.remove(&round_id).ok_or_else(|| {
            SyscallError::KeyNotFound(format!("agent {} round {}", agent_id, round_id))
        })?;
        record.free_in(&self.blocks[record.block_id])
    }

    /// Free everything the agent holds and return its block to the pool.
    pub fn mem_clear(&self, agent_id: &str) -> Result<(), SyscallError> {
        let mut state = self.state.lock();
        let lease = state
            .leases
            .remove(agent_id)
            .ok_or_else(|| SyscallError::KeyNotFound(format!("agent {}", agent_id)))?;
        let block_id = lease.base.block_id;
        let block = &self.blocks[block_id];

        let mut first_error = None;
        for record in lease
            .rounds
            .values()
            .chain(std::iter::once(&lease.base))
        {
            if let Err(e) = record.free_in(block) {
                first_error.get_or_insert(e);
            }
        }
        state.free_blocks.push(Reverse(block_id));

        debug!(agent_id, block_id, rounds = lease.rounds.len(), "Cleared memory lease");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Base address reserved by `mem_alloc`, if the agent holds a lease
    pub fn address_of(&self, agent_id: &str) -> Option<Address> {
        self.state
            .lock()
            .leases
            .get(agent_id)
            .map(|lease| lease.base.address())
    }

    /// Allocation record for a round
    pub fn record(&self, agent_id: &str, round_id: RoundID) -> Result<AllocationRecord, SyscallError> {
        Self::round(&self.state.lock(), agent_id, round_id)
    }

    fn round(
        state: &PoolState,
        agent_id: &str,
        round_id: RoundID,
    ) -> Result<AllocationRecord, SyscallError> {
        let lease = state
            .leases
            .get(agent_id)
            .ok_or_else(|| SyscallError::KeyNotFound(format!("agent {}", agent_id)))?;
        lease.rounds.get(&round_id).copied().ok_or_else(|| {
            SyscallError::KeyNotFound(format!("agent {} round {}", agent_id, round_id))
        })
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.state.lock();
        let mut free_blocks: Vec<BlockID> = state.free_blocks.iter().map(|r| r.0).collect();
        free_blocks.sort_unstable();
        PoolStatus {
            free_blocks,
            allocated_blocks: state.leases.len(),
            total_blocks: self.blocks.len(),
            free_bytes: self.blocks.iter().map(|b| b.free_bytes()).sum(),
        }
    }
}
