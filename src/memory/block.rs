//! Fixed-capacity memory block with a first-fit free-list.
//!
//! A block never compacts: ranges returned by [`Block::free`] go back into the
//! free-list in offset order, and neighbouring free ranges are left unmerged.

use crate::error::SyscallError;
use crate::types::BlockID;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::error;

/// A free byte range inside a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FreeRange {
    pub offset: usize,
    pub len: usize,
}

impl FreeRange {
    fn end(&self) -> usize {
        self.offset + self.len
    }
}

struct BlockInner {
    data: Vec<u8>,
    /// Sorted by offset, pairwise disjoint
    free: Vec<FreeRange>,
    /// offset -> length of every live allocation
    allocated: BTreeMap<usize, usize>,
}

impl BlockInner {
    fn check(&self, capacity: usize) -> Result<(), SyscallError> {
        let mut spans: Vec<(usize, usize)> = self
            .free
            .iter()
            .map(|r| (r.offset, r.len))
            .chain(self.allocated.iter().map(|(o, l)| (*o, *l)))
            .collect();

        for pair in self.free.windows(2) {
            if pair[0].offset >= pair[1].offset {
                return Err(SyscallError::InvariantViolation(format!(
                    "free-list out of order at offset {}",
                    pair[1].offset
                )));
            }
        }

        spans.sort_unstable();
        let mut cursor = 0usize;
        let mut total = 0usize;
        for (offset, len) in spans {
            if len == 0 {
                return Err(SyscallError::InvariantViolation(format!(
                    "empty range at offset {}",
                    offset
                )));
            }
            if offset < cursor {
                return Err(SyscallError::InvariantViolation(format!(
                    "overlapping ranges at offset {}",
                    offset
                )));
            }
            cursor = offset + len;
            total += len;
        }

        if cursor > capacity || total != capacity {
            return Err(SyscallError::InvariantViolation(format!(
                "free + allocated = {} bytes, capacity is {}",
                total, capacity
            )));
        }
        Ok(())
    }
}

/// Memory block
///
/// All operations take the block mutex for their full duration.
pub struct Block {
    id: BlockID,
    capacity: usize,
    inner: Mutex<BlockInner>,
}

impl Block {
    /// Create a zeroed block with a single free range covering it
    pub fn new(id: BlockID, capacity: usize) -> Self {
        let free = if capacity > 0 {
            vec![FreeRange {
                offset: 0,
                len: capacity,
            }]
        } else {
            Vec::new()
        };
        Self {
            id,
            capacity,
            inner: Mutex::new(BlockInner {
                data: vec![0u8; capacity],
                free,
                allocated: BTreeMap::new(),
            }),
        }
    }

    pub fn id(&self) -> BlockID {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reserve `size` bytes from the first free range large enough to hold them.
    pub fn allocate(&self, size: usize) -> Result<usize, SyscallError> {
        if size == 0 {
            return Err(SyscallError::UnsupportedOperation(
                "zero-sized allocation".to_string(),
            ));
        }

        let mut inner = self.inner.lock();
        let index = inner
            .free
            .iter()
            .position(|range| range.len >= size)
            .ok_or(SyscallError::OutOfMemory { requested: size })?;

        let range = inner.free[index];
        if range.len == size {
            inner.free.remove(index);
        } else {
            inner.free[index] = FreeRange {
                offset: range.offset + size,
                len: range.len - size,
            };
        }
        inner.allocated.insert(range.offset, size);

        self.audit(&inner);
        Ok(range.offset)
    }

    /// Return a live allocation to the free-list.
    pub fn free(&self, offset: usize, size: usize) -> Result<(), SyscallError> {
        let mut inner = self.inner.lock();
        match inner.allocated.get(&offset) {
            Some(len) if *len == size => {}
            _ => {
                error!(
                    block_id = self.id,
                    offset, size, "Free of a range that is not a live allocation"
                );
                return Err(SyscallError::InvariantViolation(format!(
                    "block {}: no live allocation of {} bytes at offset {}",
                    self.id, size, offset
                )));
            }
        }
        inner.allocated.remove(&offset);
        Self::insert_free(&mut inner.free, FreeRange { offset, len: size });

        self.audit(&inner);
        Ok(())
    }

    /// Shrink a live allocation in place, returning its tail to the free-list.
    pub fn shrink(&self, offset: usize, new_size: usize) -> Result<(), SyscallError> {
        let mut inner = self.inner.lock();
        let current = *inner.allocated.get(&offset).ok_or_else(|| {
            SyscallError::InvariantViolation(format!(
                "block {}: no live allocation at offset {}",
                self.id, offset
            ))
        })?;
        if new_size == 0 || new_size > current {
            return Err(SyscallError::InvariantViolation(format!(
                "block {}: cannot shrink {} bytes to {}",
                self.id, current, new_size
            )));
        }
        if new_size < current {
            inner.allocated.insert(offset, new_size);
            Self::insert_free(
                &mut inner.free,
                FreeRange {
                    offset: offset + new_size,
                    len: current - new_size,
                },
            );
        }

        self.audit(&inner);
        Ok(())
    }

    /// Copy `bytes` into the block starting at `offset`.
    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<(), SyscallError> {
        self.bounds(offset, bytes.len())?;
        let mut inner = self.inner.lock();
        inner.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Copy `size` bytes out of the block starting at `offset`.
    pub fn read(&self, offset: usize, size: usize) -> Result<Vec<u8>, SyscallError> {
        self.bounds(offset, size)?;
        let inner = self.inner.lock();
        Ok(inner.data[offset..offset + size].to_vec())
    }

    /// Snapshot of the free-list
    pub fn free_ranges(&self) -> Vec<FreeRange> {
        self.inner.lock().free.clone()
    }

    pub fn free_bytes(&self) -> usize {
        self.inner.lock().free.iter().map(|r| r.len).sum()
    }

    pub fn allocated_bytes(&self) -> usize {
        self.inner.lock().allocated.values().sum()
    }

    /// Largest single allocation that would currently succeed
    pub fn largest_free(&self) -> usize {
        self.inner
            .lock()
            .free
            .iter()
            .map(|r| r.len)
            .max()
            .unwrap_or(0)
    }

    /// Verify the free-list is sorted, disjoint, and conserves capacity.
    pub fn check_invariants(&self) -> Result<(), SyscallError> {
        self.inner.lock().check(self.capacity)
    }

    fn bounds(&self, offset: usize, len: usize) -> Result<(), SyscallError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity => Ok(()),
            _ => Err(SyscallError::OutOfRange {
                offset,
                len,
                capacity: self.capacity,
            }),
        }
    }

    fn insert_free(free: &mut Vec<FreeRange>, range: FreeRange) {
        let at = free.partition_point(|r| r.offset < range.offset);
        free.insert(at, range);
    }

    fn audit(&self, inner: &BlockInner) {
        if let Err(e) = inner.check(self.capacity) {
            error!(block_id = self.id, error = %e, "Block free-list corrupted");
            debug_assert!(false, "{}", e);
        }
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Block")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("free", &inner.free)
            .field("allocated", &inner.allocated.len())
            .finish()
    }
}
