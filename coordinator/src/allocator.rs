//! Object-identifier block allocation for zones
//!
//! Every zone owns a disjoint block of world-object identifiers so that
//! objects spawned by different zone authorities can never collide. The
//! allocator is a forward-only cursor: blocks are handed out in strictly
//! increasing order and are never reclaimed, even when a zone loses its
//! authority. Reuse would require agreement between peers about which
//! identifiers are still live, and the ceiling leaves ample headroom for
//! the expected zone count.

use shared::{OBJECT_ID_BLOCK_SIZE, OBJECT_ID_CEILING, OBJECT_ID_FLOOR};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    #[error("identifier space exhausted: next block would end past {ceiling}")]
    Exhausted { ceiling: u64 },
}

/// Inclusive range of object identifiers owned by one zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRange {
    pub min: u64,
    pub max: u64,
}

/// Hands out disjoint identifier blocks in strictly increasing order.
#[derive(Debug)]
pub struct BlockAllocator {
    cursor: u64,
    block_size: u64,
    ceiling: u64,
}

impl BlockAllocator {
    pub fn new() -> Self {
        Self::with_limits(OBJECT_ID_FLOOR, OBJECT_ID_BLOCK_SIZE, OBJECT_ID_CEILING)
    }

    pub fn with_limits(floor: u64, block_size: u64, ceiling: u64) -> Self {
        Self {
            cursor: floor,
            block_size,
            ceiling,
        }
    }

    /// Grants the next identifier block, advancing the cursor by exactly
    /// one block size. Fails with the cursor untouched once the next
    /// block would overrun the ceiling; every later call fails the same
    /// way.
    pub fn allocate(&mut self) -> Result<IdRange, AllocError> {
        if self.cursor + self.block_size > self.ceiling {
            return Err(AllocError::Exhausted {
                ceiling: self.ceiling,
            });
        }

        let min = self.cursor;
        self.cursor += self.block_size;

        Ok(IdRange {
            min,
            max: self.cursor - 1,
        })
    }

    /// How many more blocks can be granted before exhaustion.
    pub fn remaining_blocks(&self) -> u64 {
        (self.ceiling.saturating_sub(self.cursor)) / self.block_size
    }
}

impl Default for BlockAllocator {
    fn default() -> Self {
        Self::new()
    }
}
