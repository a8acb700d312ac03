use thiserror::Error;

use crate::region::Offset;

/// Construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
  #[error("arena size {requested} is outside the supported range {min}..={max}")]
  InvalidSize {
    requested: usize,
    min: usize,
    max: usize,
  },
}

/// A region handed to `try_deallocate`/`try_reallocate` that is not a live
/// allocation of this allocator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
  #[error("region belongs to another arena")]
  ForeignArena,

  #[error("region at {start} with length {len} is not the payload of any block")]
  NotAPayload { start: Offset, len: usize },

  #[error("block at {start} is free")]
  NotAllocated { start: Offset },
}

/// Structural damage found by `check_integrity`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
  #[error("tag at {offset} describes an impossible block of length {length}")]
  MalformedBlock { offset: usize, length: usize },

  #[error("block at {offset} has head tag {head} but tail tag {tail}")]
  TagMismatch { offset: usize, head: i16, tail: i16 },

  #[error("free block at {offset} follows another free block")]
  AdjacentFree { offset: usize },

  #[error("free list visits {offset} twice")]
  FreeListCycle { offset: usize },

  #[error("free list points at {offset}, which is not a free block")]
  NotFree { offset: usize },

  #[error("free block at {offset} is missing from the free list")]
  MissingFromFreeList { offset: usize },
}
