//! Whole-heap verification.
//!
//! Unlike the allocator operations, which abort on the first broken tag,
//! this walk reads raw tags and reports damage as an [`IntegrityError`].

use std::collections::HashSet;

use crate::block::{Block, FIRST_BLOCK_OFFSET, FreeBlock, MIN_BLOCK_LEN, TAG_SIZE};
use crate::error::IntegrityError;
use crate::free_list::FreeListAllocator;
use crate::region::Arena;
use crate::stats::HeapStats;

impl FreeListAllocator {
  /// Checks that the blocks tile the arena exactly, that both tags of every
  /// block agree, that no two free blocks touch, and that the free list
  /// holds every free block exactly once.
  pub fn check_integrity(&self) -> Result<HeapStats, IntegrityError> {
    let arena = self.arena();
    let mut stats = HeapStats::new(arena.len());
    let mut free_starts = HashSet::new();

    let mut offset = FIRST_BLOCK_OFFSET;
    let mut previous_free = false;
    while offset < arena.len() {
      if offset + TAG_SIZE > arena.len() {
        return Err(IntegrityError::MalformedBlock { offset, length: 0 });
      }
      let head = read_tag(arena, offset);
      let length = head.unsigned_abs() as usize;
      if length < MIN_BLOCK_LEN || offset + length > arena.len() {
        return Err(IntegrityError::MalformedBlock { offset, length });
      }

      let tail = read_tag(arena, offset + length - TAG_SIZE);
      if tail != head {
        return Err(IntegrityError::TagMismatch { offset, head, tail });
      }

      let is_free = head > 0;
      if is_free {
        if previous_free {
          return Err(IntegrityError::AdjacentFree { offset });
        }
        free_starts.insert(offset);
      }

      stats.record(length, is_free);
      previous_free = is_free;
      offset += length;
    }

    let mut listed = HashSet::new();
    let mut cursor = self.head();
    while let Some(target) = cursor.target(arena) {
      let start = target.as_usize();
      if !free_starts.contains(&start) {
        return Err(IntegrityError::NotFree { offset: start });
      }
      if !listed.insert(start) {
        return Err(IntegrityError::FreeListCycle { offset: start });
      }
      cursor = FreeBlock::new(arena, Block::at(arena, target)).next_reference();
    }

    if let Some(&offset) = free_starts.difference(&listed).min() {
      return Err(IntegrityError::MissingFromFreeList { offset });
    }

    Ok(stats)
  }
}

fn read_tag(
  arena: &Arena,
  offset: usize,
) -> i16 {
  arena.whole().slice(offset, TAG_SIZE).read_i16(arena, 0)
}
