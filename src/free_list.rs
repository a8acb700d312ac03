use std::fmt;

use tracing::{debug, info, trace};

use crate::block::{Block, FIRST_BLOCK_OFFSET, FreeBlock, MIN_BLOCK_LEN, MIN_PAYLOAD};
use crate::error::{ArenaError, UsageError};
use crate::reference::{REFERENCE_SIZE, Reference};
use crate::region::{Arena, MAX_ARENA_SIZE, Offset, Region};
use crate::stats::HeapStats;

/// Arena size used by [`FreeListAllocator::default`].
pub const DEFAULT_ARENA_SIZE: usize = 32 * 1024;

/// Smallest arena that still holds the head cell and one block.
pub const MIN_ARENA_SIZE: usize = FIRST_BLOCK_OFFSET + MIN_BLOCK_LEN;

/// Prints the block layout and the free list of `allocator`.
pub fn print_heap(
  label: &str,
  allocator: &FreeListAllocator,
) {
  println!("[{}] {}", label, allocator);
}

/// Payload size actually reserved for a request of `size` bytes.
///
/// Requests below [`MIN_PAYLOAD`] are raised to it so a freed block can hold
/// its list link. Returns `None` for `size <= 0`.
pub fn request_size(
  size: i16,
) -> Option<usize> {
  if size <= 0 {
    return None;
  }
  Some((size as usize).max(MIN_PAYLOAD))
}

/// General-purpose allocator over one fixed byte arena.
///
/// Free blocks form a singly linked list threaded through their payloads;
/// the head of that list lives in the first two bytes of the arena.
pub struct FreeListAllocator {
  arena: Arena,
  head: Reference,
}

impl FreeListAllocator {
  pub fn new(
    arena_size: usize,
  ) -> Result<Self, ArenaError> {
    if !(MIN_ARENA_SIZE..=MAX_ARENA_SIZE).contains(&arena_size) {
      return Err(ArenaError::InvalidSize {
        requested: arena_size,
        min: MIN_ARENA_SIZE,
        max: MAX_ARENA_SIZE,
      });
    }
    Ok(Self::build(arena_size))
  }

  fn build(
    arena_size: usize,
  ) -> Self {
    let mut arena = Arena::new(arena_size);
    let (head_cell, initial) = arena.whole().split_at(REFERENCE_SIZE);

    let only_block = Block::setup(&mut arena, initial, true);
    FreeBlock::new(&arena, only_block)
      .next_reference()
      .reset(&mut arena);

    let head = Reference::new(head_cell);
    head.set(&mut arena, only_block.start());

    info!(arena_size, "initialized free-list allocator");
    Self { arena, head }
  }

  pub fn arena(&self) -> &Arena {
    &self.arena
  }

  pub fn capacity(&self) -> usize {
    self.arena.len()
  }

  /// Contents of a region handed out by this allocator.
  pub fn bytes(
    &self,
    region: Region,
  ) -> &[u8] {
    self.arena.slice(region)
  }

  pub fn bytes_mut(
    &mut self,
    region: Region,
  ) -> &mut [u8] {
    self.arena.slice_mut(region)
  }

  /// Reserves at least `size` zeroed bytes.
  ///
  /// The first free block with a payload of twice the request or more is
  /// taken right away; otherwise the largest block that fits is used.
  /// Returns `None` for `size <= 0` or when no free block is big enough.
  pub fn allocate(
    &mut self,
    size: i16,
  ) -> Option<Region> {
    let Some(request) = request_size(size) else {
      trace!(size, "rejected non-positive allocation");
      return None;
    };

    let mut best: Option<(Reference, FreeBlock)> = None;
    let mut cursor = self.head;
    while let Some(candidate) = FreeBlock::from_reference(&self.arena, cursor) {
      if candidate.len() >= 2 * request {
        trace!(request, start = %candidate.start(), "early accept");
        return Some(self.core_allocate(request, cursor, candidate));
      }

      if candidate.len() >= request
        && best.is_none_or(|(_, block)| block.len() < candidate.len())
      {
        best = Some((cursor, candidate));
      }

      cursor = candidate.next_reference();
    }

    match best {
      Some((reference, block)) => {
        trace!(request, start = %block.start(), "best fit");
        Some(self.core_allocate(request, reference, block))
      }
      None => {
        debug!(size, request, "arena exhausted");
        None
      }
    }
  }

  /// Returns a region obtained from [`allocate`](Self::allocate) to the
  /// arena, merging it with free neighbours.
  ///
  /// The region must be a live allocation of this allocator. Mismatched
  /// boundary tags abort the call; use
  /// [`try_deallocate`](Self::try_deallocate) to validate first.
  pub fn deallocate(
    &mut self,
    region: Region,
  ) {
    let block = Block::from_payload(&self.arena, region);
    let freed = block.mark_as_free(&mut self.arena);

    let previous = block.previous_block(&self.arena);
    let next_free = block
      .next_block(&self.arena)
      .filter(|next| next.is_free(&self.arena))
      .map(|next| FreeBlock::new(&self.arena, next));

    match previous {
      None => {
        match next_free {
          Some(next) => {
            freed.join_with(&mut self.arena, next);
          }
          None => freed.next_reference().set_from(&mut self.arena, self.head),
        }
        self.head.set(&mut self.arena, block.start());
        trace!(case = "head", start = %block.start(), merged_next = next_free.is_some(), "freed at list head");
      }
      Some(previous) if !previous.is_free(&self.arena) => {
        let insertion = self.previous_free_reference(Some(previous));
        match next_free {
          Some(next) => {
            freed.join_with(&mut self.arena, next);
          }
          None => freed.next_reference().set_from(&mut self.arena, insertion),
        }
        insertion.set(&mut self.arena, block.start());
        trace!(case = "after_used", start = %block.start(), merged_next = next_free.is_some(), "freed after used block");
      }
      Some(previous) => {
        let previous = FreeBlock::new(&self.arena, previous);
        freed
          .next_reference()
          .set_from(&mut self.arena, previous.next_reference());
        let joined = previous.join_with(&mut self.arena, freed);
        if let Some(next) = next_free {
          joined.join_with(&mut self.arena, next);
        }
        trace!(case = "into_free", start = %previous.start(), merged_next = next_free.is_some(), "freed into previous block");
      }
    }

    debug!(start = %region.start(), len = region.len(), "deallocated");
  }

  /// Resizes a live allocation, keeping its leading bytes.
  ///
  /// Shrinking happens in place. Growing first tries to absorb a free block
  /// right after the allocation and only then moves the contents to a new
  /// allocation. Returns `None` for `new_size <= 0` or when no space is
  /// found; the original region stays live and untouched in both cases.
  pub fn reallocate(
    &mut self,
    region: Region,
    new_size: i16,
  ) -> Option<Region> {
    let request = request_size(new_size)?;
    let block = Block::from_payload(&self.arena, region);
    verify!(
      !block.is_free(&self.arena),
      "reallocating free block at {}",
      block.start()
    );

    if request <= region.len() {
      debug!(start = %region.start(), request, "shrinking in place");
      return Some(self.shrink_in_place(block, request));
    }

    if let Some(widened) = self.grow_in_place(block, request) {
      debug!(start = %region.start(), request, "grown in place");
      return Some(widened);
    }

    let moved = self.allocate(new_size)?;
    self.arena.copy(region, moved);
    self.deallocate(region);
    debug!(from = %region.start(), to = %moved.start(), request, "moved allocation");
    Some(moved)
  }

  /// [`deallocate`](Self::deallocate) after checking that `region` is a live
  /// allocation of this allocator.
  pub fn try_deallocate(
    &mut self,
    region: Region,
  ) -> Result<(), UsageError> {
    self.live_block(region)?;
    self.deallocate(region);
    Ok(())
  }

  /// [`reallocate`](Self::reallocate) after checking that `region` is a live
  /// allocation of this allocator.
  pub fn try_reallocate(
    &mut self,
    region: Region,
    new_size: i16,
  ) -> Result<Option<Region>, UsageError> {
    self.live_block(region)?;
    Ok(self.reallocate(region, new_size))
  }

  /// First block of the arena, in physical order.
  pub fn first_block(&self) -> Block {
    Block::at(&self.arena, Offset::new(FIRST_BLOCK_OFFSET as u16))
  }

  pub fn first_free_block(&self) -> Option<FreeBlock> {
    FreeBlock::from_reference(&self.arena, self.head)
  }

  /// Every block in address order.
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      arena: &self.arena,
      next: Some(self.first_block()),
    }
  }

  /// Free blocks in free-list order.
  pub fn free_blocks(&self) -> FreeBlocks<'_> {
    FreeBlocks {
      arena: &self.arena,
      next: self.first_free_block(),
    }
  }

  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats::new(self.arena.len());
    for block in self.blocks() {
      stats.record(block.len(), block.is_free(&self.arena));
    }
    stats
  }

  pub(crate) fn head(&self) -> Reference {
    self.head
  }

  #[cfg(test)]
  pub(crate) fn arena_mut(&mut self) -> &mut Arena {
    &mut self.arena
  }

  fn core_allocate(
    &mut self,
    request: usize,
    reference: Reference,
    block: FreeBlock,
  ) -> Region {
    verify!(block.len() >= request);

    let region = if block.len() < request + MIN_BLOCK_LEN {
      reference.set_from(&mut self.arena, block.next_reference());
      block.claim(&mut self.arena)
    } else {
      let (first, rest) = block.split(&mut self.arena, request);
      reference.set(&mut self.arena, rest.start());
      first.claim(&mut self.arena)
    };

    debug!(request, start = %region.start(), len = region.len(), "allocated");
    region
  }

  /// The list cell that should point at a block freed just after `block`:
  /// the link of the closest free block before it, or the list head.
  fn previous_free_reference(
    &self,
    mut block: Option<Block>,
  ) -> Reference {
    while let Some(current) = block {
      if current.is_free(&self.arena) {
        return FreeBlock::new(&self.arena, current).next_reference();
      }
      block = current.previous_block(&self.arena);
    }
    self.head
  }

  fn shrink_in_place(
    &mut self,
    block: Block,
    request: usize,
  ) -> Region {
    if block.payload().len() < request + MIN_BLOCK_LEN {
      return block.payload();
    }

    let (kept, surplus) = block.split(&mut self.arena, request);
    self.deallocate(surplus.payload());
    kept.payload()
  }

  fn grow_in_place(
    &mut self,
    block: Block,
    request: usize,
  ) -> Option<Region> {
    let next = block.next_block(&self.arena)?;
    if !next.is_free(&self.arena) || block.payload().len() + next.len() < request {
      return None;
    }

    let next_free = FreeBlock::new(&self.arena, next);
    let inbound = self.previous_free_reference(Some(block));
    verify!(
      inbound.target(&self.arena) == Some(next.start()),
      "free list does not reach block {} from before it",
      next.start()
    );
    inbound.set_from(&mut self.arena, next_free.next_reference());

    next.mark_as_used(&mut self.arena);
    let old_len = block.payload().len();
    let widened = block.join_with(&mut self.arena, next);
    let payload = widened.payload();
    payload
      .slice(old_len, payload.len() - old_len)
      .fill(&mut self.arena, 0);

    Some(self.shrink_in_place(widened, request))
  }

  fn live_block(
    &self,
    region: Region,
  ) -> Result<Block, UsageError> {
    if region.arena() != self.arena.id() {
      return Err(UsageError::ForeignArena);
    }

    let block = self
      .blocks()
      .take_while(|block| block.start() < region.start())
      .find(|block| block.payload() == region)
      .ok_or(UsageError::NotAPayload {
        start: region.start(),
        len: region.len(),
      })?;

    if block.is_free(&self.arena) {
      return Err(UsageError::NotAllocated {
        start: block.start(),
      });
    }
    Ok(block)
  }
}

impl Default for FreeListAllocator {
  fn default() -> Self {
    Self::build(DEFAULT_ARENA_SIZE)
  }
}

/// Renders all blocks as `+[start-end/len]` (free) or `-[start-end/len]`
/// (used), then, on a new line, the free list as
/// `[payload_start-payload_end/payload_len]=>next;`.
impl fmt::Display for FreeListAllocator {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    for block in self.blocks() {
      let state = if block.is_free(&self.arena) { '+' } else { '-' };
      write!(
        f,
        "{}[{}-{}/{}]",
        state,
        block.start(),
        block.end(),
        block.len()
      )?;
    }
    writeln!(f)?;

    for free in self.free_blocks() {
      let payload = free.payload();
      write!(
        f,
        "[{}-{}/{}]=>",
        payload.start(),
        payload.end(),
        payload.len()
      )?;
      match free.next_reference().target(&self.arena) {
        Some(next) => write!(f, "{};", next)?,
        None => write!(f, "nil;")?,
      }
    }
    Ok(())
  }
}

impl fmt::Debug for FreeListAllocator {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("FreeListAllocator")
      .field("capacity", &self.capacity())
      .field("stats", &self.stats())
      .finish()
  }
}

/// Lazy walk over all blocks in address order.
pub struct Blocks<'a> {
  arena: &'a Arena,
  next: Option<Block>,
}

impl Iterator for Blocks<'_> {
  type Item = Block;

  fn next(&mut self) -> Option<Block> {
    let current = self.next?;
    self.next = current.next_block(self.arena);
    Some(current)
  }
}

/// Lazy walk over the free list.
pub struct FreeBlocks<'a> {
  arena: &'a Arena,
  next: Option<FreeBlock>,
}

impl Iterator for FreeBlocks<'_> {
  type Item = FreeBlock;

  fn next(&mut self) -> Option<FreeBlock> {
    let current = self.next?;
    self.next = current.next_free_block(self.arena);
    Some(current)
  }
}
