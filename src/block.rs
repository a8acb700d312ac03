//! Boundary-tagged blocks and the free-list view over them.
//!
//! ```text
//!   Block of length N at offset S
//!
//!   S      S+2                               S+N-2   S+N
//!   ┌──────┬──────────────────────────────────┬──────┐
//!   │ tag  │             payload              │ tag  │
//!   │ ±N   │             N - 4 bytes          │ ±N   │
//!   └──────┴──────────────────────────────────┴──────┘
//!
//!   +N: free, payload starts with the next free block's offset
//!   -N: used, payload belongs to the caller
//! ```

use crate::reference::{REFERENCE_SIZE, Reference};
use crate::region::{Arena, Offset, Region};
use crate::verify::to_i16;

/// Size in bytes of one boundary tag.
pub const TAG_SIZE: usize = 2;

/// Smallest payload a block may have: room for a free-list reference.
pub const MIN_PAYLOAD: usize = 2 * TAG_SIZE;

/// Smallest block: two tags plus the minimum payload.
pub const MIN_BLOCK_LEN: usize = 2 * TAG_SIZE + MIN_PAYLOAD;

/// Offset of the first block; the bytes before it hold the free-list head.
pub const FIRST_BLOCK_OFFSET: usize = REFERENCE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
  region: Region,
}

impl Block {
  pub fn new(
    region: Region,
  ) -> Self {
    verify!(
      region.len() >= MIN_BLOCK_LEN,
      "block {} is shorter than {} bytes",
      region,
      MIN_BLOCK_LEN
    );
    Self { region }
  }

  /// Tags `region` as a brand-new block in the requested state.
  pub fn setup(
    arena: &mut Arena,
    region: Region,
    is_free: bool,
  ) -> Self {
    let block = Block::new(region);
    block.mark_as(arena, !is_free);
    block
  }

  /// The block whose head tag sits at `start`.
  pub fn at(
    arena: &Arena,
    start: Offset,
  ) -> Self {
    let tag = arena.whole().slice(start.as_usize(), TAG_SIZE);
    Block::new(tag.with_length(Block::read_length(arena, tag)))
  }

  pub fn from_reference(
    arena: &Arena,
    reference: Reference,
  ) -> Option<Self> {
    reference
      .target(arena)
      .map(|start| Block::at(arena, start))
  }

  /// Rebuilds the block owning `payload` from the tag just before it.
  pub fn from_payload(
    arena: &Arena,
    payload: Region,
  ) -> Self {
    let tag = payload.left_adjacent(TAG_SIZE);
    let block = Block::new(tag.with_length(Block::read_length(arena, tag)));
    verify!(
      block.payload() == payload,
      "{} is not the payload of block {}",
      payload,
      block.region
    );
    block
  }

  /// Magnitude of the tag stored in `tag`, whatever its state.
  pub fn read_length(
    arena: &Arena,
    tag: Region,
  ) -> usize {
    verify!(tag.len() == TAG_SIZE, "tag {} is not {} bytes", tag, TAG_SIZE);
    tag.read_i16(arena, 0).unsigned_abs() as usize
  }

  pub fn region(&self) -> Region {
    self.region
  }

  pub fn start(&self) -> Offset {
    self.region.start()
  }

  pub fn end(&self) -> usize {
    self.region.end()
  }

  pub fn len(&self) -> usize {
    self.region.len()
  }

  pub fn is_empty(&self) -> bool {
    self.region.is_empty()
  }

  pub fn is_free(
    &self,
    arena: &Arena,
  ) -> bool {
    let head = self.head_tag(arena);
    let tail = self.tail_tag(arena);
    verify!(
      head == tail,
      "block {} has head tag {} but tail tag {}",
      self.region,
      head,
      tail
    );
    head > 0
  }

  pub fn payload(&self) -> Region {
    self
      .region
      .slice(TAG_SIZE, self.region.len() - 2 * TAG_SIZE)
  }

  pub fn previous_block(
    &self,
    arena: &Arena,
  ) -> Option<Block> {
    if self.start().as_usize() < FIRST_BLOCK_OFFSET + MIN_BLOCK_LEN {
      return None;
    }

    let length = Block::read_length(arena, self.region.left_adjacent(TAG_SIZE));
    Some(Block::new(self.region.left_adjacent(length)))
  }

  pub fn next_block(
    &self,
    arena: &Arena,
  ) -> Option<Block> {
    if self.end() + MIN_BLOCK_LEN > self.region.arena_len() {
      return None;
    }

    let length = Block::read_length(arena, self.region.right_adjacent(TAG_SIZE));
    Some(Block::new(self.region.right_adjacent(length)))
  }

  /// Merges with the physically following block of the same state.
  pub fn join_with(
    self,
    arena: &mut Arena,
    next: Block,
  ) -> Block {
    let is_free = self.is_free(arena);
    verify!(
      is_free == next.is_free(arena),
      "cannot join {} and {}: states differ",
      self.region,
      next.region
    );
    Block::setup(arena, self.region.join_with(next.region), is_free)
  }

  /// Splits off a leading block with a payload of exactly `size` bytes.
  pub fn split(
    self,
    arena: &mut Arena,
    size: usize,
  ) -> (Block, Block) {
    verify!(
      self.payload().len() >= size + MIN_BLOCK_LEN,
      "block {} is too small to split off {} bytes",
      self.region,
      size
    );
    let is_free = self.is_free(arena);
    let (first, second) = self.region.split_at(2 * TAG_SIZE + size);
    (
      Block::setup(arena, first, is_free),
      Block::setup(arena, second, is_free),
    )
  }

  pub fn mark_as_used(
    &self,
    arena: &mut Arena,
  ) {
    verify!(self.is_free(arena), "block {} is already used", self.region);
    self.mark_as(arena, true);
  }

  pub fn mark_as_free(
    &self,
    arena: &mut Arena,
  ) -> FreeBlock {
    verify!(!self.is_free(arena), "block {} is already free", self.region);
    self.mark_as(arena, false);
    let freed = FreeBlock::new(arena, *self);
    freed.next_reference().reset(arena);
    freed
  }

  fn head_tag(
    &self,
    arena: &Arena,
  ) -> i16 {
    self.region.read_i16(arena, 0)
  }

  fn tail_tag(
    &self,
    arena: &Arena,
  ) -> i16 {
    self.region.read_i16(arena, self.region.len() - TAG_SIZE)
  }

  fn mark_as(
    &self,
    arena: &mut Arena,
    used: bool,
  ) {
    let length = to_i16(self.region.len());
    let tag = if used { -length } else { length };
    self.region.write_i16(arena, 0, tag);
    self.region.write_i16(arena, self.region.len() - TAG_SIZE, tag);
  }
}

/// A block known to be free. The first two payload bytes link it to the
/// next free block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FreeBlock {
  block: Block,
}

impl FreeBlock {
  pub fn new(
    arena: &Arena,
    block: Block,
  ) -> Self {
    verify!(block.is_free(arena), "block {} is not free", block.region);
    Self { block }
  }

  pub fn from_reference(
    arena: &Arena,
    reference: Reference,
  ) -> Option<Self> {
    Block::from_reference(arena, reference).map(|block| FreeBlock::new(arena, block))
  }

  pub fn block(&self) -> Block {
    self.block
  }

  pub fn start(&self) -> Offset {
    self.block.start()
  }

  pub fn payload(&self) -> Region {
    self.block.payload()
  }

  /// Payload length.
  pub fn len(&self) -> usize {
    self.block.payload().len()
  }

  /// Always `false`: a free block holds at least [`MIN_PAYLOAD`] bytes.
  pub fn is_empty(&self) -> bool {
    false
  }

  pub fn next_reference(&self) -> Reference {
    Reference::new(self.block.payload().slice(0, REFERENCE_SIZE))
  }

  pub fn next_free_block(
    &self,
    arena: &Arena,
  ) -> Option<FreeBlock> {
    FreeBlock::from_reference(arena, self.next_reference())
  }

  /// Marks the block used and hands out its zeroed payload.
  pub fn claim(
    self,
    arena: &mut Arena,
  ) -> Region {
    self.block.mark_as_used(arena);
    let payload = self.block.payload();
    payload.fill(arena, 0);
    payload
  }

  /// Absorbs the following free block; the result continues the list where
  /// the absorbed block did.
  pub fn join_with(
    self,
    arena: &mut Arena,
    next: FreeBlock,
  ) -> FreeBlock {
    let continuation = next.next_reference().target(arena);
    let block = self.block.join_with(arena, next.block);
    let joined = FreeBlock::new(arena, block);
    joined.next_reference().store(arena, continuation);
    joined
  }

  /// Splits off a leading free block with a `size`-byte payload, linked to
  /// the remainder, which inherits this block's list continuation.
  pub fn split(
    self,
    arena: &mut Arena,
    size: usize,
  ) -> (FreeBlock, FreeBlock) {
    let continuation = self.next_reference().target(arena);
    let (first, second) = self.block.split(arena, size);
    let first = FreeBlock::new(arena, first);
    let second = FreeBlock::new(arena, second);
    second.next_reference().store(arena, continuation);
    first.next_reference().set(arena, second.start());
    (first, second)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn arena_with_block(
    len: usize,
  ) -> (Arena, Block) {
    let mut arena = Arena::new(FIRST_BLOCK_OFFSET + len);
    let region = arena.whole().slice(FIRST_BLOCK_OFFSET, len);
    let block = Block::setup(&mut arena, region, true);
    (arena, block)
  }

  #[test]
  fn test_setup_writes_both_tags() {
    let (mut arena, block) = arena_with_block(16);

    assert!(block.is_free(&arena));
    assert_eq!(block.region().read_i16(&arena, 0), 16);
    assert_eq!(block.region().read_i16(&arena, 14), 16);
    assert_eq!(block.payload().start(), Offset::new(4));
    assert_eq!(block.payload().len(), 12);

    block.mark_as_used(&mut arena);
    assert!(!block.is_free(&arena));
    assert_eq!(block.region().read_i16(&arena, 0), -16);
    assert_eq!(block.region().read_i16(&arena, 14), -16);
  }

  #[test]
  fn test_split_and_navigate() {
    let (mut arena, block) = arena_with_block(30);

    let (first, second) = block.split(&mut arena, 6);
    assert_eq!(first.len(), 10);
    assert_eq!(second.len(), 20);
    assert_eq!(second.start(), Offset::new(12));
    assert!(first.is_free(&arena) && second.is_free(&arena));

    assert_eq!(first.next_block(&arena), Some(second));
    assert_eq!(second.previous_block(&arena), Some(first));
    assert_eq!(first.previous_block(&arena), None);
    assert_eq!(second.next_block(&arena), None);
  }

  #[test]
  fn test_join_restores_single_block() {
    let (mut arena, block) = arena_with_block(30);
    let (first, second) = block.split(&mut arena, 6);

    let joined = first.join_with(&mut arena, second);
    assert_eq!(joined, block);
    assert!(joined.is_free(&arena));
    assert_eq!(joined.region().read_i16(&arena, 28), 30);
  }

  #[test]
  fn test_block_lookup() {
    let (mut arena, block) = arena_with_block(30);
    let (first, second) = block.split(&mut arena, 6);

    assert_eq!(Block::at(&arena, Offset::new(12)), second);
    assert_eq!(Block::from_payload(&arena, first.payload()), first);
  }

  #[test]
  fn test_mark_as_free_resets_link() {
    let (mut arena, block) = arena_with_block(16);
    block.mark_as_used(&mut arena);
    block.payload().fill(&mut arena, 0x11);

    let freed = block.mark_as_free(&mut arena);
    assert!(freed.next_reference().is_null(&arena));
    assert_eq!(freed.len(), 12);
  }

  #[test]
  fn test_claim_zeroes_payload() {
    let (mut arena, block) = arena_with_block(16);
    block.payload().fill(&mut arena, 0x5a);

    let payload = FreeBlock::new(&arena, block).claim(&mut arena);
    assert!(!block.is_free(&arena));
    assert_eq!(arena.slice(payload), &[0; 12]);
  }

  #[test]
  fn test_free_split_links_halves() {
    let (mut arena, block) = arena_with_block(40);
    let free = FreeBlock::new(&arena, block);
    free.next_reference().set(&mut arena, Offset::new(1000));

    let (first, second) = free.split(&mut arena, 8);
    assert_eq!(first.next_reference().target(&arena), Some(second.start()));
    assert_eq!(
      second.next_reference().target(&arena),
      Some(Offset::new(1000))
    );
    assert_eq!(first.next_free_block(&arena), Some(second));
  }

  #[test]
  fn test_free_join_inherits_later_link() {
    let (mut arena, block) = arena_with_block(40);
    let (first, second) = FreeBlock::new(&arena, block).split(&mut arena, 8);
    second.next_reference().reset(&mut arena);

    let joined = first.join_with(&mut arena, second);
    assert_eq!(joined.block(), block);
    assert!(joined.next_reference().is_null(&arena));
  }

  #[test]
  #[should_panic(expected = "states differ")]
  fn test_join_rejects_mixed_states() {
    let (mut arena, block) = arena_with_block(30);
    let (first, second) = block.split(&mut arena, 6);
    second.mark_as_used(&mut arena);
    first.join_with(&mut arena, second);
  }

  #[test]
  #[should_panic(expected = "but tail tag")]
  fn test_mismatched_tags_detected() {
    let (mut arena, block) = arena_with_block(16);
    block.region().write_i16(&mut arena, 14, 12);
    block.is_free(&arena);
  }

  #[test]
  #[should_panic(expected = "too small to split")]
  fn test_split_needs_viable_remainder() {
    let (mut arena, block) = arena_with_block(16);
    block.split(&mut arena, 6);
  }
}
