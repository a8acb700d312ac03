//! Byte arena and the zero-copy [`Region`] views carved out of it.
//!
//! ```text
//!   Arena (id = 7, len = 32)
//!   ┌──┬──┬──┬──┬──┬──┬──┬──┬──┬──┬──┬─ ─ ─┬──┐
//!   │00│01│02│03│04│05│06│07│08│09│10│     │31│
//!   └──┴──┴──┴──┴──┴──┴──┴──┴──┴──┴──┴─ ─ ─┴──┘
//!         ▲                 ▲
//!         └─ Region { arena: 7, start: 2, len: 6 }
//! ```
//!
//! A `Region` never borrows the arena. Every read or write goes through an
//! explicit `&Arena`/`&mut Arena`, and the arena checks that the region was
//! carved out of it before touching a byte.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Largest arena whose offsets and block lengths all fit a positive `i16`.
pub const MAX_ARENA_SIZE: usize = 32 * 1024;

/// Position of a byte inside an arena.
///
/// Offsets are stored in the arena itself as 2-byte cells, so they are kept
/// apart from native pointers and references on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Offset(u16);

impl Offset {
  pub const fn new(
    value: u16,
  ) -> Self {
    Self(value)
  }

  pub const fn get(self) -> u16 {
    self.0
  }

  pub const fn as_usize(self) -> usize {
    self.0 as usize
  }
}

impl fmt::Display for Offset {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Identity of an arena, compared instead of the arena contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaId(u32);

impl ArenaId {
  fn next() -> Self {
    static NEXT_ID: AtomicU32 = AtomicU32::new(0);
    Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
  }
}

/// Fixed-size byte buffer, zero-filled on creation and never resized.
#[derive(Debug)]
pub struct Arena {
  id: ArenaId,
  bytes: Box<[u8]>,
}

impl Arena {
  pub fn new(
    len: usize,
  ) -> Self {
    verify!(
      len > 0 && len <= MAX_ARENA_SIZE,
      "arena length {} is outside 1..={}",
      len,
      MAX_ARENA_SIZE
    );
    Self {
      id: ArenaId::next(),
      bytes: vec![0u8; len].into_boxed_slice(),
    }
  }

  pub fn id(&self) -> ArenaId {
    self.id
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  /// Region covering every byte of the arena.
  pub fn whole(&self) -> Region {
    Region::new(self.id, self.len(), 0, self.len())
  }

  pub fn slice(
    &self,
    region: Region,
  ) -> &[u8] {
    self.check_owns(region);
    &self.bytes[region.start.as_usize()..region.end()]
  }

  pub fn slice_mut(
    &mut self,
    region: Region,
  ) -> &mut [u8] {
    self.check_owns(region);
    &mut self.bytes[region.start.as_usize()..region.end()]
  }

  /// Copies as many leading bytes of `from` as fit into `to`.
  pub fn copy(
    &mut self,
    from: Region,
    to: Region,
  ) -> usize {
    self.check_owns(from);
    self.check_owns(to);
    let count = from.len.min(to.len);
    let source = from.start.as_usize();
    self
      .bytes
      .copy_within(source..source + count, to.start.as_usize());
    count
  }

  fn check_owns(
    &self,
    region: Region,
  ) {
    verify!(
      region.arena == self.id,
      "region {} belongs to another arena",
      region
    );
  }
}

/// Non-owning view `(arena, start, len)` into an [`Arena`].
///
/// Two regions are equal only when they come from the same arena and cover
/// exactly the same bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
  arena: ArenaId,
  arena_len: usize,
  start: Offset,
  len: usize,
}

impl Region {
  fn new(
    arena: ArenaId,
    arena_len: usize,
    start: usize,
    len: usize,
  ) -> Self {
    verify!(len > 0, "region at {} is empty", start);
    verify!(
      start + len <= arena_len,
      "region [{}, {}] runs past the arena end {}",
      start,
      start + len,
      arena_len
    );
    Self {
      arena,
      arena_len,
      start: Offset::new(start as u16),
      len,
    }
  }

  pub fn arena(&self) -> ArenaId {
    self.arena
  }

  pub fn start(&self) -> Offset {
    self.start
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn end(&self) -> usize {
    self.start.as_usize() + self.len
  }

  /// Length of the arena this region was carved from.
  pub fn arena_len(&self) -> usize {
    self.arena_len
  }

  pub fn slice(
    &self,
    offset: usize,
    len: usize,
  ) -> Region {
    verify!(
      offset < self.len,
      "slicing {} at {} would leave it empty",
      self,
      offset
    );
    verify!(
      offset + len <= self.len,
      "slice {}+{} runs past the end of {}",
      offset,
      len,
      self
    );
    Region::new(
      self.arena,
      self.arena_len,
      self.start.as_usize() + offset,
      len,
    )
  }

  /// Splits into two adjacent regions, the first one `first_len` bytes long.
  pub fn split_at(
    &self,
    first_len: usize,
  ) -> (Region, Region) {
    verify!(
      first_len < self.len,
      "cannot split {} at {}",
      self,
      first_len
    );
    (
      self.slice(0, first_len),
      self.slice(first_len, self.len - first_len),
    )
  }

  pub fn join_with(
    &self,
    next: Region,
  ) -> Region {
    verify!(
      self.arena == next.arena,
      "joining regions of different arenas"
    );
    verify!(
      self.end() == next.start.as_usize(),
      "{} and {} are not adjacent",
      self,
      next
    );
    Region::new(
      self.arena,
      self.arena_len,
      self.start.as_usize(),
      self.len + next.len,
    )
  }

  /// The `len` bytes immediately before this region.
  pub fn left_adjacent(
    &self,
    len: usize,
  ) -> Region {
    verify!(
      self.start.as_usize() >= len,
      "no {} bytes to the left of {}",
      len,
      self
    );
    Region::new(
      self.arena,
      self.arena_len,
      self.start.as_usize() - len,
      len,
    )
  }

  /// The `len` bytes immediately after this region.
  pub fn right_adjacent(
    &self,
    len: usize,
  ) -> Region {
    verify!(
      self.end() + len <= self.arena_len,
      "no {} bytes to the right of {}",
      len,
      self
    );
    Region::new(self.arena, self.arena_len, self.end(), len)
  }

  pub fn with_length(
    &self,
    len: usize,
  ) -> Region {
    Region::new(self.arena, self.arena_len, self.start.as_usize(), len)
  }

  pub fn overlaps(
    &self,
    other: &Region,
  ) -> bool {
    self.arena == other.arena
      && self.start.as_usize() < other.end()
      && other.start.as_usize() < self.end()
  }

  pub fn contains(
    &self,
    other: &Region,
  ) -> bool {
    self.arena == other.arena
      && self.start <= other.start
      && other.end() <= self.end()
  }

  pub fn read_u8(
    &self,
    arena: &Arena,
    offset: usize,
  ) -> u8 {
    verify!(offset < self.len, "read at {} past the end of {}", offset, self);
    arena.slice(*self)[offset]
  }

  pub fn write_u8(
    &self,
    arena: &mut Arena,
    offset: usize,
    value: u8,
  ) {
    verify!(offset < self.len, "write at {} past the end of {}", offset, self);
    arena.slice_mut(*self)[offset] = value;
  }

  /// Reads a little-endian `i16` at `offset`.
  pub fn read_i16(
    &self,
    arena: &Arena,
    offset: usize,
  ) -> i16 {
    verify!(
      offset + 2 <= self.len,
      "read of 2 bytes at {} past the end of {}",
      offset,
      self
    );
    let bytes = arena.slice(*self);
    i16::from_le_bytes([bytes[offset], bytes[offset + 1]])
  }

  /// Writes a little-endian `i16` at `offset`.
  pub fn write_i16(
    &self,
    arena: &mut Arena,
    offset: usize,
    value: i16,
  ) {
    verify!(
      offset + 2 <= self.len,
      "write of 2 bytes at {} past the end of {}",
      offset,
      self
    );
    arena.slice_mut(*self)[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
  }

  pub fn fill(
    &self,
    arena: &mut Arena,
    value: u8,
  ) {
    arena.slice_mut(*self).fill(value);
  }
}

impl fmt::Display for Region {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "[{}, {}]", self.start, self.end())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_split_and_join() {
    let arena = Arena::new(64);
    let whole = arena.whole();

    let (head, rest) = whole.split_at(2);
    assert_eq!(head.start(), Offset::new(0));
    assert_eq!(head.len(), 2);
    assert_eq!(rest.start(), Offset::new(2));
    assert_eq!(rest.len(), 62);
    assert_eq!(head.end(), rest.start().as_usize());

    assert_eq!(head.join_with(rest), whole);
  }

  #[test]
  fn test_adjacent_regions() {
    let arena = Arena::new(64);
    let middle = arena.whole().slice(10, 20);

    let left = middle.left_adjacent(2);
    assert_eq!(left.start(), Offset::new(8));
    assert_eq!(left.end(), 10);

    let right = middle.right_adjacent(4);
    assert_eq!(right.start(), Offset::new(30));
    assert_eq!(right.len(), 4);

    assert_eq!(middle.with_length(2), arena.whole().slice(10, 2));
  }

  #[test]
  fn test_little_endian_io() {
    let mut arena = Arena::new(16);
    let region = arena.whole().slice(4, 4);

    region.write_i16(&mut arena, 0, -2);
    region.write_i16(&mut arena, 2, 0x0102);

    assert_eq!(arena.slice(region), &[0xfe, 0xff, 0x02, 0x01]);
    assert_eq!(region.read_i16(&arena, 0), -2);
    assert_eq!(region.read_i16(&arena, 2), 0x0102);
    assert_eq!(region.read_u8(&arena, 3), 0x01);

    region.write_u8(&mut arena, 1, 0x7f);
    assert_eq!(region.read_i16(&arena, 0), 0x7ffe);
  }

  #[test]
  fn test_fill_and_copy() {
    let mut arena = Arena::new(32);
    let source = arena.whole().slice(0, 4);
    let target = arena.whole().slice(10, 8);

    source.fill(&mut arena, 0xab);
    assert_eq!(arena.copy(source, target), 4);

    assert_eq!(&arena.slice(target)[..4], &[0xab; 4]);
    assert_eq!(&arena.slice(target)[4..], &[0; 4]);
  }

  #[test]
  fn test_overlap_and_containment() {
    let arena = Arena::new(64);
    let a = arena.whole().slice(0, 10);
    let b = arena.whole().slice(10, 10);
    let c = arena.whole().slice(5, 10);

    assert!(!a.overlaps(&b));
    assert!(a.overlaps(&c));
    assert!(c.overlaps(&b));
    assert!(arena.whole().contains(&c));
    assert!(!c.contains(&a));
  }

  #[test]
  fn test_equality_requires_same_arena() {
    let first = Arena::new(16);
    let second = Arena::new(16);

    assert_ne!(first.id(), second.id());
    assert_ne!(first.whole(), second.whole());
    assert_eq!(first.whole(), first.whole());
  }

  #[test]
  fn test_display() {
    let arena = Arena::new(16);
    assert_eq!(arena.whole().slice(2, 6).to_string(), "[2, 8]");
  }

  #[test]
  #[should_panic(expected = "belongs to another arena")]
  fn test_foreign_region_rejected() {
    let first = Arena::new(16);
    let second = Arena::new(16);
    first.slice(second.whole());
  }

  #[test]
  #[should_panic(expected = "not adjacent")]
  fn test_join_requires_adjacency() {
    let arena = Arena::new(16);
    let a = arena.whole().slice(0, 2);
    let b = arena.whole().slice(4, 2);
    a.join_with(b);
  }

  #[test]
  #[should_panic(expected = "runs past the end")]
  fn test_slice_out_of_range() {
    let arena = Arena::new(16);
    arena.whole().slice(10, 2).slice(1, 2);
  }

  #[test]
  #[should_panic(expected = "no 4 bytes to the left")]
  fn test_left_adjacent_at_arena_start() {
    let arena = Arena::new(16);
    arena.whole().slice(2, 2).left_adjacent(4);
  }
}
