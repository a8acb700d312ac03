use crate::region::{Arena, Offset, Region};

/// Size in bytes of a reference cell.
pub const REFERENCE_SIZE: usize = 2;

/// Cell value meaning "points nowhere". Any negative value decodes as null.
pub const NULL_SENTINEL: i16 = -1;

/// A nullable offset stored in a 2-byte cell inside the arena.
///
/// The free-list head and the first two payload bytes of every free block
/// are references. Targets are offsets of block head tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reference {
  cell: Region,
}

impl Reference {
  pub fn new(
    cell: Region,
  ) -> Self {
    verify!(
      cell.len() == REFERENCE_SIZE,
      "reference cell {} is not {} bytes",
      cell,
      REFERENCE_SIZE
    );
    Self { cell }
  }

  pub fn cell(&self) -> Region {
    self.cell
  }

  pub fn is_null(
    &self,
    arena: &Arena,
  ) -> bool {
    self.target(arena).is_none()
  }

  pub fn target(
    &self,
    arena: &Arena,
  ) -> Option<Offset> {
    let raw = self.cell.read_i16(arena, 0);
    (raw >= 0).then(|| Offset::new(raw as u16))
  }

  pub fn set(
    &self,
    arena: &mut Arena,
    target: Offset,
  ) {
    self.store(arena, Some(target));
  }

  /// Points at whatever `other` points at, null included.
  pub fn set_from(
    &self,
    arena: &mut Arena,
    other: Reference,
  ) {
    let target = other.target(arena);
    self.store(arena, target);
  }

  pub fn reset(
    &self,
    arena: &mut Arena,
  ) {
    self.store(arena, None);
  }

  pub(crate) fn store(
    &self,
    arena: &mut Arena,
    target: Option<Offset>,
  ) {
    let raw = match target {
      Some(offset) => crate::verify::to_i16(offset.as_usize()),
      None => NULL_SENTINEL,
    };
    self.cell.write_i16(arena, 0, raw);
  }
}
