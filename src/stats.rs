use crate::block::TAG_SIZE;

/// Usage snapshot of one arena, gathered by walking its blocks.
///
/// Byte counts include boundary tags; the free-list head cell is counted in
/// neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub arena_size: usize,
  pub used_blocks: usize,
  pub free_blocks: usize,
  pub used_bytes: usize,
  pub free_bytes: usize,
  pub largest_free_payload: usize,
}

impl HeapStats {
  pub(crate) fn new(
    arena_size: usize,
  ) -> Self {
    Self {
      arena_size,
      ..Self::default()
    }
  }

  pub(crate) fn record(
    &mut self,
    block_len: usize,
    is_free: bool,
  ) {
    if is_free {
      self.free_blocks += 1;
      self.free_bytes += block_len;
      self.largest_free_payload = self
        .largest_free_payload
        .max(block_len - 2 * TAG_SIZE);
    } else {
      self.used_blocks += 1;
      self.used_bytes += block_len;
    }
  }

  /// Payload bytes available across all free blocks.
  pub fn free_payload(&self) -> usize {
    self.free_bytes - self.free_blocks * 2 * TAG_SIZE
  }

  /// Share of free payload outside the largest free block, in `0.0..=1.0`.
  pub fn fragmentation(&self) -> f64 {
    let free_payload = self.free_payload();
    if free_payload == 0 {
      return 0.0;
    }
    1.0 - self.largest_free_payload as f64 / free_payload as f64
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_record() {
    let mut stats = HeapStats::new(64);
    stats.record(14, false);
    stats.record(20, true);
    stats.record(28, true);

    assert_eq!(stats.used_blocks, 1);
    assert_eq!(stats.used_bytes, 14);
    assert_eq!(stats.free_blocks, 2);
    assert_eq!(stats.free_bytes, 48);
    assert_eq!(stats.largest_free_payload, 24);
    assert_eq!(stats.free_payload(), 40);
    assert!((stats.fragmentation() - 0.4).abs() < 1e-9);
  }

  #[test]
  fn test_fragmentation_without_free_space() {
    let mut stats = HeapStats::new(16);
    stats.record(14, false);
    assert_eq!(stats.fragmentation(), 0.0);
  }
}
