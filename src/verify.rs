/// Aborts the current operation when an allocator invariant does not hold.
///
/// Violations are programmer errors (mismatched boundary tags, out-of-range
/// offsets, regions from another arena), so they are logged at `error` level
/// and turned into a panic rather than a recoverable error.
///
/// # Examples
///
/// ```rust
/// use tagalloc::verify;
///
/// let length = 8;
/// verify!(length >= 8);
/// verify!(length % 2 == 0, "length {} is not even", length);
/// ```
#[macro_export]
macro_rules! verify {
  ($condition:expr $(,)?) => {
    $crate::verify!($condition, "{}", stringify!($condition))
  };
  ($condition:expr, $($message:tt)+) => {
    if !$condition {
      let message = format!($($message)+);
      $crate::__tracing::error!(condition = stringify!($condition), "{}", message);
      panic!("allocator invariant violated: {}", message);
    }
  };
}

/// Narrows a byte count into the signed 16-bit range used by tags and references.
pub(crate) fn to_i16(
  value: usize,
) -> i16 {
  verify!(
    value <= i16::MAX as usize,
    "{} does not fit a 16-bit tag",
    value
  );
  value as i16
}
