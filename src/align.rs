/// Size of a machine word. Every block size handed out by the heap is a
/// multiple of this value.
pub const WORD_SIZE: usize = core::mem::size_of::<usize>();

/// Rounds the given size up to the next multiple of the machine word size.
///
/// # Examples
///
/// ```rust
/// use brkalloc::{align, align::WORD_SIZE};
///
/// match WORD_SIZE {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::WORD_SIZE - 1) & !($crate::align::WORD_SIZE - 1)
  };
}

/// Same as [`align!`], but returns `None` instead of wrapping when `value` sits
/// within one word of `usize::MAX`.
pub fn checked_align(value: usize) -> Option<usize> {
  value
    .checked_add(WORD_SIZE - 1)
    .map(|v| v & !(WORD_SIZE - 1))
}
