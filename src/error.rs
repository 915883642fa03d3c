use core::fmt;

/// Why a heap operation could not hand out memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
  /// The heap source refused to extend the heap by `requested` bytes.
  OutOfMemory { requested: usize },
  /// `zero_allocate` was called with a zero element count or element size.
  ZeroSized,
  /// The size arithmetic for a request does not fit in `usize`.
  SizeOverflow,
  /// A batch unit that is zero or not a multiple of the word size.
  InvalidBatchUnit(usize),
}

impl fmt::Display for HeapError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      HeapError::OutOfMemory { requested } => {
        write!(f, "heap source could not provide {} bytes", requested)
      }
      HeapError::ZeroSized => write!(f, "zero-sized zeroed allocation requested"),
      HeapError::SizeOverflow => write!(f, "allocation size overflows usize"),
      HeapError::InvalidBatchUnit(unit) => {
        write!(f, "batch unit {} is not a non-zero multiple of the word size", unit)
      }
    }
  }
}

impl std::error::Error for HeapError {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display() {
    assert_eq!(
      HeapError::OutOfMemory { requested: 8192 }.to_string(),
      "heap source could not provide 8192 bytes"
    );
    assert_eq!(HeapError::SizeOverflow.to_string(), "allocation size overflows usize");
    assert!(HeapError::InvalidBatchUnit(3).to_string().contains('3'));
  }
}
