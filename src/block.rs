use core::ptr;

use crate::align::WORD_SIZE;

/// Encoding of the metadata prefixed to every block, allocated or free.
///
/// A header records the total block size (header + payload, word aligned)
/// and whether the block is currently handed out. Implementations only
/// decide the layout; the free list and the heap never touch header bytes
/// directly.
///
/// # Safety
///
/// `at` must point to `SIZE` writable, word aligned bytes.
pub trait Header {
  /// Bytes occupied by the header. Must be a multiple of the word size.
  const SIZE: usize;

  unsafe fn write(
    at: *mut u8,
    size: usize,
    in_use: bool,
  );

  unsafe fn read_size(at: *const u8) -> usize;

  unsafe fn read_in_use(at: *const u8) -> bool;

  /// Clears or sets the in-use flag, keeping the recorded size.
  unsafe fn set_in_use(
    at: *mut u8,
    in_use: bool,
  ) {
    unsafe {
      let size = Self::read_size(at);
      Self::write(at, size, in_use);
    }
  }
}

/// One word: `size | in_use`.
///
/// Aligned sizes never set the low bit, so the flag lives there.
pub struct PackedHeader;

const IN_USE: usize = 1;

impl Header for PackedHeader {
  const SIZE: usize = WORD_SIZE;

  unsafe fn write(
    at: *mut u8,
    size: usize,
    in_use: bool,
  ) {
    debug_assert_eq!(size & IN_USE, 0);
    let word = if in_use { size | IN_USE } else { size };
    unsafe { ptr::write(at as *mut usize, word) }
  }

  unsafe fn read_size(at: *const u8) -> usize {
    unsafe { ptr::read(at as *const usize) & !IN_USE }
  }

  unsafe fn read_in_use(at: *const u8) -> bool {
    unsafe { ptr::read(at as *const usize) & IN_USE != 0 }
  }
}

/// Two words: size, then flag.
#[repr(C)]
pub struct SplitHeader {
  size: usize,
  in_use: usize,
}

impl Header for SplitHeader {
  const SIZE: usize = core::mem::size_of::<SplitHeader>();

  unsafe fn write(
    at: *mut u8,
    size: usize,
    in_use: bool,
  ) {
    let header = SplitHeader {
      size,
      in_use: in_use as usize,
    };
    unsafe { ptr::write(at as *mut SplitHeader, header) }
  }

  unsafe fn read_size(at: *const u8) -> usize {
    unsafe { (*(at as *const SplitHeader)).size }
  }

  unsafe fn read_in_use(at: *const u8) -> bool {
    unsafe { (*(at as *const SplitHeader)).in_use != 0 }
  }
}

/// Smallest block the heap ever creates: a header plus room for the free
/// list link that is written over the payload once the block is released.
pub const fn min_block<H: Header>() -> usize {
  H::SIZE + WORD_SIZE
}

/// Address of the payload that follows the header at `block`.
pub unsafe fn payload<H: Header>(block: *mut u8) -> *mut u8 {
  unsafe { block.add(H::SIZE) }
}

/// Inverse of [`payload`].
pub unsafe fn header_of<H: Header>(payload: *mut u8) -> *mut u8 {
  unsafe { payload.sub(H::SIZE) }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn roundtrip<H: Header>() {
    let mut storage = [0usize; 4];
    let at = storage.as_mut_ptr() as *mut u8;

    unsafe {
      H::write(at, 6 * WORD_SIZE, true);
      assert_eq!(H::read_size(at), 6 * WORD_SIZE);
      assert!(H::read_in_use(at));

      H::set_in_use(at, false);
      assert_eq!(H::read_size(at), 6 * WORD_SIZE);
      assert!(!H::read_in_use(at));
    }
  }

  #[test]
  fn test_packed_header() {
    roundtrip::<PackedHeader>();
  }

  #[test]
  fn test_split_header() {
    roundtrip::<SplitHeader>();
  }

  #[test]
  fn test_packed_flag_uses_low_bit() {
    let mut word = 0usize;
    let at = &mut word as *mut usize as *mut u8;

    unsafe { PackedHeader::write(at, 4 * WORD_SIZE, true) };
    assert_eq!(word, 4 * WORD_SIZE | 1);

    unsafe { PackedHeader::set_in_use(at, false) };
    assert_eq!(word, 4 * WORD_SIZE);
  }

  #[test]
  fn test_header_sizes() {
    assert_eq!(PackedHeader::SIZE, WORD_SIZE);
    assert_eq!(SplitHeader::SIZE, 2 * WORD_SIZE);
    assert_eq!(min_block::<PackedHeader>(), 2 * WORD_SIZE);
    assert_eq!(min_block::<SplitHeader>(), 3 * WORD_SIZE);
  }

  #[test]
  fn test_payload_roundtrip() {
    let mut storage = [0usize; 4];
    let block = storage.as_mut_ptr() as *mut u8;

    unsafe {
      let data = payload::<SplitHeader>(block);
      assert_eq!(data as usize - block as usize, 2 * WORD_SIZE);
      assert_eq!(header_of::<SplitHeader>(data), block);
    }
  }
}
