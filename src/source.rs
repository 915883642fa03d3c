use core::ptr::NonNull;
use libc::{c_void, intptr_t, sbrk};
use log::warn;

use crate::align::WORD_SIZE;

const SBRK_FAILED: *mut c_void = usize::MAX as *mut c_void;

/// The operating system primitive the heap grows through: extend a
/// contiguous data region by `bytes` and hand back the start of the new
/// extent.
///
/// Returning `None` means the region could not be extended. Implementations
/// must not change any observable state in that case.
pub trait HeapSource {
  /// # Safety
  ///
  /// The returned extent must be word aligned, at least `bytes` long, and
  /// must not overlap any extent returned earlier.
  unsafe fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>>;
}

/// Grows the program break with `sbrk(2)`.
///
/// Only one `Sbrk` should be driving the break at a time, and nothing else in
/// the process may move it concurrently.
#[derive(Debug, Default)]
pub struct Sbrk;

impl Sbrk {
  /// Current program break, as reported by `sbrk(0)`.
  pub fn program_break() -> *mut u8 {
    unsafe { sbrk(0) as *mut u8 }
  }
}

impl HeapSource for Sbrk {
  unsafe fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    unsafe {
      let current = sbrk(0);
      if current == SBRK_FAILED {
        return None;
      }

      // Keep every batch word aligned even if someone left the break odd.
      let pad = (current as usize).wrapping_neg() & (WORD_SIZE - 1);
      let increment = match bytes.checked_add(pad).map(intptr_t::try_from) {
        Some(Ok(increment)) => increment,
        _ => {
          warn!("sbrk: request of {} bytes does not fit intptr_t", bytes);
          return None;
        }
      };

      let address = sbrk(increment);

      if address == SBRK_FAILED {
        warn!("sbrk: cannot extend program break by {} bytes", increment);
        return None;
      }

      NonNull::new((address as *mut u8).add(pad))
    }
  }
}

/// A fixed-capacity region owned by the heap, handed out front to back.
///
/// Behaves like a program break with a hard ceiling, which makes heap
/// growth deterministic and observable: every request is recorded, whether
/// it succeeded or not.
pub struct Arena {
  memory: Box<[usize]>,
  used: usize,
  requests: Vec<usize>,
}

impl Arena {
  /// Creates an arena of `capacity` bytes, rounded up to whole words.
  pub fn new(capacity: usize) -> Self {
    let words = capacity.div_ceil(WORD_SIZE);

    Self {
      memory: vec![0usize; words].into_boxed_slice(),
      used: 0,
      requests: Vec::new(),
    }
  }

  pub fn capacity(&self) -> usize {
    self.memory.len() * WORD_SIZE
  }

  pub fn used(&self) -> usize {
    self.used
  }

  /// Sizes of every `extend` call so far, in call order.
  pub fn requests(&self) -> &[usize] {
    &self.requests
  }

  /// Whether `address` lies inside the bytes handed out so far.
  pub fn contains(
    &self,
    address: *const u8,
  ) -> bool {
    let start = self.memory.as_ptr() as usize;
    let address = address as usize;

    address >= start && address < start + self.used
  }
}

impl HeapSource for Arena {
  unsafe fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    self.requests.push(bytes);

    let bytes = crate::align::checked_align(bytes)?;
    if bytes > self.capacity() - self.used {
      warn!(
        "arena: {} bytes requested, {} of {} left",
        bytes,
        self.capacity() - self.used,
        self.capacity()
      );
      return None;
    }

    let start = unsafe { (self.memory.as_mut_ptr() as *mut u8).add(self.used) };
    self.used += bytes;

    NonNull::new(start)
  }
}
