use core::{marker::PhantomData, ptr};
use log::trace;

use crate::block::{Header, min_block};

/// Released blocks waiting to be reused, linked through their own payload.
///
/// ```text
///   head
///    │
///    ▼
///   ┌────────┬──────┬─────┐     ┌────────┬──────┬─────────┐
///   │ header │ next ──────────▶ │ header │ next │   ...   │ ──▶ null
///   └────────┴──────┴─────┘     └────────┴──────┴─────────┘
/// ```
///
/// The list is a stack: released blocks are pushed on the head, and only the
/// head is ever looked at when serving a request.
pub struct FreeList<H> {
  head: *mut u8,
  len: usize,
  _header: PhantomData<H>,
}

impl<H: Header> Default for FreeList<H> {
  fn default() -> Self {
    Self::new()
  }
}

impl<H: Header> FreeList<H> {
  pub const fn new() -> Self {
    Self {
      head: ptr::null_mut(),
      len: 0,
      _header: PhantomData,
    }
  }

  unsafe fn link(block: *mut u8) -> *mut *mut u8 {
    unsafe { block.add(H::SIZE) as *mut *mut u8 }
  }

  unsafe fn next(block: *mut u8) -> *mut u8 {
    unsafe { ptr::read(Self::link(block)) }
  }

  /// Pushes a free block on the head of the list.
  ///
  /// # Safety
  ///
  /// `block` must carry a valid header marked free, be at least
  /// [`min_block`] bytes, and not already be on the list.
  pub unsafe fn admit(
    &mut self,
    block: *mut u8,
  ) {
    unsafe {
      debug_assert!(!H::read_in_use(block));
      debug_assert!(H::read_size(block) >= min_block::<H>());

      trace!("admit {:?} ({} bytes)", block, H::read_size(block));

      ptr::write(Self::link(block), self.head);
    }

    self.head = block;
    self.len += 1;
  }

  /// Detaches the head if it can hold `needed` bytes.
  ///
  /// Nothing past the head is inspected. When the head is bigger than
  /// `needed` by at least a minimal block, the tail is cut off and pushed
  /// back; otherwise the whole block is returned. The returned block's
  /// header records its final size and is still marked free.
  pub unsafe fn try_take(
    &mut self,
    needed: usize,
  ) -> Option<*mut u8> {
    if self.head.is_null() {
      return None;
    }

    unsafe {
      let block = self.head;
      let size = H::read_size(block);

      if size < needed {
        trace!("miss: head {:?} holds {} bytes, need {}", block, size, needed);
        return None;
      }

      self.head = Self::next(block);
      self.len -= 1;

      let leftover = size - needed;
      if leftover >= min_block::<H>() {
        let tail = block.add(needed);
        H::write(tail, leftover, false);
        H::write(block, needed, false);
        trace!("split {:?}: {} bytes kept, {} bytes back at {:?}", block, needed, leftover, tail);
        self.admit(tail);
      }

      Some(block)
    }
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.head.is_null()
  }

  pub fn head(&self) -> *mut u8 {
    self.head
  }

  /// Walks the list from the head, yielding `(block, size)` pairs.
  pub fn iter(&self) -> Blocks<'_, H> {
    Blocks {
      current: self.head,
      _list: PhantomData,
    }
  }

  /// Sum of the sizes of every listed block, headers included.
  pub fn total_bytes(&self) -> usize {
    self.iter().map(|(_, size)| size).sum()
  }
}

pub struct Blocks<'a, H> {
  current: *mut u8,
  _list: PhantomData<&'a FreeList<H>>,
}

impl<H: Header> Iterator for Blocks<'_, H> {
  type Item = (*mut u8, usize);

  fn next(&mut self) -> Option<Self::Item> {
    if self.current.is_null() {
      return None;
    }

    unsafe {
      let block = self.current;
      let size = H::read_size(block);
      self.current = FreeList::<H>::next(block);

      Some((block, size))
    }
  }
}
