use core::{
  alloc::{GlobalAlloc, Layout},
  ptr::{self, NonNull},
};

use crate::{
  align::WORD_SIZE,
  block::{Header, PackedHeader},
  error::HeapError,
  heap::Heap,
  source::HeapSource,
};

/// A [`Heap`] behind a single spin lock.
///
/// Every operation takes the lock for its whole duration, growth included,
/// so the free list and the active batch are never seen half updated.
pub struct LockedHeap<S, H = PackedHeader> {
  inner: spin::Mutex<Heap<S, H>>,
}

impl<S, H> LockedHeap<S, H> {
  pub const fn new(heap: Heap<S, H>) -> Self {
    LockedHeap {
      inner: spin::Mutex::new(heap),
    }
  }

  pub fn lock(&self) -> spin::MutexGuard<'_, Heap<S, H>> {
    self.inner.lock()
  }
}

impl<S: HeapSource, H: Header> LockedHeap<S, H> {
  pub fn allocate(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>, HeapError> {
    self.lock().allocate(size)
  }

  pub fn zero_allocate(
    &self,
    count: usize,
    size: usize,
  ) -> Result<NonNull<u8>, HeapError> {
    self.lock().zero_allocate(count, size)
  }

  /// # Safety
  ///
  /// See [`Heap::release`].
  pub unsafe fn release(
    &self,
    address: *mut u8,
  ) {
    unsafe { self.lock().release(address) }
  }

  /// # Safety
  ///
  /// See [`Heap::resize`].
  pub unsafe fn resize(
    &self,
    address: *mut u8,
    size: usize,
  ) -> Result<NonNull<u8>, HeapError> {
    unsafe { self.lock().resize(address, size) }
  }
}

/// Payloads are only ever word aligned; stricter layouts are refused.
unsafe impl<S: HeapSource, H: Header> GlobalAlloc for LockedHeap<S, H> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > WORD_SIZE {
      return ptr::null_mut();
    }

    self
      .allocate(layout.size())
      .map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > WORD_SIZE {
      return ptr::null_mut();
    }

    self
      .zero_allocate(layout.size(), 1)
      .map_or(ptr::null_mut(), NonNull::as_ptr)
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    unsafe { self.release(ptr) }
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    if layout.align() > WORD_SIZE {
      return ptr::null_mut();
    }

    unsafe { self.resize(ptr, new_size) }.map_or(ptr::null_mut(), NonNull::as_ptr)
  }
}
