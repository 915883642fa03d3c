use core::ptr::{self, NonNull};
use log::debug;

use crate::{error::HeapError, source::HeapSource};

/// Bump allocation over the active batch, plus batch growth.
///
/// Only the most recent batch is ever bumped from. When it runs short, a new
/// batch replaces it and whatever was left of the old one is abandoned.
pub struct HeapGrower<S> {
  source: S,
  unit: usize,
  cursor: *mut u8,
  remaining: usize,
  batches: usize,
}

impl<S: HeapSource> HeapGrower<S> {
  pub const fn new(
    source: S,
    unit: usize,
  ) -> Self {
    Self {
      source,
      unit,
      cursor: ptr::null_mut(),
      remaining: 0,
      batches: 0,
    }
  }

  /// Smallest multiple of the batch unit strictly greater than `min`.
  pub fn batch_size(
    &self,
    min: usize,
  ) -> Option<usize> {
    (min / self.unit).checked_add(1)?.checked_mul(self.unit)
  }

  /// Requests a fresh batch able to hold `min` bytes and makes it active.
  ///
  /// On failure the active batch is left as it was.
  pub unsafe fn grow(
    &mut self,
    min: usize,
  ) -> Result<NonNull<u8>, HeapError> {
    let size = self.batch_size(min).ok_or(HeapError::SizeOverflow)?;

    let start = unsafe { self.source.extend(size) }.ok_or(HeapError::OutOfMemory { requested: size })?;

    debug!(
      "new batch of {} bytes at {:?}, abandoning {} bytes at {:?}",
      size, start, self.remaining, self.cursor
    );

    self.cursor = start.as_ptr();
    self.remaining = size;
    self.batches += 1;

    Ok(start)
  }

  /// Grows only if the active batch has fewer than `needed` bytes left.
  pub unsafe fn ensure(
    &mut self,
    needed: usize,
  ) -> Result<(), HeapError> {
    if self.remaining < needed {
      unsafe { self.grow(needed)? };
    }

    Ok(())
  }

  /// Takes `needed` bytes off the front of the active batch.
  ///
  /// # Safety
  ///
  /// A preceding [`ensure`](Self::ensure) must have succeeded for at least
  /// `needed` bytes.
  pub unsafe fn carve(
    &mut self,
    needed: usize,
  ) -> *mut u8 {
    debug_assert!(needed <= self.remaining);

    let block = self.cursor;
    self.cursor = unsafe { self.cursor.add(needed) };
    self.remaining -= needed;

    block
  }

  pub fn remaining(&self) -> usize {
    self.remaining
  }

  pub fn cursor(&self) -> *mut u8 {
    self.cursor
  }

  /// Number of batches obtained so far.
  pub fn batches(&self) -> usize {
    self.batches
  }

  pub fn unit(&self) -> usize {
    self.unit
  }

  pub fn source(&self) -> &S {
    &self.source
  }
}
