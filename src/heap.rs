use core::ptr::{self, NonNull};
use log::trace;

use crate::{
  align::checked_align,
  block::{Header, PackedHeader, header_of, min_block, payload},
  config::{BATCH_UNIT, HeapConfig},
  error::HeapError,
  free_list::FreeList,
  grower::HeapGrower,
  source::HeapSource,
};

/// Snapshot of the heap's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
  /// Batches obtained from the heap source so far.
  pub batches: usize,
  /// Bytes still available for bump allocation in the active batch.
  pub batch_remaining: usize,
  /// Blocks sitting on the free list.
  pub free_blocks: usize,
  /// Total size of those blocks, headers included.
  pub free_bytes: usize,
}

/// An allocator context: one growable heap, its active batch and its free
/// list.
///
/// Every block is prefixed with an `H` header. Requests are served from the
/// head of the free list when it is large enough, otherwise carved off the
/// active batch, growing the heap through `S` when the batch runs short.
///
/// The context is not synchronized. Wrap it in a
/// [`LockedHeap`](crate::LockedHeap) to share it between threads.
pub struct Heap<S, H = PackedHeader> {
  grower: HeapGrower<S>,
  free: FreeList<H>,
}

// The heap exclusively owns every block it tracks; the raw pointers inside
// never alias memory owned by anyone else.
unsafe impl<S: Send, H> Send for Heap<S, H> {}

impl<S: HeapSource> Heap<S, PackedHeader> {
  /// A heap with packed one-word headers and the default batch unit.
  pub const fn new(source: S) -> Self {
    Self {
      grower: HeapGrower::new(source, BATCH_UNIT),
      free: FreeList::new(),
    }
  }
}

impl<S: HeapSource, H: Header> Heap<S, H> {
  pub fn with_config(
    source: S,
    config: HeapConfig,
  ) -> Result<Self, HeapError> {
    config.validate()?;

    Ok(Self {
      grower: HeapGrower::new(source, config.batch_unit),
      free: FreeList::new(),
    })
  }

  /// Total block size needed to serve a `size` byte request.
  fn block_size(size: usize) -> Result<usize, HeapError> {
    let total = size
      .checked_add(H::SIZE)
      .and_then(checked_align)
      .ok_or(HeapError::SizeOverflow)?;

    Ok(total.max(min_block::<H>()))
  }

  /// Returns a pointer to at least `size` usable, word aligned bytes.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, HeapError> {
    let needed = Self::block_size(size)?;

    unsafe {
      if let Some(block) = self.free.try_take(needed) {
        H::set_in_use(block, true);
        trace!("allocate({}): reused {:?} ({} bytes)", size, block, H::read_size(block));

        return Ok(NonNull::new_unchecked(payload::<H>(block)));
      }

      self.grower.ensure(needed)?;

      let block = self.grower.carve(needed);
      H::write(block, needed, true);
      trace!("allocate({}): carved {:?} ({} bytes)", size, block, needed);

      Ok(NonNull::new_unchecked(payload::<H>(block)))
    }
  }

  /// Allocates room for `count` elements of `size` bytes and zeroes it.
  ///
  /// A zero `count` or `size` is refused with [`HeapError::ZeroSized`]
  /// rather than producing an empty allocation.
  pub fn zero_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> Result<NonNull<u8>, HeapError> {
    if count == 0 || size == 0 {
      return Err(HeapError::ZeroSized);
    }

    let total = count.checked_mul(size).ok_or(HeapError::SizeOverflow)?;
    let address = self.allocate(total)?;

    unsafe { ptr::write_bytes(address.as_ptr(), 0, total) };

    Ok(address)
  }

  /// Hands a block back to the free list. Null is ignored.
  ///
  /// Released blocks are never merged with their neighbours and never
  /// returned to the heap source.
  ///
  /// # Safety
  ///
  /// `address` must be null or a live pointer returned by this heap.
  pub unsafe fn release(
    &mut self,
    address: *mut u8,
  ) {
    if address.is_null() {
      return;
    }

    unsafe {
      let block = header_of::<H>(address);
      debug_assert!(H::read_in_use(block), "release of a free block {:?}", address);

      H::set_in_use(block, false);
      trace!("release {:?} ({} bytes)", block, H::read_size(block));

      self.free.admit(block);
    }
  }

  /// Makes `address` able to hold `size` bytes, moving it if needed.
  ///
  /// A null `address` behaves like [`allocate`](Self::allocate). A request
  /// that already fits returns `address` unchanged, even when shrinking.
  /// Otherwise the contents move to a new block and the old one is
  /// released; if that allocation fails the old block is left alone.
  ///
  /// # Safety
  ///
  /// `address` must be null or a live pointer returned by this heap.
  pub unsafe fn resize(
    &mut self,
    address: *mut u8,
    size: usize,
  ) -> Result<NonNull<u8>, HeapError> {
    let Some(old) = NonNull::new(address) else {
      return self.allocate(size);
    };

    unsafe {
      let capacity = self.usable_size(address);
      if size <= capacity {
        return Ok(old);
      }

      let new = self.allocate(size)?;
      ptr::copy_nonoverlapping(address, new.as_ptr(), capacity);
      self.release(address);

      trace!("resize {:?} -> {:?} ({} bytes)", address, new, size);

      Ok(new)
    }
  }

  /// Payload bytes available behind `address`.
  ///
  /// # Safety
  ///
  /// `address` must be a live pointer returned by this heap.
  pub unsafe fn usable_size(
    &self,
    address: *mut u8,
  ) -> usize {
    unsafe { H::read_size(header_of::<H>(address)) - H::SIZE }
  }

  pub fn stats(&self) -> HeapStats {
    HeapStats {
      batches: self.grower.batches(),
      batch_remaining: self.grower.remaining(),
      free_blocks: self.free.len(),
      free_bytes: self.free.total_bytes(),
    }
  }

  pub fn free_list(&self) -> &FreeList<H> {
    &self.free
  }

  pub fn source(&self) -> &S {
    self.grower.source()
  }

  pub fn batch_unit(&self) -> usize {
    self.grower.unit()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{align, align::WORD_SIZE, block::SplitHeader, source::Arena};
  use test_log::test;

  fn heap(capacity: usize) -> Heap<Arena> {
    Heap::new(Arena::new(capacity))
  }

  unsafe fn fill(
    address: NonNull<u8>,
    len: usize,
    byte: u8,
  ) {
    unsafe { ptr::write_bytes(address.as_ptr(), byte, len) }
  }

  unsafe fn bytes<'a>(
    address: NonNull<u8>,
    len: usize,
  ) -> &'a [u8] {
    unsafe { core::slice::from_raw_parts(address.as_ptr(), len) }
  }

  #[test]
  fn test_alloc() {
    let mut heap = heap(64 * 1024);

    unsafe {
      let first_addr = heap.allocate(8).unwrap().as_ptr() as *mut u64;

      *first_addr = 3u64;

      assert_eq!(*first_addr, 3);

      let size: usize = 6;

      let second_addr = heap.allocate(size * 2).unwrap().as_ptr() as *mut u16;

      for i in 0..size {
        *(second_addr.add(i)) = (i + 1) as u16;
      }

      assert_eq!(*first_addr, 3);

      for i in 0..size {
        assert_eq!((i + 1) as u16, *(second_addr.add(i)))
      }

      assert_eq!(first_addr as usize % WORD_SIZE, 0);
      assert_eq!(second_addr as usize % WORD_SIZE, 0);
      assert!(heap.source().contains(second_addr as *const u8));
    }
  }

  #[test]
  fn test_reuse_after_release() {
    let mut heap = heap(64 * 1024);

    for size in [0, 1, 7, 24, 100, 1000, 4096] {
      let first = heap.allocate(size).unwrap();
      unsafe { heap.release(first.as_ptr()) };
      let second = heap.allocate(size).unwrap();

      assert_eq!(first, second, "size {}", size);
    }
  }

  #[test]
  fn test_head_first_fit_scenario() {
    let mut heap = heap(64 * 1024);

    let first = heap.allocate(10).unwrap();
    let second = heap.allocate(20).unwrap();
    unsafe { heap.release(first.as_ptr()) };
    let third = heap.allocate(10).unwrap();

    assert_eq!(third, first);
    assert_ne!(third, second);
    assert!(heap.free_list().is_empty());
  }

  #[test]
  fn test_fresh_blocks_are_contiguous() {
    let mut heap = heap(64 * 1024);

    let first = heap.allocate(10).unwrap();
    let second = heap.allocate(20).unwrap();

    let expected = align!(10 + WORD_SIZE);
    assert_eq!(second.as_ptr() as usize - first.as_ptr() as usize, expected);
  }

  #[test]
  fn test_growth_rounds_to_next_batch_unit() {
    let mut heap = heap(64 * 1024);

    heap.allocate(BATCH_UNIT + 1).unwrap();

    let needed = align!(BATCH_UNIT + 1 + WORD_SIZE);
    let expected = (needed / BATCH_UNIT + 1) * BATCH_UNIT;
    assert_eq!(heap.source().requests(), &[expected]);
    assert_eq!(expected, 2 * BATCH_UNIT);
    assert_eq!(heap.stats().batches, 1);
  }

  #[test]
  fn test_exact_multiple_gets_extra_unit() {
    let mut heap = heap(64 * 1024);

    heap.allocate(BATCH_UNIT - WORD_SIZE).unwrap();

    assert_eq!(heap.source().requests(), &[2 * BATCH_UNIT]);
  }

  #[test]
  fn test_growth_abandons_batch_tail() {
    let mut heap = heap(64 * 1024);

    heap.allocate(4000).unwrap();
    let left = heap.stats().batch_remaining;
    let big = heap.allocate(left + 1).unwrap();

    let stats = heap.stats();
    assert_eq!(stats.batches, 2);
    assert_eq!(heap.source().used(), 2 * BATCH_UNIT);
    assert_eq!(stats.free_blocks, 0);
    assert!(unsafe { heap.usable_size(big.as_ptr()) } > left);
  }

  #[test]
  fn test_out_of_memory_commits_nothing() {
    let mut heap = heap(BATCH_UNIT);

    let small = heap.allocate(16).unwrap();
    let before = heap.stats();

    assert_eq!(
      heap.allocate(5000),
      Err(HeapError::OutOfMemory {
        requested: 2 * BATCH_UNIT
      })
    );
    assert_eq!(heap.stats(), before);

    let next = heap.allocate(16).unwrap();
    assert_eq!(
      next.as_ptr() as usize - small.as_ptr() as usize,
      align!(16 + WORD_SIZE)
    );
  }

  #[test]
  fn test_size_overflow() {
    let mut heap = heap(BATCH_UNIT);

    assert_eq!(heap.allocate(usize::MAX), Err(HeapError::SizeOverflow));
    assert_eq!(
      heap.allocate(usize::MAX - WORD_SIZE),
      Err(HeapError::SizeOverflow)
    );
    assert!(heap.source().requests().is_empty());
  }

  #[test]
  fn test_zero_allocate_zeroes_reused_block() {
    let mut heap = heap(64 * 1024);

    let dirty = heap.allocate(64).unwrap();
    unsafe {
      fill(dirty, 64, 0xAB);
      heap.release(dirty.as_ptr());
    }

    let zeroed = heap.zero_allocate(8, 8).unwrap();

    assert_eq!(zeroed, dirty);
    assert!(unsafe { bytes(zeroed, 64) }.iter().all(|&b| b == 0));
  }

  #[test]
  fn test_zero_allocate_rejects_zero_arguments() {
    let mut heap = heap(64 * 1024);

    assert_eq!(heap.zero_allocate(0, 8), Err(HeapError::ZeroSized));
    assert_eq!(heap.zero_allocate(8, 0), Err(HeapError::ZeroSized));
    assert_eq!(heap.zero_allocate(0, 0), Err(HeapError::ZeroSized));
    assert!(heap.source().requests().is_empty());
  }

  #[test]
  fn test_zero_allocate_detects_overflow() {
    let mut heap = heap(64 * 1024);

    assert_eq!(
      heap.zero_allocate(usize::MAX / 2, 3),
      Err(HeapError::SizeOverflow)
    );
    assert!(heap.source().requests().is_empty());
  }

  #[test]
  fn test_release_null_is_noop() {
    let mut heap = heap(BATCH_UNIT);

    unsafe { heap.release(ptr::null_mut()) };

    assert_eq!(heap.stats().free_blocks, 0);
  }

  #[test]
  fn test_release_keeps_payload() {
    let mut heap = heap(64 * 1024);

    let address = heap.allocate(64).unwrap();
    unsafe {
      fill(address, 64, 0x5A);
      heap.release(address.as_ptr());

      // The link overwrites the first word only.
      assert!(bytes(address, 64)[WORD_SIZE..].iter().all(|&b| b == 0x5A));
    }
  }

  #[test]
  fn test_releases_are_not_coalesced() {
    let mut heap = heap(64 * 1024);

    let sizes = [16, 40, 8, 120];
    let blocks: Vec<_> = sizes.iter().map(|&s| heap.allocate(s).unwrap()).collect();
    let expected: usize = sizes.iter().map(|&s| align!(s + WORD_SIZE)).sum();

    for block in &blocks {
      unsafe { heap.release(block.as_ptr()) };
    }

    let stats = heap.stats();
    assert_eq!(stats.free_blocks, sizes.len());
    assert_eq!(stats.free_bytes, expected);

    // Adjacent free neighbours could hold this, but nothing merges them.
    let wide = heap.allocate(200).unwrap();
    assert!(blocks.iter().all(|&b| b != wide));
    assert_eq!(heap.stats().free_blocks, sizes.len());
  }

  #[test]
  fn test_reuse_splits_oversized_head() {
    let mut heap = heap(64 * 1024);

    let big = heap.allocate(256).unwrap();
    unsafe { heap.release(big.as_ptr()) };

    let small = heap.allocate(16).unwrap();
    assert_eq!(small, big);

    let leftover = align!(256 + WORD_SIZE) - align!(16 + WORD_SIZE);
    assert_eq!(
      heap.free_list().iter().map(|(_, size)| size).collect::<Vec<_>>(),
      vec![leftover]
    );
    assert_eq!(unsafe { heap.usable_size(small.as_ptr()) }, 16);

    // The split-off tail serves the next request.
    let next = heap.allocate(32).unwrap();
    assert_eq!(
      next.as_ptr() as usize,
      small.as_ptr() as usize + align!(16 + WORD_SIZE)
    );
  }

  #[test]
  fn test_resize_null_allocates() {
    let mut heap = heap(BATCH_UNIT);

    let address = unsafe { heap.resize(ptr::null_mut(), 40) }.unwrap();

    assert!(unsafe { heap.usable_size(address.as_ptr()) } >= 40);
    assert_eq!(heap.stats().batches, 1);
  }

  #[test]
  fn test_resize_within_capacity_keeps_pointer() {
    let mut heap = heap(BATCH_UNIT);

    let address = heap.allocate(20).unwrap();
    let capacity = unsafe { heap.usable_size(address.as_ptr()) };

    unsafe {
      assert_eq!(heap.resize(address.as_ptr(), capacity), Ok(address));
      assert_eq!(heap.resize(address.as_ptr(), 1), Ok(address));
      assert_eq!(heap.usable_size(address.as_ptr()), capacity);
    }
    assert_eq!(heap.stats().free_blocks, 0);
  }

  #[test]
  fn test_resize_moves_and_releases() {
    let mut heap = heap(64 * 1024);

    let old = heap.allocate(24).unwrap();
    let capacity = unsafe { heap.usable_size(old.as_ptr()) };
    for i in 0..capacity {
      unsafe { *old.as_ptr().add(i) = i as u8 };
    }

    let new = unsafe { heap.resize(old.as_ptr(), 200) }.unwrap();

    assert_ne!(new, old);
    let expected: Vec<u8> = (0..capacity).map(|i| i as u8).collect();
    assert_eq!(unsafe { bytes(new, capacity) }, &expected[..]);
    assert_eq!(heap.free_list().head(), unsafe { header_of::<PackedHeader>(old.as_ptr()) });

    // The old block is only handed out again once requested.
    let other = heap.allocate(300).unwrap();
    assert_ne!(other, old);
    assert_ne!(other, new);
  }

  #[test]
  fn test_failed_resize_leaves_block() {
    let mut heap = heap(BATCH_UNIT);

    let address = heap.allocate(32).unwrap();
    unsafe { fill(address, 32, 0x11) };

    assert_eq!(
      unsafe { heap.resize(address.as_ptr(), 3 * BATCH_UNIT) },
      Err(HeapError::OutOfMemory {
        requested: 4 * BATCH_UNIT
      })
    );
    assert_eq!(heap.stats().free_blocks, 0);
    assert!(unsafe { bytes(address, 32) }.iter().all(|&b| b == 0x11));
  }

  #[test]
  fn test_split_header_heap() {
    let mut heap: Heap<Arena, SplitHeader> =
      Heap::with_config(Arena::new(4 * 256), HeapConfig::with_batch_unit(256).unwrap()).unwrap();

    let first = heap.allocate(10).unwrap();
    let second = heap.allocate(20).unwrap();
    assert_eq!(
      second.as_ptr() as usize - first.as_ptr() as usize,
      align!(10 + 2 * WORD_SIZE)
    );

    unsafe { heap.release(first.as_ptr()) };
    assert_eq!(heap.allocate(10).unwrap(), first);
    assert_eq!(heap.source().requests(), &[256]);
  }

  #[test]
  fn test_with_config_rejects_bad_unit() {
    let result = Heap::<Arena, PackedHeader>::with_config(Arena::new(0), HeapConfig { batch_unit: 3 });

    assert!(matches!(result, Err(HeapError::InvalidBatchUnit(3))));
  }

  /// Live payload ranges never overlap, whatever the call sequence.
  #[test]
  fn test_live_blocks_never_overlap() {
    let mut heap = heap(4 * 1024 * 1024);
    let mut live: Vec<(NonNull<u8>, usize, u8)> = Vec::new();
    let mut state: u64 = 0x2545_F491_4F6C_DD1D;
    let mut next = move || {
      state ^= state << 13;
      state ^= state >> 7;
      state ^= state << 17;
      state as usize
    };

    for round in 0..2000 {
      let tag = (round % 251) as u8;

      let op = if live.is_empty() { 0 } else { next() % 3 };

      match op {
        0 => {
          let len = next() % 300;
          let address = heap.allocate(len).unwrap();
          unsafe { fill(address, len, tag) };
          live.push((address, len, tag));
        }
        1 => {
          let (address, len, old_tag) = live.swap_remove(next() % live.len());
          assert!(unsafe { bytes(address, len) }.iter().all(|&b| b == old_tag));
          unsafe { heap.release(address.as_ptr()) };
        }
        _ => {
          let index = next() % live.len();
          let (address, len, old_tag) = live[index];
          let new_len = next() % 600;
          let moved = unsafe { heap.resize(address.as_ptr(), new_len) }.unwrap();
          let kept = len.min(new_len);
          assert!(unsafe { bytes(moved, kept) }.iter().all(|&b| b == old_tag));
          unsafe { fill(moved, new_len, tag) };
          live[index] = (moved, new_len, tag);
        }
      }

      let mut ranges: Vec<(usize, usize)> = live
        .iter()
        .map(|&(address, _, _)| {
          let start = address.as_ptr() as usize;
          (start, start + unsafe { heap.usable_size(address.as_ptr()) })
        })
        .collect();
      ranges.sort();

      for pair in ranges.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "overlap {:?}", pair);
      }
    }
  }
}
