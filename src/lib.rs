//! # brkalloc - A Free-List Heap Allocator over the Program Break
//!
//! This crate provides a small general-purpose allocator (allocate,
//! zero-allocate, resize, release) that manages one contiguous heap grown
//! on demand, by default through the `sbrk` system call.
//!
//! ## Overview
//!
//! The heap grows in **batches**: whole multiples of a batch unit (4096 bytes
//! by default). Requests are carved off the active batch; released blocks go
//! on a **free list** and are handed out again before the heap grows.
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         HEAP MEMORY                                  │
//!   │                                                                      │
//!   │   batch 1                         batch 2                            │
//!   │   ┌─────┬─────┬─────┬─────┬────┐  ┌─────┬─────┬─────────────────┐    │
//!   │   │ A1  │ F1  │ A2  │ F2  │lost│  │ A3  │ A4  │   Free Space    │    │
//!   │   └─────┴─────┴─────┴─────┴────┘  └─────┴─────┴─────────────────┘    │
//!   │            ▲           ▲                      ▲                 ▲    │
//!   │            └── free ───┘                      │                 │    │
//!   │                list                        Cursor           Program  │
//!   │                                         (next carve)         Break   │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   A = allocated, F = released. Only the newest batch is carved from;
//!   the unused tail of an older batch is never revisited.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   brkalloc
//!   ├── align      - Word alignment (align!, checked_align)
//!   ├── block      - Block header encodings (PackedHeader, SplitHeader)
//!   ├── source     - Heap sources (Sbrk, Arena)
//!   ├── grower     - Active batch cursor and heap growth
//!   ├── free_list  - Released blocks, head-only first fit
//!   ├── heap       - Heap: allocate, zero_allocate, release, resize
//!   ├── locked     - LockedHeap, a spin-locked Heap implementing GlobalAlloc
//!   ├── config     - HeapConfig
//!   └── error      - HeapError
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use brkalloc::{Heap, Sbrk};
//!
//! let mut heap = Heap::new(Sbrk);
//!
//! let ptr = heap.allocate(8).unwrap().as_ptr() as *mut u64;
//!
//! unsafe {
//!     *ptr = 42;
//!     println!("Value: {}", *ptr);
//!
//!     heap.release(ptr as *mut u8);
//! }
//! ```
//!
//! ## How It Works
//!
//! Every block starts with a header recording its total size. With the
//! default [`PackedHeader`] this is a single word whose low bit marks the
//! block as in use:
//!
//! ```text
//!   Allocated Block:
//!   ┌──────────────────┬────────────────────────────────┐
//!   │  size | 1        │         User Data              │
//!   │  (1 word)        │                                │
//!   └──────────────────┴────────────────────────────────┘
//!                      ▲
//!                      └── Pointer returned to user
//!
//!   Free Block:
//!   ┌──────────────────┬──────────┬─────────────────────┐
//!   │  size | 0        │  next ───┼──▶ next free block   │
//!   └──────────────────┴──────────┴─────────────────────┘
//! ```
//!
//! `allocate` looks only at the head of the free list. If it is big enough
//! it is reused, and split when the leftover can stand as a free block of
//! its own. Otherwise the block is carved from the active batch, which is
//! replaced by a fresh batch when it runs short.
//!
//! ## Limitations
//!
//! - **No coalescing**: adjacent free blocks are never merged
//! - **Head-only search**: a large block deeper in the free list is not found
//! - **No shrinking**: memory is never returned to the operating system
//! - **Unsynchronized**: [`Heap`] is single-threaded; use [`LockedHeap`]
//!   to share one
//! - **Word alignment only**: payloads are aligned to the machine word
//!
//! ## Safety
//!
//! Releasing or resizing a pointer this heap did not hand out, or releasing
//! the same pointer twice, corrupts the free list. Those operations are
//! `unsafe` for that reason.

pub mod align;
mod block;
mod config;
mod error;
mod free_list;
mod grower;
mod heap;
mod locked;
mod source;

pub use block::{Header, PackedHeader, SplitHeader};
pub use config::{BATCH_UNIT, HeapConfig};
pub use error::HeapError;
pub use free_list::{Blocks, FreeList};
pub use grower::HeapGrower;
pub use heap::{Heap, HeapStats};
pub use locked::LockedHeap;
pub use source::{Arena, HeapSource, Sbrk};
