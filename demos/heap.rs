use std::{io::Read, ptr};

use brkalloc::{Heap, Sbrk};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    Sbrk::program_break(),
  );
}

fn print_alloc(
  heap: &Heap<Sbrk>,
  size: usize,
  addr: *mut u8,
) {
  let stats = heap.stats();
  println!(
    "Allocated {} bytes, address = {:?}, program break = {:?}, batches = {}, batch left = {}, free blocks = {}",
    size,
    addr,
    Sbrk::program_break(),
    stats.batches,
    stats.batch_remaining,
    stats.free_blocks,
  );
}

fn main() {
  env_logger::init();

  let mut heap = Heap::new(Sbrk);

  // Initial heap state
  print_program_break("start");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Allocate 4 bytes. The first request grows the heap by one batch.
  // --------------------------------------------------------------------
  let first_block = heap.allocate(4).expect("first allocation").as_ptr();
  println!("\n[1] Allocate u32");
  print_alloc(&heap, 4, first_block);

  let first_ptr = first_block as *mut u32;
  unsafe {
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_ptr.read());
  }

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Allocate 12 zeroed bytes, carved right after the first block.
  // --------------------------------------------------------------------
  let second_block = heap.zero_allocate(12, 1).expect("second allocation").as_ptr();
  println!("\n[2] Zero-allocate [u8; 12]");
  print_alloc(&heap, 12, second_block);

  unsafe { ptr::write_bytes(second_block, 0xAB, 12) };
  println!("[2] Initialized second block with 0xAB");

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Release the first block and ask for 2 bytes: the free list head
  //    fits, so the same address comes back.
  // --------------------------------------------------------------------
  unsafe { heap.release(first_block) };
  println!("\n[3] Released first_block at {:?}", first_block);

  let third_block = heap.allocate(2).expect("third allocation").as_ptr();
  print_alloc(&heap, 2, third_block);
  println!(
    "[3] third_block == first_block? {}",
    if third_block == first_block {
      "Yes, it reused the freed block"
    } else {
      "No, it allocated somewhere else"
    }
  );

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Resize the second block past its capacity. The contents move and
  //    the old block lands on the free list.
  // --------------------------------------------------------------------
  let moved = unsafe { heap.resize(second_block, 64) }.expect("resize").as_ptr();
  println!("\n[4] Resize second block to 64 bytes: {:?} -> {:?}", second_block, moved);
  println!("[4] First byte after move = 0x{:X}", unsafe { moved.read() });
  println!("[4] Free blocks now = {}", heap.stats().free_blocks);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Allocate a large block to observe heap growth.
  // --------------------------------------------------------------------
  print_program_break("before large alloc");

  let big_size = 64 * 1024;
  let big_block = heap.allocate(big_size).expect("large allocation").as_ptr();
  println!("\n[5] Allocate large 64 KiB block");
  print_alloc(&heap, big_size, big_block);

  print_program_break("after large alloc");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) End of demo. Nothing is ever handed back to the OS; it reclaims
  //    the whole heap when the process exits.
  // --------------------------------------------------------------------
  println!("\n[6] End of example. Process will exit and the OS will reclaim all memory.");
}
