use std::io::Read;

use tagalloc::{FreeListAllocator, print_heap};
use tracing_subscriber::EnvFilter;

/// Waits until the user presses ENTER.
/// Useful to follow how every step reshapes the block layout and the free list.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn main() {
  // RUST_LOG=tagalloc=trace shows every search and coalescing decision.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let mut allocator = match FreeListAllocator::new(256) {
    Ok(allocator) => allocator,
    Err(error) => {
      eprintln!("cannot create allocator: {}", error);
      return;
    }
  };

  // Initial state: one free block spanning everything after the head cell.
  print_heap("start", &allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Five allocations, carved one after the other from the free block.
  // --------------------------------------------------------------------
  let mut regions = Vec::new();
  for size in [10, 20, 30, 40, 50] {
    match allocator.allocate(size) {
      Some(region) => {
        println!("[1] allocate({}) -> {}", size, region);
        regions.push(region);
      }
      None => println!("[1] allocate({}) -> none", size),
    }
  }
  print_heap("after allocations", &allocator);
  block_until_enter_pressed();

  // Write into the third allocation to show it's usable.
  allocator.bytes_mut(regions[2]).fill(0xab);
  println!("\n[1] third allocation filled with 0xAB");

  // --------------------------------------------------------------------
  // 2) Free the 2nd and 4th allocations: two holes between used blocks.
  // --------------------------------------------------------------------
  allocator.deallocate(regions[1]);
  allocator.deallocate(regions[3]);
  print_heap("holes", &allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Free the 3rd: it merges with the holes on both sides.
  // --------------------------------------------------------------------
  allocator.deallocate(regions[2]);
  print_heap("merged", &allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Grow the first allocation. Its neighbour is the merged free block,
  //    so it is widened in place.
  // --------------------------------------------------------------------
  if let Some(grown) = allocator.reallocate(regions[0], 60) {
    println!("\n[4] reallocate({}, 60) -> {}", regions[0], grown);
    regions[0] = grown;
  }
  print_heap("grown", &allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Ask for more than the arena can give.
  // --------------------------------------------------------------------
  println!("\n[5] allocate(1000) -> {:?}", allocator.allocate(1000));

  match allocator.check_integrity() {
    Ok(stats) => println!(
      "\n[6] heap is consistent: {} used / {} free blocks, fragmentation {:.2}",
      stats.used_blocks,
      stats.free_blocks,
      stats.fragmentation()
    ),
    Err(error) => println!("\n[6] heap is damaged: {}", error),
  }
}
