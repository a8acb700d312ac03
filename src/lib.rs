//! # tagalloc - A Boundary-Tag Free-List Allocator
//!
//! This crate provides a general-purpose allocator that manages a single
//! **fixed-size byte arena** without help from the system allocator.
//!
//! ## Overview
//!
//! The arena is tiled by blocks. Each block carries its length twice, once
//! at each end, and the sign of that length says whether the block is free:
//!
//! ```text
//!   Arena Layout:
//!
//!   ┌────┬──────────────────┬────────────┬──────────────────────────────┐
//!   │head│  used block  -N  │ free  +M   │          free  +K            │
//!   │cell│ -N ........... -N│+M ..... +M │ +K ......................+K  │
//!   └────┴──────────────────┴────────────┴──────────────────────────────┘
//!     │                       ▲     │      ▲
//!     └───────────────────────┘     └──────┘
//!        free list threaded through the payloads of free blocks
//! ```
//!
//! Reading the tag just left of a block gives the previous block, reading the
//! tag just right of it gives the next one. That is all deallocation needs to
//! merge a freed block with free neighbours on either side.
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── verify      - Fail-fast invariant macro (verify!)
//!   ├── region      - Arena, Offset and Region views
//!   ├── reference   - In-arena nullable offsets
//!   ├── block       - Block / FreeBlock boundary-tag mechanics
//!   ├── free_list   - FreeListAllocator implementation
//!   ├── integrity   - Whole-heap verification
//!   ├── stats       - HeapStats snapshot
//!   └── error       - Error types
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::FreeListAllocator;
//!
//! let mut allocator = FreeListAllocator::new(8 * 1024).unwrap();
//!
//! let region = allocator.allocate(16).unwrap();
//! allocator.bytes_mut(region).copy_from_slice(b"sixteen bytes!!!");
//! assert_eq!(allocator.bytes(region), b"sixteen bytes!!!");
//!
//! let region = allocator.reallocate(region, 64).unwrap();
//! assert_eq!(&allocator.bytes(region)[..16], b"sixteen bytes!!!");
//!
//! allocator.deallocate(region);
//! assert_eq!(allocator.free_blocks().count(), 1);
//! ```
//!
//! ## Allocation Policy
//!
//! A single pass over the free list takes the first block whose payload is
//! at least **twice** the request. If none qualifies, the largest block that
//! still fits is used. A block is split only when the remainder can form a
//! block of its own (8 bytes); otherwise the whole block is handed out.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: every mutation takes `&mut self`
//! - **Fixed arena**: at most 32 KiB, offsets and lengths are 16-bit
//! - **Caller discipline**: a region must not be used after it is freed

#[macro_use]
mod verify;

mod block;
mod error;
mod free_list;
mod integrity;
mod reference;
mod region;
mod stats;

#[doc(hidden)]
pub use tracing as __tracing;

pub use block::{Block, FIRST_BLOCK_OFFSET, FreeBlock, MIN_BLOCK_LEN, MIN_PAYLOAD, TAG_SIZE};
pub use error::{ArenaError, IntegrityError, UsageError};
pub use free_list::{
  Blocks, DEFAULT_ARENA_SIZE, FreeBlocks, FreeListAllocator, MIN_ARENA_SIZE, print_heap,
  request_size,
};
pub use reference::{NULL_SENTINEL, REFERENCE_SIZE, Reference};
pub use region::{Arena, ArenaId, MAX_ARENA_SIZE, Offset, Region};
pub use stats::HeapStats;
