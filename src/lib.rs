//! A segregated free list allocator with boundary tags.
//!
//! An [`Allocator`] manages one contiguous heap that it grows and shrinks
//! through a [`HostHeap`], by default a [`MemLib`] that reserves a fixed
//! amount of memory up front. Free blocks are kept in size class lists, split
//! when a request leaves enough room, and merged with their neighbors as soon
//! as they are freed.
//! ```rust
//! use segalloc::Allocator;
//!
//! let mut allocator = Allocator::new().unwrap();
//! let ptr = allocator.allocate(100).unwrap();
//!
//! unsafe {
//!     ptr.as_ptr().write_bytes(7, 100);
//!
//!     let ptr = allocator.reallocate(ptr, 1000).unwrap();
//!     assert_eq!(*ptr.as_ptr().add(99), 7);
//!
//!     allocator.free(ptr);
//! }
//!
//! assert!(allocator.check_heap().is_ok());
//! ```
//!
//! Heap checking after every call is on by default in debug builds. It can
//! be forced on in release builds by setting `SEGALLOC_CHECK_HEAP`, or
//! controlled directly through [`AllocConfig`].
//! ```rust
//! use segalloc::{AllocConfig, Allocator, CorruptionPolicy};
//!
//! let config = AllocConfig {
//!     check_heap: true,
//!     on_corruption: CorruptionPolicy::Panic,
//!     ..AllocConfig::default()
//! };
//! let mut allocator = Allocator::with_config(config).unwrap();
//!
//! allocator.allocate(10).unwrap();
//! ```

mod allocator;
mod config;
mod debug;
mod error;
mod stats;
mod trace;

pub use allocator::{
    Allocator, HostHeap, MemLib, Tag, ALIGNMENT, BUCKET_COUNT, HEADER_SIZE, MIN_BLOCK_SIZE,
    MIN_CHUNK_SIZE, MIN_SPLIT_REMAINDER, TAG_LAYOUT_VERSION, TINY_CHUNK_SIZE,
};
pub use config::{AllocConfig, CorruptionPolicy};
pub use error::{AllocError, HeapCorruption, ReplayError, TraceError};
pub use stats::AllocStats;
pub use trace::{ReplayReport, Trace, TraceOp};
