mod allocator;
mod block;
mod constants;
mod heap_region;
mod mem_lib;
mod size_class;
mod tag;
mod validator;


pub use allocator::Allocator;
pub use constants::{
    ALIGNMENT, BUCKET_COUNT, HEADER_SIZE, MIN_BLOCK_SIZE, MIN_CHUNK_SIZE, MIN_SPLIT_REMAINDER,
    TINY_CHUNK_SIZE,
};
pub use mem_lib::{HostHeap, MemLib};
pub use tag::{Tag, TAG_LAYOUT_VERSION};
