pub const ALIGNMENT: usize = 32;
pub const WORD_SIZE: usize = 8;
pub const HEADER_SIZE: usize = WORD_SIZE;

// head tag, prev link, next link, tail tag
pub const MIN_BLOCK_SIZE: usize = 4 * WORD_SIZE;

pub const BUCKET_COUNT: usize = 18;
pub const CATCH_ALL_BUCKET: usize = BUCKET_COUNT - 1;

// Free blocks of at least this size all share the catch-all bucket. This is
// also the pool chunk requested when a small allocation misses.
pub const MIN_CHUNK_SIZE: usize = (BUCKET_COUNT - 1) * ALIGNMENT;

// A miss on the smallest class only grabs room for a handful of neighbors.
pub const TINY_CHUNK_SIZE: usize = 6 * ALIGNMENT;

// Remainders smaller than this are left inside the allocated block.
pub const MIN_SPLIT_REMAINDER: usize = 2 * ALIGNMENT;

// Each sentinel is laid out like a free block's head: tag, prev, next.
pub const SENTINEL_SIZE: usize = 3 * WORD_SIZE;

// The prologue holds the sentinels, padded so that payloads (block + header)
// land on an ALIGNMENT boundary.
pub const PROLOGUE_SIZE: usize =
    align_up(BUCKET_COUNT * SENTINEL_SIZE + HEADER_SIZE, ALIGNMENT) - HEADER_SIZE;

pub const HOST_ALIGNMENT: usize = 4096;

pub const fn align_up(size: usize, align: usize) -> usize {
    (size + (align - 1)) & !(align - 1)
}

/// Block size for a payload of `size` bytes, or None on overflow.
pub fn alloc_size_for(size: usize) -> Option<usize> {
    let with_header = size.checked_add(HEADER_SIZE)?;

    with_header
        .checked_add(ALIGNMENT - 1)
        .map(|padded| padded & !(ALIGNMENT - 1))
}
