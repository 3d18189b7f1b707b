/// A 'snapshot' of the allocator's counters.
///
/// Obtained by calling [`crate::Allocator::stats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocStats {
    /// Number of successful allocations, not counting those made on behalf
    /// of a moving reallocation.
    pub allocations: u64,

    /// Number of frees, not counting those made on behalf of a moving
    /// reallocation.
    pub frees: u64,

    /// Reallocations that returned the same pointer because the block was
    /// already big enough.
    pub reallocs_unchanged: u64,

    /// Reallocations satisfied by growing the top block in place.
    pub reallocs_in_place: u64,

    /// Reallocations that moved the payload to a new block.
    pub reallocs_moved: u64,

    /// Number of times a free block was split on allocation.
    pub splits: u64,

    /// Number of neighbors absorbed into a freed block.
    pub coalesces: u64,

    /// Number of times the heap was grown.
    pub heap_grows: u64,

    /// Number of times freeing the top block shrank the heap.
    pub heap_shrinks: u64,

    /// Bytes held by used blocks, tags included.
    pub bytes_in_use: usize,

    /// Current size of the managed heap, prologue excluded.
    pub heap_size: usize,

    /// The largest the heap has been since the last init.
    pub max_heap_size: usize,
}

impl AllocStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_heap_size(&mut self, heap_size: usize) {
        self.heap_size = heap_size;
        self.max_heap_size = self.max_heap_size.max(heap_size);
    }

    /// Ratio of bytes in use to heap size, or 0 for an empty heap.
    pub fn utilization(&self) -> f64 {
        if self.heap_size == 0 {
            return 0.0;
        }

        self.bytes_in_use as f64 / self.heap_size as f64
    }
}
