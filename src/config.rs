use super::debug::check_heap_forced;

/// What the allocator does when a heap check fails after a mutation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CorruptionPolicy {
    /// Terminate the process. Continuing on a corrupted heap may follow
    /// garbage free list links.
    Abort,
    /// Panic with the detected corruption. Lets tests observe the failure.
    Panic,
}

/// This structure contains the configuration settings for an allocator.
#[derive(Copy, Clone, Debug)]
pub struct AllocConfig {
    /// Walk the whole heap after every allocate, free, and reallocate.
    /// This makes every call O(blocks), so it is meant for debugging.
    pub check_heap: bool,
    /// How a failed heap check is handled.
    pub on_corruption: CorruptionPolicy,
    /// The number of bytes reserved when the allocator creates its own host.
    pub heap_capacity: usize,
}

pub const ALLOC_CONFIG_DEFAULT_HEAP_CAPACITY: usize = 20 * (1 << 20);

impl AllocConfig {
    /// Creates a default AllocConfig. Heap checking is on in debug builds, or
    /// when SEGALLOC_CHECK_HEAP is set.
    pub fn default() -> Self {
        AllocConfig {
            check_heap: cfg!(debug_assertions) || check_heap_forced(),
            on_corruption: CorruptionPolicy::Abort,
            heap_capacity: ALLOC_CONFIG_DEFAULT_HEAP_CAPACITY,
        }
    }

    /// A config for tests: always check, and panic instead of aborting.
    pub fn checked() -> Self {
        AllocConfig {
            check_heap: true,
            on_corruption: CorruptionPolicy::Panic,
            ..Self::default()
        }
    }
}
