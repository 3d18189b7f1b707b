use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The host refused to extend the heap. The heap is still valid.
    #[error("out of memory: host could not extend the heap by {requested} bytes")]
    OutOfMemory { requested: usize },
    #[error("allocation request of {size} bytes overflows the block size")]
    BadRequest { size: usize },
}

/// A violated heap invariant, as reported by [`crate::Allocator::check_heap`].
///
/// Offsets are relative to the start of the host region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapCorruption {
    #[error("block at {offset} has invalid size {size}")]
    BadSize { offset: usize, size: usize },
    #[error("free block at {offset}: head tag {head:#x} does not match tail tag {tail:#x}")]
    TagMismatch { offset: usize, head: u64, tail: u64 },
    #[error("heap walk ended at {reached}, expected {end}")]
    WalkOverrun { reached: usize, end: usize },
    #[error("free blocks at {left} and {right} are adjacent")]
    AdjacentFree { left: usize, right: usize },
    #[error("block at {offset} has prev_used={recorded}, predecessor used={actual}")]
    PrevUsedMismatch {
        offset: usize,
        recorded: bool,
        actual: bool,
    },
    #[error("bucket {bucket}: broken link at {offset}")]
    BrokenLink { bucket: usize, offset: usize },
    #[error("bucket {bucket}: listed block at {offset} is not a free block")]
    NotFree { bucket: usize, offset: usize },
    #[error("bucket {bucket}: block at {offset} of size {size} belongs to another bucket")]
    WrongBucket {
        bucket: usize,
        offset: usize,
        size: usize,
    },
    #[error("bucket {bucket}: table records {recorded} blocks, list holds {found}")]
    LengthMismatch {
        bucket: usize,
        recorded: usize,
        found: usize,
    },
    #[error("{listed} blocks are listed but {walked} free blocks were walked")]
    FreeCountMismatch { listed: usize, walked: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    #[error("line {line}: unknown operation {op:?}")]
    UnknownOp { line: usize, op: String },
    #[error("line {line}: missing or malformed field")]
    Malformed { line: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("op {op}: {source}")]
    Alloc {
        op: usize,
        #[source]
        source: AllocError,
    },
    #[error("op {op}: payload of id {id} is not aligned")]
    Misaligned { op: usize, id: usize },
    #[error("op {op}: payload of id {id} was overwritten")]
    PayloadCorrupted { op: usize, id: usize },
    #[error("op {op}: id {id} is not live")]
    UnknownId { op: usize, id: usize },
    #[error("op {op}: id {id} is already live")]
    DuplicateId { op: usize, id: usize },
}
