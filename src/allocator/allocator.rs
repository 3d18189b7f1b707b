use super::block::Block;
use super::constants::{
    alloc_size_for, ALIGNMENT, HEADER_SIZE, MIN_CHUNK_SIZE, MIN_SPLIT_REMAINDER, PROLOGUE_SIZE,
    TINY_CHUNK_SIZE,
};
use super::heap_region::HeapRegion;
use super::mem_lib::{HostHeap, MemLib};
use super::size_class::SizeClassTable;
use super::tag::Tag;
use super::validator;
use crate::config::{AllocConfig, CorruptionPolicy};
use crate::error::{AllocError, HeapCorruption};
use crate::stats::AllocStats;
use log::{debug, error, trace, warn};
use std::ptr::NonNull;

/// A segregated free list allocator over one growable heap.
///
/// Every payload is preceded by a one word tag holding its block's size and
/// two flags. Free blocks also carry a tail tag and sit in one of the size
/// class lists; they are merged with free neighbors as soon as they are
/// freed, and a free block that reaches the top of the heap is handed back
/// to the host instead of being listed.
pub struct Allocator<H: HostHeap = MemLib> {
    region: HeapRegion<H>,
    table: SizeClassTable,
    // whether the block ending at the heap top is allocated, which is what
    // the next block carved by growth has to record as its prev_used
    top_used: bool,
    config: AllocConfig,
    stats: AllocStats,
}

impl Allocator<MemLib> {
    pub fn new() -> Result<Self, AllocError> {
        Self::with_config(AllocConfig::default())
    }

    pub fn with_config(config: AllocConfig) -> Result<Self, AllocError> {
        let host = MemLib::new(config.heap_capacity)?;

        Self::with_host(host, config)
    }
}

impl<H: HostHeap> Allocator<H> {
    pub fn with_host(host: H, config: AllocConfig) -> Result<Self, AllocError> {
        let mut allocator = Self {
            region: HeapRegion::new(host),
            table: SizeClassTable::new(),
            top_used: true,
            config,
            stats: AllocStats::new(),
        };

        allocator.init()?;

        Ok(allocator)
    }

    /// Drops every block and starts over with an empty heap. Pointers handed
    /// out before the call are dangling afterwards.
    pub fn init(&mut self) -> Result<(), AllocError> {
        self.region.reset();
        self.region.grow(PROLOGUE_SIZE)?;
        self.region.seal_prologue();
        self.table.reset(&mut self.region);
        self.top_used = true;
        self.stats = AllocStats::new();

        debug!("heap initialized, prologue of {} bytes", PROLOGUE_SIZE);

        Ok(())
    }

    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let block = self.allocate_block(size)?;

        self.stats.allocations += 1;
        self.after_mutation("allocate");

        Ok(self.region.ptr_at(block.payload()))
    }

    /// Frees a block, merging it with its free neighbors.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator since its last init,
    /// and must not have been freed already.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) {
        let block = Block::from_payload(self.region.offset_of(ptr));

        self.free_block(block);
        self.stats.frees += 1;
        self.after_mutation("free");
    }

    /// Resizes a block to hold at least `new_size` bytes. Blocks never
    /// shrink. On failure the original block is left untouched and live.
    ///
    /// # Safety
    ///
    /// Same contract as [`Allocator::free`].
    pub unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        new_size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        let block = Block::from_payload(self.region.offset_of(ptr));
        let new_alloc_size =
            alloc_size_for(new_size).ok_or(AllocError::BadRequest { size: new_size })?;
        let tag = block.tag(&self.region);

        debug_assert!(tag.used, "reallocating a free block at {}", block.offset());

        if tag.size >= new_alloc_size {
            self.stats.reallocs_unchanged += 1;

            return Ok(ptr);
        }

        if block.offset() + tag.size == self.region.end() {
            let delta = new_alloc_size - tag.size;

            match self.region.grow(delta) {
                Ok(_) => {
                    block.set_tag(&mut self.region, tag.with_size(new_alloc_size));

                    self.stats.bytes_in_use += delta;
                    self.stats.heap_grows += 1;
                    self.stats.reallocs_in_place += 1;
                    self.stats.record_heap_size(self.region.size());

                    trace!("grew top block at {} in place by {}", block.offset(), delta);
                    self.after_mutation("reallocate");

                    return Ok(ptr);
                }
                Err(err) => debug!("in place growth failed ({}), moving block", err),
            }
        }

        let new_block = self.allocate_block(new_size)?;
        let len = new_size.min(tag.size - HEADER_SIZE);

        self.region.copy(block.payload(), new_block.payload(), len);
        self.free_block(block);
        self.stats.reallocs_moved += 1;

        trace!(
            "moved block {} -> {}, copied {} bytes",
            block.offset(),
            new_block.offset(),
            len
        );
        self.after_mutation("reallocate");

        Ok(self.region.ptr_at(new_block.payload()))
    }

    /// Walks the heap and the free lists, returning the first broken invariant.
    pub fn check_heap(&self) -> Result<(), HeapCorruption> {
        validator::check_heap(&self.region, &self.table)
    }

    /// First byte of the heap, just past the prologue.
    pub fn heap_lo(&self) -> *const u8 {
        self.region.ptr_at(self.region.low()).as_ptr()
    }

    /// Last byte of the heap. One byte below `heap_lo` when the heap is empty.
    pub fn heap_hi(&self) -> *const u8 {
        self.region.ptr_at(self.region.end()).as_ptr().wrapping_sub(1)
    }

    pub fn heap_size(&self) -> usize {
        self.region.size()
    }

    pub fn stats(&self) -> AllocStats {
        self.stats
    }

    pub fn config(&self) -> &AllocConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        self.region.host()
    }

    /// Size of the block behind `ptr`, tags included.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live allocation of this allocator.
    pub unsafe fn block_size(&self, ptr: NonNull<u8>) -> usize {
        Block::from_payload(self.region.offset_of(ptr)).size(&self.region)
    }

    /// Number of bytes the caller may use behind `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live allocation of this allocator.
    pub unsafe fn usable_size(&self, ptr: NonNull<u8>) -> usize {
        self.block_size(ptr) - HEADER_SIZE
    }

    /// Number of free blocks listed in each size class.
    pub fn free_block_count(&self) -> usize {
        self.table.total_len()
    }

    #[cfg(test)]
    pub(super) fn region_mut(&mut self) -> &mut HeapRegion<H> {
        &mut self.region
    }

    fn allocate_block(&mut self, size: usize) -> Result<Block, AllocError> {
        let alloc_size = alloc_size_for(size).ok_or(AllocError::BadRequest { size })?;

        let block = match self.table.first_fit(&self.region, alloc_size) {
            Some(block) => {
                self.place(block, alloc_size);
                block
            }
            None => self.extend_heap(alloc_size)?,
        };

        self.stats.bytes_in_use += block.size(&self.region);

        Ok(block)
    }

    // Takes a listed free block for an allocation of `alloc_size`, splitting
    // off the rest when it is big enough to be worth keeping.
    fn place(&mut self, block: Block, alloc_size: usize) {
        let tag = block.tag(&self.region);
        let remainder = tag.size - alloc_size;

        self.table.remove(&mut self.region, block);

        if remainder < MIN_SPLIT_REMAINDER {
            block.set_tag(&mut self.region, tag.with_used(true));

            let next = block.next(&self.region);

            if next.offset() < self.region.end() {
                let next_tag = next.tag(&self.region);

                next.set_tag(&mut self.region, next_tag.with_prev_used(true));
            } else {
                self.top_used = true;
            }

            trace!("reused block at {} of size {}", block.offset(), tag.size);
        } else {
            let rest = Block::at(block.offset() + alloc_size);

            block.set_tag(&mut self.region, Tag::new(alloc_size, true, tag.prev_used));
            rest.write_free(&mut self.region, remainder, true);
            self.table.push(&mut self.region, rest);
            self.stats.splits += 1;

            trace!(
                "split block at {}: {} used, {} free",
                block.offset(),
                alloc_size,
                remainder
            );
        }
    }

    // Grows the heap for a block of `alloc_size`. Small requests grab a pool
    // chunk and list what is left over.
    fn extend_heap(&mut self, alloc_size: usize) -> Result<Block, AllocError> {
        let mut chunk_size = alloc_size;

        if alloc_size <= MIN_CHUNK_SIZE {
            let pool = if alloc_size == ALIGNMENT {
                TINY_CHUNK_SIZE
            } else {
                MIN_CHUNK_SIZE
            };

            if pool - alloc_size >= MIN_SPLIT_REMAINDER {
                chunk_size = pool;
            }
        }

        let offset = match self.region.grow(chunk_size) {
            Ok(offset) => offset,
            Err(_) if chunk_size > alloc_size => {
                chunk_size = alloc_size;
                self.grow_or_warn(alloc_size)?
            }
            Err(err) => {
                warn!("heap growth of {} bytes failed: {}", chunk_size, err);
                return Err(err);
            }
        };

        let block = Block::at(offset);

        block.set_tag(&mut self.region, Tag::new(alloc_size, true, self.top_used));

        if chunk_size > alloc_size {
            let rest = Block::at(offset + alloc_size);

            rest.write_free(&mut self.region, chunk_size - alloc_size, true);
            self.table.push(&mut self.region, rest);
            self.top_used = false;
        } else {
            self.top_used = true;
        }

        self.stats.heap_grows += 1;
        self.stats.record_heap_size(self.region.size());

        debug!(
            "grew heap by {} for a block of {}, heap is {} bytes",
            chunk_size,
            alloc_size,
            self.region.size()
        );

        Ok(block)
    }

    fn grow_or_warn(&mut self, delta: usize) -> Result<usize, AllocError> {
        self.region.grow(delta).map_err(|err| {
            warn!("heap growth of {} bytes failed: {}", delta, err);
            err
        })
    }

    fn free_block(&mut self, block: Block) {
        let tag = block.tag(&self.region);

        debug_assert!(tag.used, "freeing a free block at {}", block.offset());

        let mut start = block;
        let mut size = tag.size;
        let mut prev_used = tag.prev_used;

        self.stats.bytes_in_use -= tag.size;

        if !tag.prev_used {
            let prev = block.prev_free(&self.region);
            let prev_tag = prev.tag(&self.region);

            self.table.remove(&mut self.region, prev);
            start = prev;
            size += prev_tag.size;
            prev_used = prev_tag.prev_used;
            self.stats.coalesces += 1;
        }

        let next = Block::at(start.offset() + size);

        if next.offset() < self.region.end() {
            let next_tag = next.tag(&self.region);

            if next_tag.used {
                next.set_tag(&mut self.region, next_tag.with_prev_used(false));
            } else {
                self.table.remove(&mut self.region, next);
                size += next_tag.size;
                self.stats.coalesces += 1;
            }
        }

        if start.offset() + size == self.region.end() {
            // whatever precedes the released run is used, or the heap is empty
            self.region.shrink(size);
            self.top_used = true;
            self.stats.heap_shrinks += 1;
            self.stats.record_heap_size(self.region.size());

            debug!(
                "released {} bytes at the heap top, heap is {} bytes",
                size,
                self.region.size()
            );

            return;
        }

        start.write_free(&mut self.region, size, prev_used);
        self.table.push(&mut self.region, start);

        trace!("freed block at {} of size {}", start.offset(), size);
    }

    fn after_mutation(&self, op: &'static str) {
        if !self.config.check_heap {
            return;
        }

        if let Err(corruption) = self.check_heap() {
            error!("heap corruption detected after {}: {}", op, corruption);

            match self.config.on_corruption {
                CorruptionPolicy::Abort => std::process::abort(),
                CorruptionPolicy::Panic => {
                    panic!("heap corruption detected after {}: {}", op, corruption)
                }
            }
        }
    }
}
