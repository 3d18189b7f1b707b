use super::block::Block;
use super::constants::{ALIGNMENT, BUCKET_COUNT, CATCH_ALL_BUCKET, MIN_CHUNK_SIZE, SENTINEL_SIZE};
use super::heap_region::HeapRegion;
use super::mem_lib::HostHeap;
use super::tag::Tag;

/// The segregated free lists.
///
/// Bucket `i < CATCH_ALL_BUCKET` holds free blocks of exactly `i * ALIGNMENT`
/// bytes, the catch-all holds every free block of at least MIN_CHUNK_SIZE.
/// Each bucket is a circular doubly linked list threaded through the free
/// blocks themselves, anchored at a sentinel in the heap prologue.
pub struct SizeClassTable {
    lengths: [usize; BUCKET_COUNT],
}

impl SizeClassTable {
    pub fn new() -> Self {
        Self {
            lengths: [0; BUCKET_COUNT],
        }
    }

    pub fn bucket_for(size: usize) -> usize {
        if size >= MIN_CHUNK_SIZE {
            CATCH_ALL_BUCKET
        } else {
            size / ALIGNMENT
        }
    }

    pub fn sentinel(bucket: usize) -> Block {
        debug_assert!(bucket < BUCKET_COUNT);

        Block::at(bucket * SENTINEL_SIZE)
    }

    /// Writes every sentinel as an empty list. The prologue must already be
    /// part of the region.
    pub fn reset<H: HostHeap>(&mut self, region: &mut HeapRegion<H>) {
        for bucket in 0..BUCKET_COUNT {
            let sentinel = Self::sentinel(bucket);

            sentinel.set_tag(region, Tag::new(0, true, true));
            sentinel.set_prev(region, sentinel.offset());
            sentinel.set_next(region, sentinel.offset());
        }

        self.lengths = [0; BUCKET_COUNT];
    }

    pub fn len(&self, bucket: usize) -> usize {
        self.lengths[bucket]
    }

    pub fn total_len(&self) -> usize {
        self.lengths.iter().sum()
    }

    /// Inserts a free block, whose tags are already written, at the front
    /// of its bucket.
    pub fn push<H: HostHeap>(&mut self, region: &mut HeapRegion<H>, block: Block) {
        let bucket = Self::bucket_for(block.size(region));
        let sentinel = Self::sentinel(bucket);
        let first = sentinel.links(region).next;

        block.set_prev(region, sentinel.offset());
        block.set_next(region, first);
        Block::at(first).set_prev(region, block.offset());
        sentinel.set_next(region, block.offset());

        self.lengths[bucket] += 1;
    }

    /// Unlinks a listed free block. Its tags must still describe it.
    pub fn remove<H: HostHeap>(&mut self, region: &mut HeapRegion<H>, block: Block) {
        let bucket = Self::bucket_for(block.size(region));
        let links = block.links(region);

        Block::at(links.prev).set_next(region, links.next);
        Block::at(links.next).set_prev(region, links.prev);

        debug_assert!(self.lengths[bucket] > 0);
        self.lengths[bucket] -= 1;
    }

    /// Finds a free block of at least `size` bytes, starting at its exact
    /// bucket and moving up through the catch-all. Within a bucket the most
    /// recently inserted block comes first.
    pub fn first_fit<H: HostHeap>(&self, region: &HeapRegion<H>, size: usize) -> Option<Block> {
        for bucket in Self::bucket_for(size)..BUCKET_COUNT {
            if self.lengths[bucket] == 0 {
                continue;
            }

            let sentinel = Self::sentinel(bucket);
            let mut current = sentinel.links(region).next;

            while current != sentinel.offset() {
                let block = Block::at(current);

                if block.size(region) >= size {
                    return Some(block);
                }

                current = block.links(region).next;
            }
        }

        None
    }
}
