use super::constants::{HEADER_SIZE, WORD_SIZE};
use super::heap_region::HeapRegion;
use super::mem_lib::HostHeap;
use super::tag::Tag;

const PREV_LINK: usize = WORD_SIZE;
const NEXT_LINK: usize = 2 * WORD_SIZE;

/// Free list links of a free block or a bucket sentinel, as offsets.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct FreeNode {
    pub prev: usize,
    pub next: usize,
}

/// A view of the block whose head tag sits at `offset`.
///
/// Used blocks are `[head | payload]`, free blocks are
/// `[head | prev | next | ... | tail]`.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct Block {
    offset: usize,
}

impl Block {
    pub fn at(offset: usize) -> Self {
        Self { offset }
    }

    pub fn from_payload(payload: usize) -> Self {
        Self::at(payload - HEADER_SIZE)
    }

    pub fn offset(self) -> usize {
        self.offset
    }

    pub fn payload(self) -> usize {
        self.offset + HEADER_SIZE
    }

    pub fn tag<H: HostHeap>(self, region: &HeapRegion<H>) -> Tag {
        Tag::decode(region.read_word(self.offset))
    }

    pub fn set_tag<H: HostHeap>(self, region: &mut HeapRegion<H>, tag: Tag) {
        region.write_word(self.offset, tag.encode())
    }

    pub fn size<H: HostHeap>(self, region: &HeapRegion<H>) -> usize {
        self.tag(region).size
    }

    /// Offset one past the last byte of this block.
    pub fn end<H: HostHeap>(self, region: &HeapRegion<H>) -> usize {
        self.offset + self.size(region)
    }

    /// The block that follows this one in address order. It may start at
    /// the heap end, in which case there is no such block.
    pub fn next<H: HostHeap>(self, region: &HeapRegion<H>) -> Block {
        Block::at(self.end(region))
    }

    /// The free block that precedes this one, found through its tail tag.
    /// Only meaningful when this block's `prev_used` is clear.
    pub fn prev_free<H: HostHeap>(self, region: &HeapRegion<H>) -> Block {
        let tail = Tag::decode(region.read_word(self.offset - WORD_SIZE));

        Block::at(self.offset - tail.size)
    }

    pub fn tail_word<H: HostHeap>(self, region: &HeapRegion<H>) -> u64 {
        region.read_word(self.end(region) - WORD_SIZE)
    }

    /// Writes matching head and tail tags marking this block free.
    pub fn write_free<H: HostHeap>(self, region: &mut HeapRegion<H>, size: usize, prev_used: bool) {
        let word = Tag::new(size, false, prev_used).encode();

        region.write_word(self.offset, word);
        region.write_word(self.offset + size - WORD_SIZE, word);
    }

    pub fn links<H: HostHeap>(self, region: &HeapRegion<H>) -> FreeNode {
        FreeNode {
            prev: region.read_word(self.offset + PREV_LINK) as usize,
            next: region.read_word(self.offset + NEXT_LINK) as usize,
        }
    }

    pub fn set_prev<H: HostHeap>(self, region: &mut HeapRegion<H>, prev: usize) {
        region.write_word(self.offset + PREV_LINK, prev as u64)
    }

    pub fn set_next<H: HostHeap>(self, region: &mut HeapRegion<H>, next: usize) {
        region.write_word(self.offset + NEXT_LINK, next as u64)
    }
}
