use super::constants::WORD_SIZE;
use super::mem_lib::HostHeap;
use crate::error::AllocError;
use std::ptr::NonNull;

/// The contiguous, growable range of host memory managed by an allocator.
///
/// Everything is addressed by offset from the host base. The region covers
/// `[0, end)`: the prologue `[0, low)` followed by the heap `[low, end)`.
/// This is the only type that touches raw memory.
pub struct HeapRegion<H: HostHeap> {
    host: H,
    low: usize,
    end: usize,
}

impl<H: HostHeap> HeapRegion<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            low: 0,
            end: 0,
        }
    }

    /// Retracts to an empty region; the host keeps whatever it committed.
    pub fn reset(&mut self) {
        self.low = 0;
        self.end = 0;
    }

    /// Marks everything grown so far as the prologue; the heap starts after it.
    pub fn seal_prologue(&mut self) {
        self.low = self.end;
    }

    /// Moves the end up by `delta` and returns the offset of the old end.
    /// Only calls out to the host when the new end passes what it committed.
    pub fn grow(&mut self, delta: usize) -> Result<usize, AllocError> {
        let new_end = self
            .end
            .checked_add(delta)
            .ok_or(AllocError::OutOfMemory { requested: delta })?;
        let committed = self.host.committed();

        if new_end > committed {
            self.host.extend(new_end - committed)?;
        }

        let old_end = self.end;
        self.end = new_end;

        Ok(old_end)
    }

    pub fn shrink(&mut self, delta: usize) {
        debug_assert!(self.end - delta >= self.low);

        self.end -= delta;
    }

    pub fn low(&self) -> usize {
        self.low
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn size(&self) -> usize {
        self.end - self.low
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.low <= offset && offset < self.end
    }

    pub fn read_word(&self, offset: usize) -> u64 {
        self.check_word(offset);

        unsafe { self.at(offset).cast::<u64>().read() }
    }

    pub fn write_word(&mut self, offset: usize, word: u64) {
        self.check_word(offset);

        unsafe { self.at(offset).cast::<u64>().write(word) }
    }

    pub fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.end);

        unsafe { NonNull::new_unchecked(self.at(offset)) }
    }

    pub fn offset_of(&self, ptr: NonNull<u8>) -> usize {
        let offset = ptr.as_ptr() as usize - self.host.base().as_ptr() as usize;

        debug_assert!(self.contains(offset), "pointer {:p} is outside the heap", ptr);

        offset
    }

    /// Copies `len` bytes between two non-overlapping ranges of the heap.
    pub fn copy(&mut self, from: usize, to: usize, len: usize) {
        debug_assert!(from + len <= self.end && to + len <= self.end);
        debug_assert!(from + len <= to || to + len <= from);

        unsafe { std::ptr::copy_nonoverlapping(self.at(from), self.at(to), len) }
    }

    fn at(&self, offset: usize) -> *mut u8 {
        unsafe { self.host.base().as_ptr().add(offset) }
    }

    fn check_word(&self, offset: usize) {
        debug_assert!(offset % WORD_SIZE == 0, "unaligned word at {}", offset);
        debug_assert!(
            offset + WORD_SIZE <= self.end,
            "word at {} is past the heap end {}",
            offset,
            self.end
        );
    }
}
