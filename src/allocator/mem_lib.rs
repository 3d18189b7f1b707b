use super::constants::HOST_ALIGNMENT;
use crate::error::AllocError;
use log::debug;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

/// The heap-extension primitive an allocator's heap region is built on.
///
/// Committed memory starts at `base()` and is `committed()` bytes long. It
/// only ever grows, and `base()` must never change.
pub trait HostHeap {
    /// Commits `delta` more bytes and returns the previous end of the
    /// committed memory.
    fn extend(&mut self, delta: usize) -> Result<NonNull<u8>, AllocError>;

    /// Start of the committed memory. Must be aligned to at least 32 bytes,
    /// since payload alignment is computed from offsets to it.
    fn base(&self) -> NonNull<u8>;

    fn committed(&self) -> usize;
}

/// A host that reserves its whole capacity up front and hands it out with
/// sbrk semantics.
pub struct MemLib {
    ptr: NonNull<u8>,
    layout: Layout,
    brk: usize,
}

impl MemLib {
    pub fn new(capacity: usize) -> Result<MemLib, AllocError> {
        let layout = Layout::from_size_align(capacity.max(1), HOST_ALIGNMENT)
            .map_err(|_| AllocError::BadRequest { size: capacity })?;

        Ok(MemLib {
            ptr: Self::reserve(layout)?,
            layout,
            brk: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.layout.size()
    }

    fn reserve(layout: Layout) -> Result<NonNull<u8>, AllocError> {
        // zeroed so that copying a never written payload reads initialized bytes
        let ptr = unsafe { alloc_zeroed(layout) };

        NonNull::new(ptr).ok_or(AllocError::OutOfMemory {
            requested: layout.size(),
        })
    }
}

impl HostHeap for MemLib {
    fn extend(&mut self, delta: usize) -> Result<NonNull<u8>, AllocError> {
        let new_brk = match self.brk.checked_add(delta) {
            Some(brk) if brk <= self.capacity() => brk,
            _ => {
                debug!(
                    "host refused {} bytes, {} of {} committed",
                    delta,
                    self.brk,
                    self.capacity()
                );

                return Err(AllocError::OutOfMemory { requested: delta });
            }
        };

        let old_brk = unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(self.brk)) };

        self.brk = new_brk;

        Ok(old_brk)
    }

    fn base(&self) -> NonNull<u8> {
        self.ptr
    }

    fn committed(&self) -> usize {
        self.brk
    }
}

impl Drop for MemLib {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}
