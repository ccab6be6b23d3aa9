//! Shared byte buffer behind [`CowString`](crate::CowString).
//!
//! One allocation holds a header `{ refs, length, capacity }` followed by
//! `capacity + 1` bytes; `bytes[length]` is always NUL. A static empty
//! block stands in for every empty string and is never freed. A buffer is
//! immutable while shared; only the sole owner of a heap block may write.

use crate::atomic::{Atomic, MemoryOrder};
use core::alloc::Layout;
use core::ptr::NonNull;
use core::slice;
use std::alloc;
use std::sync::atomic::{fence, Ordering};

#[repr(C)]
struct Header {
    refs: Atomic<usize>,
    length: usize,
    capacity: usize,
}

#[repr(C)]
struct NullBlock {
    header: Header,
    nul: [u8; 1],
}

// The static block's count starts at 1 so that releases never free it.
static NULL: NullBlock = NullBlock {
    header: Header {
        refs: Atomic::<usize>::new(1),
        length: 0,
        capacity: 0,
    },
    nul: [0],
};

fn block_layout(capacity: usize) -> (Layout, usize) {
    let bytes = capacity
        .checked_add(1)
        .and_then(|n| Layout::array::<u8>(n).ok());
    let Some((layout, offset)) = bytes.and_then(|b| Layout::new::<Header>().extend(b).ok()) else {
        panic!("string capacity overflow");
    };
    (layout.pad_to_align(), offset)
}

/// Counted handle to a buffer block.
pub(crate) struct Buffer {
    ptr: NonNull<Header>,
}

// SAFETY: the count is atomic and a shared block is never written.
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

impl Buffer {
    /// Reference to the shared empty block.
    pub(crate) fn null() -> Self {
        NULL.header.refs.add(1, MemoryOrder::Relaxed);
        Self {
            ptr: NonNull::from(&NULL).cast::<Header>(),
        }
    }

    /// Fresh, uniquely owned, empty block with room for `capacity` bytes.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            return Self::null();
        }
        let (layout, offset) = block_layout(capacity);
        debug_assert_eq!(offset, core::mem::size_of::<Header>());
        // SAFETY: layout is non-zero sized.
        let raw = unsafe { alloc::alloc(layout) } as *mut Header;
        let Some(ptr) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };
        // SAFETY: freshly allocated with room for the header and the NUL.
        unsafe {
            ptr.as_ptr().write(Header {
                refs: Atomic::<usize>::new(1),
                length: 0,
                capacity,
            });
            Self::bytes_ptr(ptr).write(0);
        }
        Self { ptr }
    }

    #[inline]
    fn header(&self) -> &Header {
        // SAFETY: our reference keeps the block alive.
        unsafe { self.ptr.as_ref() }
    }

    #[inline]
    fn bytes_ptr(ptr: NonNull<Header>) -> *mut u8 {
        // SAFETY: the bytes follow the header inside the same block.
        unsafe { (ptr.as_ptr() as *mut u8).add(core::mem::size_of::<Header>()) }
    }

    #[inline]
    pub(crate) fn is_null(&self) -> bool {
        core::ptr::eq(self.ptr.as_ptr() as *const u8, &NULL as *const NullBlock as *const u8)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.header().length
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.header().capacity
    }

    pub(crate) fn ref_count(&self) -> usize {
        self.header().refs.get(MemoryOrder::Acquire)
    }

    /// Sole owner of a heap block; only such a buffer may be written.
    #[inline]
    pub(crate) fn is_unique(&self) -> bool {
        !self.is_null() && self.ref_count() == 1
    }

    #[inline]
    pub(crate) fn ptr_eq(&self, other: &Buffer) -> bool {
        self.ptr == other.ptr
    }

    #[inline]
    pub(crate) fn as_bytes(&self) -> &[u8] {
        // SAFETY: `length` bytes are initialized.
        unsafe { slice::from_raw_parts(Self::bytes_ptr(self.ptr), self.len()) }
    }

    #[inline]
    pub(crate) fn as_bytes_with_nul(&self) -> &[u8] {
        // SAFETY: `length + 1` bytes are initialized.
        unsafe { slice::from_raw_parts(Self::bytes_ptr(self.ptr), self.len() + 1) }
    }

    /// Whole storage, `capacity + 1` bytes.
    ///
    /// # Safety
    /// The buffer must be unique. Bytes past `length + 1` may be
    /// uninitialized and must be written before being read.
    #[inline]
    pub(crate) unsafe fn storage_mut(&mut self) -> &mut [u8] {
        debug_assert!(self.is_unique());
        slice::from_raw_parts_mut(Self::bytes_ptr(self.ptr), self.capacity() + 1)
    }

    /// Set the length and write the terminator.
    ///
    /// # Safety
    /// The buffer must be unique, `len <= capacity`, and `len` bytes
    /// initialized.
    #[inline]
    pub(crate) unsafe fn set_len(&mut self, len: usize) {
        debug_assert!(self.is_unique() && len <= self.capacity());
        (*self.ptr.as_ptr()).length = len;
        Self::bytes_ptr(self.ptr).add(len).write(0);
    }
}

impl Clone for Buffer {
    #[inline]
    fn clone(&self) -> Self {
        self.header().refs.add(1, MemoryOrder::Relaxed);
        Self { ptr: self.ptr }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if self.header().refs.subtract(1, MemoryOrder::Release) != 1 {
            return;
        }
        fence(Ordering::Acquire);
        if self.is_null() {
            return;
        }
        let (layout, _) = block_layout(self.capacity());
        // SAFETY: last reference to a heap block allocated with this layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr() as *mut u8, layout) };
    }
}
