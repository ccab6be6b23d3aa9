//! `Array<T>`: contiguous growable array with an explicit growth policy.
//!
//! Storage is a raw buffer of `capacity` slots of which the first `len` are
//! initialized. Reallocation moves elements bitwise into a fresh buffer;
//! growth follows [`grow_to`], so the capacity sequence is deterministic.

use crate::contract::check;
use core::alloc::Layout;
use core::fmt;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::mem::{self, ManuallyDrop};
use core::ops::{Deref, DerefMut, Index, IndexMut};
use core::ptr::{self, NonNull};
use core::slice;
use std::alloc;

/// Capacity to grow to from `current` so that at least `requested` slots
/// exist. An empty buffer jumps straight to `requested`; otherwise the
/// capacity grows by half (rounded up) until it is large enough.
#[inline]
pub fn grow_to(current: usize, requested: usize) -> usize {
    if current == 0 {
        return requested;
    }
    let mut size = current;
    while size < requested {
        size = size.saturating_add(size / 2 + (size & 1));
    }
    size
}

#[cold]
#[inline(never)]
fn capacity_overflow() -> ! {
    panic!("capacity overflow")
}

/// Growable contiguous array.
pub struct Array<T> {
    ptr: NonNull<T>,
    cap: usize,
    len: usize,
    _owns: PhantomData<T>,
}

// SAFETY: Array owns its elements like Vec<T>.
unsafe impl<T: Send> Send for Array<T> {}
unsafe impl<T: Sync> Sync for Array<T> {}

impl<T> Array<T> {
    const IS_ZST: bool = mem::size_of::<T>() == 0;

    /// Empty array, no allocation.
    pub const fn new() -> Self {
        Self {
            ptr: NonNull::dangling(),
            cap: if mem::size_of::<T>() == 0 { usize::MAX } else { 0 },
            len: 0,
            _owns: PhantomData,
        }
    }

    /// Empty array with exactly `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut a = Self::new();
        a.reserve(capacity);
        a
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Slots allocated but not in use.
    #[inline]
    pub fn unused(&self) -> usize {
        self.cap - self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the first `len` slots are initialized.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: the first `len` slots are initialized and uniquely borrowed.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    /// Move the elements into a buffer of exactly `new_cap` slots.
    fn realloc(&mut self, new_cap: usize) {
        debug_assert!(new_cap >= self.len);
        if Self::IS_ZST || new_cap == self.cap {
            return;
        }
        tracing::trace!(
            from = self.cap,
            to = new_cap,
            len = self.len,
            elem = core::any::type_name::<T>(),
            "array realloc"
        );
        let new_ptr = if new_cap == 0 {
            NonNull::dangling()
        } else {
            let layout = Layout::array::<T>(new_cap).unwrap_or_else(|_| capacity_overflow());
            // SAFETY: layout has non-zero size.
            let raw = unsafe { alloc::alloc(layout) } as *mut T;
            NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(layout))
        };
        // SAFETY: both buffers hold at least `len` slots and do not overlap.
        unsafe { ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), self.len) };
        self.dealloc_buffer();
        self.ptr = new_ptr;
        self.cap = new_cap;
    }

    /// Release the buffer without touching elements.
    fn dealloc_buffer(&mut self) {
        if !Self::IS_ZST && self.cap != 0 {
            // SAFETY: this layout was accepted when the buffer was allocated.
            unsafe {
                let layout =
                    Layout::from_size_align_unchecked(mem::size_of::<T>() * self.cap, mem::align_of::<T>());
                alloc::dealloc(self.ptr.as_ptr() as *mut u8, layout);
            }
        }
    }

    /// Ensure room for `additional` more elements using the growth policy.
    fn reserve_for(&mut self, additional: usize) {
        if self.unused() < additional {
            let required = self
                .len
                .checked_add(additional)
                .unwrap_or_else(|| capacity_overflow());
            self.realloc(grow_to(self.cap, required));
        }
    }

    /// Grow capacity to exactly `capacity` if it is currently smaller.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity > self.cap {
            self.realloc(capacity);
        }
    }

    /// Shrink capacity to `max(capacity, len)` if it is currently larger.
    pub fn shrink_to(&mut self, capacity: usize) {
        let capacity = capacity.max(self.len);
        if capacity < self.cap {
            self.realloc(capacity);
        }
    }

    /// Drop unused capacity.
    pub fn compact(&mut self) {
        if self.len != self.cap {
            self.realloc(self.len);
        }
    }

    /// Drop all elements; capacity is kept.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Drop all elements and release the buffer.
    pub fn free(&mut self) {
        self.clear();
        self.realloc(0);
    }

    fn truncate(&mut self, new_len: usize) {
        if new_len >= self.len {
            return;
        }
        let tail = ptr::slice_from_raw_parts_mut(
            // SAFETY: new_len < len <= cap.
            unsafe { self.ptr.as_ptr().add(new_len) },
            self.len - new_len,
        );
        self.len = new_len;
        // SAFETY: the tail was initialized and is no longer reachable.
        unsafe { ptr::drop_in_place(tail) };
    }

    pub fn push(&mut self, value: T) {
        self.reserve_for(1);
        // SAFETY: reserve_for guarantees a free slot at `len`.
        unsafe { self.ptr.as_ptr().add(self.len).write(value) };
        self.len += 1;
    }

    /// Remove the last element.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: slot `len` was initialized and is now outside the array.
        Some(unsafe { self.ptr.as_ptr().add(self.len).read() })
    }

    /// Drop up to `count` elements from the end.
    pub fn pop_n(&mut self, count: usize) {
        self.truncate(self.len - count.min(self.len));
    }

    /// Insert `value` before `pos` (clamped to `len`). Returns the index of
    /// the inserted element.
    pub fn insert(&mut self, pos: usize, value: T) -> usize {
        let pos = pos.min(self.len);
        self.reserve_for(1);
        // SAFETY: room for one more; the shifted range stays in bounds.
        unsafe {
            let at = self.ptr.as_ptr().add(pos);
            ptr::copy(at, at.add(1), self.len - pos);
            at.write(value);
        }
        self.len += 1;
        pos
    }

    /// Remove `count` elements starting at `index`, both clamped to the
    /// array. Returns the index of the first element after the removed
    /// range, or `len()` when nothing was removed.
    pub fn erase(&mut self, index: usize, count: usize) -> usize {
        let index = index.min(self.len);
        let count = count.min(self.len - index);
        if count == 0 {
            return self.len;
        }
        let tail = self.len - index - count;
        self.len = index;
        // SAFETY: [index, index + count) is initialized; after dropping it
        // the tail is moved down over the hole.
        unsafe {
            let at = self.ptr.as_ptr().add(index);
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(at, count));
            ptr::copy(at.add(count), at, tail);
        }
        self.len = index + tail;
        index
    }

    /// Remove the element at `index` by moving the last element into its
    /// slot. Order is not preserved. Returns `index`, or `len()` if the
    /// index was out of range.
    pub fn fast_erase(&mut self, index: usize) -> usize {
        if index >= self.len {
            return self.len;
        }
        let last = self.len - 1;
        self.len = last;
        // SAFETY: both slots were initialized; `last` is now outside the
        // array and its value is moved, never duplicated.
        unsafe {
            let base = self.ptr.as_ptr();
            if index == last {
                ptr::drop_in_place(base.add(last));
            } else {
                let moved = base.add(last).read();
                drop(ptr::replace(base.add(index), moved));
            }
        }
        index
    }

    /// Element at `index`, contract-checked.
    #[track_caller]
    pub fn at(&self, index: usize) -> &T {
        check!(index < self.len, InvalidIndex, "index {index} out of range for length {}", self.len);
        &self.as_slice()[index]
    }

    #[track_caller]
    pub fn at_mut(&mut self, index: usize) -> &mut T {
        check!(index < self.len, InvalidIndex, "index {index} out of range for length {}", self.len);
        &mut self.as_mut_slice()[index]
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    #[track_caller]
    pub fn front(&self) -> &T {
        check!(self.len != 0, EmptyContainer, "front of empty array");
        &self.as_slice()[0]
    }

    #[track_caller]
    pub fn front_mut(&mut self) -> &mut T {
        check!(self.len != 0, EmptyContainer, "front of empty array");
        &mut self.as_mut_slice()[0]
    }

    #[track_caller]
    pub fn back(&self) -> &T {
        check!(self.len != 0, EmptyContainer, "back of empty array");
        &self.as_slice()[self.len.wrapping_sub(1)]
    }

    #[track_caller]
    pub fn back_mut(&mut self) -> &mut T {
        check!(self.len != 0, EmptyContainer, "back of empty array");
        let last = self.len.wrapping_sub(1);
        &mut self.as_mut_slice()[last]
    }
}

impl<T: Clone> Array<T> {
    /// `count` copies of `value`.
    pub fn from_elem(count: usize, value: T) -> Self {
        let mut a = Self::new();
        a.push_n(value, count);
        a
    }

    /// Append a copy of the element at `index`. The copy is taken before
    /// any reallocation, so the source may live in this array.
    #[track_caller]
    pub fn push_from_within(&mut self, index: usize) {
        if !check!(index < self.len, InvalidIndex, "index {index} out of range for length {}", self.len) {
            return;
        }
        let value = self.as_slice()[index].clone();
        self.push(value);
    }

    /// Append `count` copies of `value`.
    pub fn push_n(&mut self, value: T, count: usize) {
        if count == 0 {
            return;
        }
        self.reserve_for(count);
        for _ in 1..count {
            // SAFETY: reserved above; len tracks each write.
            unsafe { self.ptr.as_ptr().add(self.len).write(value.clone()) };
            self.len += 1;
        }
        // SAFETY: reserved above.
        unsafe { self.ptr.as_ptr().add(self.len).write(value) };
        self.len += 1;
    }

    pub fn extend_from_slice(&mut self, src: &[T]) {
        self.reserve_for(src.len());
        for item in src {
            // SAFETY: reserved above; len tracks each write.
            unsafe { self.ptr.as_ptr().add(self.len).write(item.clone()) };
            self.len += 1;
        }
    }

    /// Insert copies of `src` before `pos` (clamped to `len`). Returns the
    /// index of the first inserted element.
    pub fn insert_slice(&mut self, pos: usize, src: &[T]) -> usize {
        let pos = pos.min(self.len);
        let count = src.len();
        if count == 0 {
            return pos;
        }
        let old_len = self.len;
        let new_len = old_len.checked_add(count).unwrap_or_else(|| capacity_overflow());
        if self.unused() < count {
            // Build the new layout directly: prefix, gap, suffix.
            let new_cap = grow_to(self.cap, new_len);
            tracing::trace!(from = self.cap, to = new_cap, len = old_len, "array realloc for insert");
            let layout = Layout::array::<T>(new_cap).unwrap_or_else(|_| capacity_overflow());
            // SAFETY: count > 0 so layout has non-zero size for non-ZST;
            // ZSTs never get here because their capacity is unbounded.
            let raw = unsafe { alloc::alloc(layout) } as *mut T;
            let new_ptr = NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(layout));
            // SAFETY: disjoint buffers, all ranges within their capacities.
            unsafe {
                let old = self.ptr.as_ptr();
                ptr::copy_nonoverlapping(old, new_ptr.as_ptr(), pos);
                ptr::copy_nonoverlapping(old.add(pos), new_ptr.as_ptr().add(pos + count), old_len - pos);
            }
            self.dealloc_buffer();
            self.ptr = new_ptr;
            self.cap = new_cap;
        } else {
            // SAFETY: there is room for `count` more; ranges may overlap.
            unsafe {
                let at = self.ptr.as_ptr().add(pos);
                ptr::copy(at, at.add(count), old_len - pos);
            }
        }
        // A panicking clone leaks the shifted suffix instead of exposing
        // the gap.
        self.len = pos;
        for (i, item) in src.iter().enumerate() {
            // SAFETY: slot pos + i lies inside the gap.
            unsafe { self.ptr.as_ptr().add(pos + i).write(item.clone()) };
        }
        self.len = new_len;
        pos
    }

    /// Grow or shrink to `new_len`, filling new slots with `value`.
    pub fn resize_with_value(&mut self, new_len: usize, value: T) {
        if new_len <= self.len {
            self.truncate(new_len);
            return;
        }
        if self.cap < new_len {
            self.realloc(grow_to(self.cap, new_len));
        }
        self.push_n(value, new_len - self.len);
    }
}

impl<T: Default> Array<T> {
    /// Grow or shrink to `new_len`, filling new slots with `T::default()`.
    pub fn resize(&mut self, new_len: usize) {
        if new_len <= self.len {
            self.truncate(new_len);
            return;
        }
        if self.cap < new_len {
            self.realloc(grow_to(self.cap, new_len));
        }
        while self.len < new_len {
            // SAFETY: capacity covers new_len.
            unsafe { self.ptr.as_ptr().add(self.len).write(T::default()) };
            self.len += 1;
        }
    }
}

impl<T: PartialEq> Array<T> {
    /// Index of the first element equal to `value`.
    pub fn find(&self, value: &T) -> Option<usize> {
        self.iter().position(|x| x == value)
    }

    /// Index of the first element equal to `value` at or after `start`.
    #[track_caller]
    pub fn find_from(&self, start: usize, value: &T) -> Option<usize> {
        check!(start <= self.len, InvalidIndex, "start {start} beyond length {}", self.len);
        let start = start.min(self.len);
        self.as_slice()[start..]
            .iter()
            .position(|x| x == value)
            .map(|i| i + start)
    }

    /// Erase the first element equal to `value`. Order is preserved.
    pub fn remove_value(&mut self, value: &T) -> bool {
        match self.find(value) {
            Some(i) => {
                self.erase(i, 1);
                true
            }
            None => false,
        }
    }

    /// Erase the first element equal to `value` by swapping in the last.
    pub fn fast_remove_value(&mut self, value: &T) -> bool {
        match self.find(value) {
            Some(i) => {
                self.fast_erase(i);
                true
            }
            None => false,
        }
    }
}

impl<T> Drop for Array<T> {
    fn drop(&mut self) {
        self.truncate(0);
        self.dealloc_buffer();
    }
}

impl<T> Default for Array<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for Array<T> {
    fn clone(&self) -> Self {
        let mut a = Self::new();
        a.extend_from_slice(self.as_slice());
        a
    }
}

impl<T> Deref for Array<T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for Array<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T> Index<usize> for Array<T> {
    type Output = T;
    #[track_caller]
    fn index(&self, index: usize) -> &T {
        self.at(index)
    }
}

impl<T> IndexMut<usize> for Array<T> {
    #[track_caller]
    fn index_mut(&mut self, index: usize) -> &mut T {
        self.at_mut(index)
    }
}

impl<T: PartialEq> PartialEq for Array<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.as_slice() == other.as_slice()
    }
}

impl<T: Eq> Eq for Array<T> {}

impl<T: PartialEq> PartialEq<[T]> for Array<T> {
    fn eq(&self, other: &[T]) -> bool {
        self.as_slice() == other
    }
}

impl<T: fmt::Debug> fmt::Debug for Array<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Extend<T> for Array<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve_for(iter.size_hint().0);
        for v in iter {
            self.push(v);
        }
    }
}

impl<'a, T: Copy + 'a> Extend<&'a T> for Array<T> {
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iter: I) {
        self.extend(iter.into_iter().copied());
    }
}

impl<T> FromIterator<T> for Array<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut a = Self::new();
        a.extend(iter);
        a
    }
}

impl<T: Clone> From<&[T]> for Array<T> {
    fn from(src: &[T]) -> Self {
        let mut a = Self::new();
        a.extend_from_slice(src);
        a
    }
}

impl<T, const N: usize> From<[T; N]> for Array<T> {
    fn from(src: [T; N]) -> Self {
        src.into_iter().collect()
    }
}

impl<'a, T> IntoIterator for &'a Array<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut Array<T> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T> IntoIterator for Array<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;
    fn into_iter(self) -> IntoIter<T> {
        let this = ManuallyDrop::new(self);
        IntoIter {
            ptr: this.ptr,
            cap: this.cap,
            start: 0,
            end: this.len,
            _owns: PhantomData,
        }
    }
}

/// Owning iterator over an [`Array`].
pub struct IntoIter<T> {
    ptr: NonNull<T>,
    cap: usize,
    start: usize,
    end: usize,
    _owns: PhantomData<T>,
}

// SAFETY: owns the remaining elements like the array did.
unsafe impl<T: Send> Send for IntoIter<T> {}
unsafe impl<T: Sync> Sync for IntoIter<T> {}

impl<T> Iterator for IntoIter<T> {
    type Item = T;
    fn next(&mut self) -> Option<T> {
        if self.start == self.end {
            return None;
        }
        // SAFETY: [start, end) is initialized and owned by the iterator.
        let v = unsafe { self.ptr.as_ptr().add(self.start).read() };
        self.start += 1;
        Some(v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end - self.start;
        (n, Some(n))
    }
}

impl<T> DoubleEndedIterator for IntoIter<T> {
    fn next_back(&mut self) -> Option<T> {
        if self.start == self.end {
            return None;
        }
        self.end -= 1;
        // SAFETY: slot `end` is initialized and no longer in range.
        Some(unsafe { self.ptr.as_ptr().add(self.end).read() })
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}
impl<T> FusedIterator for IntoIter<T> {}

impl<T> Drop for IntoIter<T> {
    fn drop(&mut self) {
        // Hand the remainder back to an Array so it drops and frees.
        let rest = self.end - self.start;
        // SAFETY: moving [start, end) to the front keeps it initialized.
        unsafe { ptr::copy(self.ptr.as_ptr().add(self.start), self.ptr.as_ptr(), rest) };
        drop(Array {
            ptr: self.ptr,
            cap: self.cap,
            len: rest,
            _owns: PhantomData,
        });
    }
}
