//! `CowString`: copy-on-write, reference-counted byte string.
//!
//! Cloning bumps the buffer count; nothing is copied until a mutation finds
//! the buffer shared, at which point the mutator takes a private copy.
//! Bytes are not required to be UTF-8; `to_str` and `to_string_lossy`
//! convert on demand. Case mapping folds ASCII letters and the single-byte
//! letter block from 0xC0 up.

use crate::array::{grow_to, Array};
use crate::contract::check;
use crate::cow_buffer::Buffer;
use crate::hash::{self, hash_bytes, hash_bytes_ignore_case, MakeHash};
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::{Add, AddAssign, Index, IndexMut, Range};
use std::borrow::Cow;
use tracing::trace;

/// Capacity for a buffer that must hold at least `required` bytes.
#[inline]
fn string_capacity(current: usize, required: usize) -> usize {
    grow_to(current, required) | 15
}

/// Copy-on-write byte string.
pub struct CowString {
    buf: Buffer,
}

impl CowString {
    /// Empty string sharing the static empty buffer.
    pub fn new() -> Self {
        Self { buf: Buffer::null() }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut s = Self::new();
        s.append(bytes);
        s
    }

    /// `count` copies of `byte`.
    pub fn repeat_byte(count: usize, byte: u8) -> Self {
        let mut s = Self::new();
        s.append_repeat(count, byte);
        s
    }

    /// `a` followed by `b`, allocated once.
    pub fn concat(a: &[u8], b: &[u8]) -> Self {
        let mut s = Self::new();
        s.reserve(a.len() + b.len());
        s.append(a);
        s.append(b);
        s
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_bytes()
    }

    /// Contents followed by the NUL terminator.
    #[inline]
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        self.buf.as_bytes_with_nul()
    }

    pub fn to_str(&self) -> Result<&str, core::str::Utf8Error> {
        core::str::from_utf8(self.as_bytes())
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    /// True if another string shares this buffer. Empty strings always
    /// share the static buffer.
    #[inline]
    pub fn is_shared(&self) -> bool {
        !self.buf.is_unique()
    }

    /// True if both strings use the same buffer.
    #[inline]
    pub fn ptr_eq(&self, other: &CowString) -> bool {
        self.buf.ptr_eq(&other.buf)
    }

    /// Make the buffer private with room for `required` bytes.
    fn make_mut(&mut self, required: usize) {
        // The static empty buffer is never writable, so always leave it.
        let required = required.max(1);
        let cap = self.capacity();
        if self.buf.is_unique() && cap >= required {
            return;
        }
        let new_cap = if cap < required {
            string_capacity(cap, required)
        } else {
            cap
        };
        let len = self.len();
        let mut fresh = Buffer::with_capacity(new_cap);
        // SAFETY: `fresh` is unique and `len <= new_cap`.
        unsafe {
            fresh.storage_mut()[..len].copy_from_slice(self.as_bytes());
            fresh.set_len(len);
        }
        trace!(len, from = cap, to = new_cap, shared = !self.buf.is_null(), "cow string unshare");
        self.buf = fresh;
    }

    /// Ensure room for `max_len` bytes in a private buffer.
    pub fn reserve(&mut self, max_len: usize) {
        if max_len == 0 {
            return;
        }
        self.make_mut(max_len);
    }

    /// Grow with `fill` or shrink to `new_len`.
    pub fn resize(&mut self, new_len: usize, fill: u8) {
        let len = self.len();
        if new_len > len {
            self.append_repeat(new_len - len, fill);
        } else {
            self.truncate(new_len);
        }
    }

    /// Shorten to `new_len`; no effect if already shorter.
    pub fn truncate(&mut self, new_len: usize) {
        if new_len >= self.len() {
            return;
        }
        if new_len == 0 {
            self.clear();
            return;
        }
        self.make_mut(0);
        // SAFETY: unique after make_mut and `new_len < len`.
        unsafe { self.buf.set_len(new_len) };
    }

    /// Empty the string. A private buffer keeps its capacity; a shared one
    /// is released.
    pub fn clear(&mut self) {
        if self.buf.is_unique() {
            // SAFETY: unique.
            unsafe { self.buf.set_len(0) };
        } else {
            self.buf = Buffer::null();
        }
    }

    /// Append `bytes`. A slice borrowed from another string that shares
    /// this buffer stays valid: that string keeps the old buffer alive.
    pub fn append(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let len = self.len();
        let new_len = len + bytes.len();
        self.make_mut(new_len);
        // SAFETY: unique with capacity >= new_len.
        unsafe {
            self.buf.storage_mut()[len..new_len].copy_from_slice(bytes);
            self.buf.set_len(new_len);
        }
    }

    #[inline]
    pub fn append_str(&mut self, s: &str) {
        self.append(s.as_bytes());
    }

    pub fn push(&mut self, byte: u8) {
        self.append(&[byte]);
    }

    pub fn append_repeat(&mut self, count: usize, byte: u8) {
        if count == 0 {
            return;
        }
        let len = self.len();
        let new_len = len + count;
        self.make_mut(new_len);
        // SAFETY: unique with capacity >= new_len.
        unsafe {
            self.buf.storage_mut()[len..new_len].fill(byte);
            self.buf.set_len(new_len);
        }
    }

    /// Append another string, which may share this buffer.
    pub fn append_cow(&mut self, other: &CowString) {
        if self.is_empty() {
            *self = other.clone();
            return;
        }
        self.append(other.as_bytes());
    }

    /// Append a copy of `self[range]`. The range is clamped to the string.
    pub fn append_from_within(&mut self, range: Range<usize>) {
        let len = self.len();
        let start = range.start.min(len);
        let end = range.end.clamp(start, len);
        let count = end - start;
        if count == 0 {
            return;
        }
        let new_len = len + count;
        if self.buf.is_unique() && self.capacity() >= new_len {
            // SAFETY: unique with capacity >= new_len; source precedes the tail.
            unsafe {
                self.buf.storage_mut().copy_within(start..end, len);
                self.buf.set_len(new_len);
            }
            return;
        }
        // Pin the source so the reallocation cannot free it.
        let pin = self.buf.clone();
        self.make_mut(new_len);
        // SAFETY: unique with capacity >= new_len.
        unsafe {
            self.buf.storage_mut()[len..new_len].copy_from_slice(&pin.as_bytes()[start..end]);
            self.buf.set_len(new_len);
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<u8> {
        self.as_bytes().get(index).copied()
    }

    /// Byte at `index`, contract-checked. Out of range yields NUL.
    #[track_caller]
    pub fn at(&self, index: usize) -> u8 {
        let len = self.len();
        if !check!(index < len, InvalidIndex, "index {index} out of range for length {len}") {
            return 0;
        }
        self.as_bytes()[index]
    }

    /// Overwrite the byte at `index`, contract-checked.
    #[track_caller]
    pub fn set(&mut self, index: usize, byte: u8) {
        let len = self.len();
        if !check!(index < len, InvalidIndex, "index {index} out of range for length {len}") {
            return;
        }
        self.make_mut(0);
        // SAFETY: unique and `index < len`.
        unsafe { self.buf.storage_mut()[index] = byte };
    }

    /// Copy of up to `len` bytes from `offset`; `None` runs to the end.
    /// Both bounds are clamped.
    pub fn substr(&self, offset: usize, len: Option<usize>) -> CowString {
        let bytes = self.as_bytes();
        let start = offset.min(bytes.len());
        let end = match len {
            Some(n) => start.saturating_add(n).min(bytes.len()),
            None => bytes.len(),
        };
        if start == 0 && end == bytes.len() {
            return self.clone();
        }
        CowString::from_bytes(&bytes[start..end])
    }

    fn map_bytes(&mut self, f: impl Fn(&mut [u8])) {
        if self.is_empty() {
            return;
        }
        self.make_mut(0);
        let len = self.len();
        // SAFETY: unique after make_mut.
        unsafe { f(&mut self.buf.storage_mut()[..len]) };
    }

    pub fn make_lower(&mut self) {
        self.map_case(hash::lower);
    }

    pub fn make_upper(&mut self) {
        self.map_case(hash::upper);
    }

    /// Apply a byte case mapping, copying only when some byte changes.
    fn map_case(&mut self, f: fn(u8) -> u8) {
        if self.as_bytes().iter().any(|&b| f(b) != b) {
            self.map_bytes(|bytes| bytes.iter_mut().for_each(|b| *b = f(*b)));
        }
    }

    pub fn to_lower(&self) -> CowString {
        let mut s = self.clone();
        s.make_lower();
        s
    }

    pub fn to_upper(&self) -> CowString {
        let mut s = self.clone();
        s.make_upper();
        s
    }

    /// Rolling hash of the bytes, continuing from `seed`.
    #[inline]
    pub fn hash(&self, seed: u32) -> u32 {
        hash_bytes(self.as_bytes(), seed)
    }

    /// Like [`hash`](Self::hash) with letters folded to lower case.
    #[inline]
    pub fn ihash(&self, seed: u32) -> u32 {
        hash_bytes_ignore_case(self.as_bytes(), seed)
    }

    /// Lexicographic byte comparison, optionally case-insensitive.
    pub fn compare(a: &[u8], b: &[u8], ignore_case: bool) -> Ordering {
        if !ignore_case {
            return a.cmp(b);
        }
        a.iter()
            .map(|&c| hash::lower(c))
            .cmp(b.iter().map(|&c| hash::lower(c)))
    }

    /// Offset of the first occurrence of `needle`. An empty needle is
    /// found at 0.
    pub fn find(haystack: &[u8], needle: &[u8], ignore_case: bool) -> Option<usize> {
        if needle.is_empty() {
            return Some(0);
        }
        if needle.len() > haystack.len() {
            return None;
        }
        haystack.windows(needle.len()).position(|w| {
            if ignore_case {
                w.iter().zip(needle).all(|(&x, &y)| hash::lower(x) == hash::lower(y))
            } else {
                w == needle
            }
        })
    }

    /// Tokens of `s` separated by runs of any byte in `delimiters`. Empty
    /// tokens are dropped; `None` yields the whole string as one token.
    pub fn split(s: &[u8], delimiters: Option<&[u8]>) -> Array<CowString> {
        let mut out = Array::new();
        let Some(delims) = delimiters else {
            if !s.is_empty() {
                out.push(CowString::from_bytes(s));
            }
            return out;
        };
        for token in s.split(|b| delims.contains(b)) {
            if !token.is_empty() {
                out.push(CowString::from_bytes(token));
            }
        }
        out
    }
}

impl Default for CowString {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CowString {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            buf: self.buf.clone(),
        }
    }
}

impl From<&str> for CowString {
    fn from(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

impl From<&[u8]> for CowString {
    fn from(s: &[u8]) -> Self {
        Self::from_bytes(s)
    }
}

impl From<String> for CowString {
    fn from(s: String) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

impl From<&String> for CowString {
    fn from(s: &String) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

impl AsRef<[u8]> for CowString {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Borrow<[u8]> for CowString {
    fn borrow(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Index<usize> for CowString {
    type Output = u8;

    #[track_caller]
    fn index(&self, index: usize) -> &u8 {
        let len = self.len();
        check!(index < len, InvalidIndex, "index {index} out of range for length {len}");
        &self.as_bytes()[index]
    }
}

impl IndexMut<usize> for CowString {
    #[track_caller]
    fn index_mut(&mut self, index: usize) -> &mut u8 {
        let len = self.len();
        check!(index < len, InvalidIndex, "index {index} out of range for length {len}");
        self.make_mut(0);
        // SAFETY: unique after make_mut; the slice bound check stays.
        unsafe { &mut self.buf.storage_mut()[..len][index] }
    }
}

impl PartialEq for CowString {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.as_bytes() == other.as_bytes()
    }
}

impl Eq for CowString {}

impl PartialEq<str> for CowString {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for CowString {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<[u8]> for CowString {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialEq<&[u8]> for CowString {
    fn eq(&self, other: &&[u8]) -> bool {
        self.as_bytes() == *other
    }
}

impl PartialOrd for CowString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CowString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl Hash for CowString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl MakeHash for CowString {
    #[inline]
    fn make_hash(&self) -> u32 {
        hash_bytes(self.as_bytes(), 0)
    }
}

impl fmt::Display for CowString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_string_lossy(), f)
    }
}

impl fmt::Debug for CowString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string_lossy(), f)
    }
}

impl Add<&CowString> for CowString {
    type Output = CowString;

    fn add(mut self, rhs: &CowString) -> CowString {
        self.append_cow(rhs);
        self
    }
}

impl Add<&str> for CowString {
    type Output = CowString;

    fn add(mut self, rhs: &str) -> CowString {
        self.append_str(rhs);
        self
    }
}

impl AddAssign<&CowString> for CowString {
    fn add_assign(&mut self, rhs: &CowString) {
        self.append_cow(rhs);
    }
}

impl AddAssign<&str> for CowString {
    fn add_assign(&mut self, rhs: &str) {
        self.append_str(rhs);
    }
}

impl AddAssign<u8> for CowString {
    fn add_assign(&mut self, rhs: u8) {
        self.push(rhs);
    }
}

impl Extend<u8> for CowString {
    fn extend<I: IntoIterator<Item = u8>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.reserve(self.len() + lower);
        for b in iter {
            self.push(b);
        }
    }
}

impl FromIterator<u8> for CowString {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut s = CowString::new();
        s.extend(iter);
        s
    }
}
