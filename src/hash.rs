//! 32-bit hashing used by [`HashMap`](crate::HashMap) and the string type.
//!
//! Integers hash to themselves (64-bit values fold their halves), pointers
//! hash to their address in units of the pointee size, and byte strings use
//! the rolling accumulator `h = byte + (h << 6) + (h << 16) - h`.

/// Types with a 32-bit hash. Equal values must hash equally, including
/// across [`Borrow`](core::borrow::Borrow) forms used for lookups.
pub trait MakeHash {
    fn make_hash(&self) -> u32;
}

/// Hash `bytes`, continuing from `seed`.
#[inline]
pub fn hash_bytes(bytes: &[u8], seed: u32) -> u32 {
    bytes.iter().fold(seed, |h, &b| step(h, b))
}

/// Like [`hash_bytes`] but letters hash as lower case (see [`lower`]).
#[inline]
pub fn hash_bytes_ignore_case(bytes: &[u8], seed: u32) -> u32 {
    bytes.iter().fold(seed, |h, &b| step(h, lower(b)))
}

/// Letter test used by every case-insensitive operation: ASCII letters,
/// plus every byte from 0xC0 up (the letter block of Latin-1 and CP1251).
#[inline]
pub const fn is_alpha(b: u8) -> bool {
    b.is_ascii_alphabetic() || b >= 0xC0
}

/// Lower case of a letter by setting bit 0x20; other bytes unchanged.
#[inline]
pub const fn lower(b: u8) -> u8 {
    if is_alpha(b) {
        b | 0x20
    } else {
        b
    }
}

/// Upper case of a letter by clearing bit 0x20; other bytes unchanged.
#[inline]
pub const fn upper(b: u8) -> u8 {
    if is_alpha(b) {
        b & !0x20
    } else {
        b
    }
}

#[inline(always)]
fn step(h: u32, b: u8) -> u32 {
    (b as u32)
        .wrapping_add(h << 6)
        .wrapping_add(h << 16)
        .wrapping_sub(h)
}

#[inline(always)]
fn fold64(v: u64) -> u32 {
    ((v >> 32) | (v & 0xffff_ffff)) as u32
}

macro_rules! identity_hash {
    ($($t:ty),*) => {$(
        impl MakeHash for $t {
            #[inline]
            fn make_hash(&self) -> u32 {
                *self as u32
            }
        }
    )*};
}

identity_hash!(u8, i8, u16, i16, u32, i32, char);

impl MakeHash for bool {
    #[inline]
    fn make_hash(&self) -> u32 {
        *self as u32
    }
}

impl MakeHash for u64 {
    #[inline]
    fn make_hash(&self) -> u32 {
        fold64(*self)
    }
}

impl MakeHash for i64 {
    #[inline]
    fn make_hash(&self) -> u32 {
        // Arithmetic shift, as for any signed 64-bit value.
        ((*self >> 32) | (*self & 0xffff_ffff)) as u32
    }
}

impl MakeHash for usize {
    #[inline]
    fn make_hash(&self) -> u32 {
        fold64(*self as u64)
    }
}

impl MakeHash for isize {
    #[inline]
    fn make_hash(&self) -> u32 {
        (*self as i64).make_hash()
    }
}

impl MakeHash for [u8] {
    #[inline]
    fn make_hash(&self) -> u32 {
        hash_bytes(self, 0)
    }
}

impl MakeHash for str {
    #[inline]
    fn make_hash(&self) -> u32 {
        hash_bytes(self.as_bytes(), 0)
    }
}

impl MakeHash for String {
    #[inline]
    fn make_hash(&self) -> u32 {
        self.as_str().make_hash()
    }
}

impl<T: MakeHash + ?Sized> MakeHash for &T {
    #[inline]
    fn make_hash(&self) -> u32 {
        (**self).make_hash()
    }
}

impl<T: MakeHash + ?Sized> MakeHash for Box<T> {
    #[inline]
    fn make_hash(&self) -> u32 {
        (**self).make_hash()
    }
}

#[inline]
fn pointer_hash<T>(addr: usize) -> u32 {
    (addr / core::mem::size_of::<T>().max(1)) as u32
}

impl<T> MakeHash for *const T {
    #[inline]
    fn make_hash(&self) -> u32 {
        pointer_hash::<T>(*self as usize)
    }
}

impl<T> MakeHash for *mut T {
    #[inline]
    fn make_hash(&self) -> u32 {
        pointer_hash::<T>(*self as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: the accumulator matches a hand-computed value.
    #[test]
    fn rolling_accumulator() {
        assert_eq!(hash_bytes(b"", 0), 0);
        assert_eq!(hash_bytes(b"a", 0), 97);
        // h = 'b' + (97 << 6) + (97 << 16) - 97
        let expected = 98u32 + (97 << 6) + (97 << 16) - 97;
        assert_eq!(hash_bytes(b"ab", 0), expected);
        assert_eq!(hash_bytes(b"b", hash_bytes(b"a", 0)), expected);
        assert_eq!("ab".make_hash(), expected);
        assert_eq!(String::from("ab").make_hash(), expected);
        assert_eq!(b"ab"[..].make_hash(), expected);
    }

    /// Invariant: folding covers ASCII letters and the high letter block,
    /// and leaves digits, punctuation and bytes 0x80..0xC0 alone.
    #[test]
    fn ignore_case_folds_high_letters() {
        assert_eq!(hash_bytes_ignore_case(b"HeLLo", 0), hash_bytes(b"hello", 0));
        assert_eq!(hash_bytes_ignore_case(b"\xC4", 0), hash_bytes(b"\xE4", 0));
        assert_eq!(hash_bytes_ignore_case(b"\xE4", 0), hash_bytes(b"\xE4", 0));
        assert_eq!(lower(b'Q'), b'q');
        assert_eq!(upper(b'q'), b'Q');
        assert_eq!(lower(0xC0), 0xE0);
        assert_eq!(upper(0xFF), 0xDF);
        assert_eq!(lower(0xA8), 0xA8);
        assert_eq!(lower(b'@'), b'@');
        assert_eq!(upper(b'`'), b'`');
        assert_eq!(lower(b'7'), b'7');
    }

    /// Invariant: small integers are the identity; 64-bit values fold.
    #[test]
    fn integer_hashes() {
        assert_eq!(42u8.make_hash(), 42);
        assert_eq!((-1i16).make_hash(), u32::MAX);
        assert_eq!(7u32.make_hash(), 7);
        assert_eq!(0x0000_0001_0000_0002u64.make_hash(), 3);
        assert_eq!(0xF0F0_0000_0000_0F0Fu64.make_hash(), 0xF0F0_0F0F);
        assert_eq!((-1i64).make_hash(), u32::MAX);
        assert_eq!('A'.make_hash(), 65);
    }

    #[test]
    fn pointer_hash_uses_element_units() {
        let p = 64usize as *const u32;
        assert_eq!(p.make_hash(), 16);
        let z = 64usize as *const ();
        assert_eq!(z.make_hash(), 64);
    }
}
