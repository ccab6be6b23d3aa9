//! Typed atomics with explicit memory orders.
//!
//! `Atomic<T>` wraps the matching `core::sync::atomic` type for every
//! primitive that has one, plus raw pointers. Every operation takes a
//! [`MemoryOrder`]; the order-less shorthands use `Sequential`. All
//! read-modify-write operations return the previous value.

use crate::contract::check;
use core::fmt;
use core::sync::atomic::{self as std_atomic, Ordering};

/// Memory ordering of an atomic operation.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum MemoryOrder {
    Relaxed,
    /// Rust has no consume ordering; this is promoted to `Acquire`.
    Consume,
    Acquire,
    Release,
    AcquireRelease,
    #[default]
    Sequential,
}

impl MemoryOrder {
    /// The `core` ordering this maps onto.
    #[inline]
    pub const fn to_std(self) -> Ordering {
        match self {
            MemoryOrder::Relaxed => Ordering::Relaxed,
            MemoryOrder::Consume | MemoryOrder::Acquire => Ordering::Acquire,
            MemoryOrder::Release => Ordering::Release,
            MemoryOrder::AcquireRelease => Ordering::AcqRel,
            MemoryOrder::Sequential => Ordering::SeqCst,
        }
    }

    /// Failure ordering of a compare-exchange succeeding with `self`.
    #[inline]
    pub const fn failure(self) -> MemoryOrder {
        match self {
            MemoryOrder::AcquireRelease => MemoryOrder::Acquire,
            MemoryOrder::Release => MemoryOrder::Relaxed,
            other => other,
        }
    }

    /// Valid ordering for a plain load.
    #[inline]
    pub const fn is_load(self) -> bool {
        matches!(
            self,
            MemoryOrder::Relaxed
                | MemoryOrder::Consume
                | MemoryOrder::Acquire
                | MemoryOrder::Sequential
        )
    }

    /// Valid ordering for a plain store.
    #[inline]
    pub const fn is_store(self) -> bool {
        matches!(
            self,
            MemoryOrder::Relaxed | MemoryOrder::Release | MemoryOrder::Sequential
        )
    }
}

#[track_caller]
fn load_order(order: MemoryOrder) -> Ordering {
    if check!(order.is_load(), InvalidOrder, "{order:?} is not a load ordering") {
        order.to_std()
    } else {
        Ordering::SeqCst
    }
}

#[track_caller]
fn store_order(order: MemoryOrder) -> Ordering {
    if check!(order.is_store(), InvalidOrder, "{order:?} is not a store ordering") {
        order.to_std()
    } else {
        Ordering::SeqCst
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A value type with a native atomic representation.
pub trait AtomicValue: Copy + Eq + sealed::Sealed {
    #[doc(hidden)]
    type Repr: Send + Sync;
    #[doc(hidden)]
    fn new_repr(v: Self) -> Self::Repr;
    #[doc(hidden)]
    fn load(r: &Self::Repr, o: Ordering) -> Self;
    #[doc(hidden)]
    fn store(r: &Self::Repr, v: Self, o: Ordering);
    #[doc(hidden)]
    fn swap(r: &Self::Repr, v: Self, o: Ordering) -> Self;
    #[doc(hidden)]
    fn cas(r: &Self::Repr, cur: Self, new: Self, s: Ordering, f: Ordering) -> Result<Self, Self>;
    #[doc(hidden)]
    fn cas_weak(r: &Self::Repr, cur: Self, new: Self, s: Ordering, f: Ordering)
        -> Result<Self, Self>;
    #[doc(hidden)]
    fn get_mut(r: &mut Self::Repr) -> &mut Self;
    #[doc(hidden)]
    fn into_inner(r: Self::Repr) -> Self;
}

/// Bitwise read-modify-write support.
pub trait AtomicBits: AtomicValue {
    #[doc(hidden)]
    fn fetch_and(r: &Self::Repr, v: Self, o: Ordering) -> Self;
    #[doc(hidden)]
    fn fetch_or(r: &Self::Repr, v: Self, o: Ordering) -> Self;
    #[doc(hidden)]
    fn fetch_xor(r: &Self::Repr, v: Self, o: Ordering) -> Self;
}

/// Wrapping arithmetic read-modify-write support.
pub trait AtomicInteger: AtomicBits {
    #[doc(hidden)]
    fn fetch_add(r: &Self::Repr, v: Self, o: Ordering) -> Self;
    #[doc(hidden)]
    fn fetch_sub(r: &Self::Repr, v: Self, o: Ordering) -> Self;
}

macro_rules! atomic_common {
    ($t:ty, $repr:ty) => {
        impl sealed::Sealed for $t {}

        impl AtomicValue for $t {
            type Repr = $repr;
            #[inline]
            fn new_repr(v: Self) -> Self::Repr {
                <$repr>::new(v)
            }
            #[inline]
            fn load(r: &Self::Repr, o: Ordering) -> Self {
                r.load(o)
            }
            #[inline]
            fn store(r: &Self::Repr, v: Self, o: Ordering) {
                r.store(v, o)
            }
            #[inline]
            fn swap(r: &Self::Repr, v: Self, o: Ordering) -> Self {
                r.swap(v, o)
            }
            #[inline]
            fn cas(r: &Self::Repr, cur: Self, new: Self, s: Ordering, f: Ordering) -> Result<Self, Self> {
                r.compare_exchange(cur, new, s, f)
            }
            #[inline]
            fn cas_weak(r: &Self::Repr, cur: Self, new: Self, s: Ordering, f: Ordering) -> Result<Self, Self> {
                r.compare_exchange_weak(cur, new, s, f)
            }
            #[inline]
            fn get_mut(r: &mut Self::Repr) -> &mut Self {
                r.get_mut()
            }
            #[inline]
            fn into_inner(r: Self::Repr) -> Self {
                r.into_inner()
            }
        }

        impl AtomicBits for $t {
            #[inline]
            fn fetch_and(r: &Self::Repr, v: Self, o: Ordering) -> Self {
                r.fetch_and(v, o)
            }
            #[inline]
            fn fetch_or(r: &Self::Repr, v: Self, o: Ordering) -> Self {
                r.fetch_or(v, o)
            }
            #[inline]
            fn fetch_xor(r: &Self::Repr, v: Self, o: Ordering) -> Self {
                r.fetch_xor(v, o)
            }
        }

        impl Atomic<$t> {
            /// Create a new atomic holding `v`.
            pub const fn new(v: $t) -> Self {
                Atomic { repr: <$repr>::new(v) }
            }
        }
    };
}

macro_rules! atomic_integer {
    ($($t:ty => $repr:ty),* $(,)?) => {$(
        atomic_common!($t, $repr);

        impl AtomicInteger for $t {
            #[inline]
            fn fetch_add(r: &Self::Repr, v: Self, o: Ordering) -> Self {
                r.fetch_add(v, o)
            }
            #[inline]
            fn fetch_sub(r: &Self::Repr, v: Self, o: Ordering) -> Self {
                r.fetch_sub(v, o)
            }
        }
    )*};
}

atomic_common!(bool, std_atomic::AtomicBool);
atomic_integer! {
    i8 => std_atomic::AtomicI8,
    u8 => std_atomic::AtomicU8,
    i16 => std_atomic::AtomicI16,
    u16 => std_atomic::AtomicU16,
    i32 => std_atomic::AtomicI32,
    u32 => std_atomic::AtomicU32,
    i64 => std_atomic::AtomicI64,
    u64 => std_atomic::AtomicU64,
    isize => std_atomic::AtomicIsize,
    usize => std_atomic::AtomicUsize,
}

impl<T> sealed::Sealed for *mut T {}

impl<T> AtomicValue for *mut T {
    type Repr = std_atomic::AtomicPtr<T>;
    #[inline]
    fn new_repr(v: Self) -> Self::Repr {
        std_atomic::AtomicPtr::new(v)
    }
    #[inline]
    fn load(r: &Self::Repr, o: Ordering) -> Self {
        r.load(o)
    }
    #[inline]
    fn store(r: &Self::Repr, v: Self, o: Ordering) {
        r.store(v, o)
    }
    #[inline]
    fn swap(r: &Self::Repr, v: Self, o: Ordering) -> Self {
        r.swap(v, o)
    }
    #[inline]
    fn cas(r: &Self::Repr, cur: Self, new: Self, s: Ordering, f: Ordering) -> Result<Self, Self> {
        r.compare_exchange(cur, new, s, f)
    }
    #[inline]
    fn cas_weak(r: &Self::Repr, cur: Self, new: Self, s: Ordering, f: Ordering) -> Result<Self, Self> {
        r.compare_exchange_weak(cur, new, s, f)
    }
    #[inline]
    fn get_mut(r: &mut Self::Repr) -> &mut Self {
        r.get_mut()
    }
    #[inline]
    fn into_inner(r: Self::Repr) -> Self {
        r.into_inner()
    }
}

impl<T> Atomic<*mut T> {
    /// Create a new atomic pointer.
    pub const fn new(v: *mut T) -> Self {
        Atomic { repr: std_atomic::AtomicPtr::new(v) }
    }

    /// Create a null atomic pointer.
    pub const fn null() -> Self {
        Self::new(core::ptr::null_mut())
    }

    /// Move the pointer by `delta` elements of `T`, wrapping; returns the
    /// previous pointer.
    #[inline]
    pub fn add(&self, delta: isize, order: MemoryOrder) -> *mut T {
        self.offset_by(delta, order)
    }

    /// Move the pointer back by `delta` elements of `T`, wrapping; returns
    /// the previous pointer.
    #[inline]
    pub fn subtract(&self, delta: isize, order: MemoryOrder) -> *mut T {
        self.offset_by(delta.wrapping_neg(), order)
    }

    fn offset_by(&self, delta: isize, order: MemoryOrder) -> *mut T {
        let (success, failure) = (order.to_std(), order.failure().to_std());
        let mut cur = self.repr.load(failure);
        loop {
            match self.repr.compare_exchange_weak(cur, cur.wrapping_offset(delta), success, failure) {
                Ok(prev) => return prev,
                Err(seen) => cur = seen,
            }
        }
    }
}

/// An atomic cell of `T` with explicit memory orders.
pub struct Atomic<T: AtomicValue> {
    repr: T::Repr,
}

impl<T: AtomicValue> Atomic<T> {
    /// Load with `order`. Release orders are contract violations.
    #[inline]
    #[track_caller]
    pub fn get(&self, order: MemoryOrder) -> T {
        T::load(&self.repr, load_order(order))
    }

    /// Store with `order`. Acquire and consume orders are contract violations.
    #[inline]
    #[track_caller]
    pub fn set(&self, value: T, order: MemoryOrder) {
        T::store(&self.repr, value, store_order(order))
    }

    #[inline]
    pub fn exchange(&self, value: T, order: MemoryOrder) -> T {
        T::swap(&self.repr, value, order.to_std())
    }

    /// Strong compare-exchange. The failure order is derived from `order`.
    /// `Ok(previous)` on success, `Err(observed)` otherwise.
    #[inline]
    pub fn compare_exchange(&self, expected: T, value: T, order: MemoryOrder) -> Result<T, T> {
        T::cas(&self.repr, expected, value, order.to_std(), order.failure().to_std())
    }

    /// Weak compare-exchange; may fail spuriously.
    #[inline]
    pub fn compare_exchange_weak(&self, expected: T, value: T, order: MemoryOrder) -> Result<T, T> {
        T::cas_weak(&self.repr, expected, value, order.to_std(), order.failure().to_std())
    }

    /// Sequentially consistent load.
    #[inline]
    pub fn load(&self) -> T {
        T::load(&self.repr, Ordering::SeqCst)
    }

    /// Sequentially consistent store.
    #[inline]
    pub fn store(&self, value: T) {
        T::store(&self.repr, value, Ordering::SeqCst)
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        T::get_mut(&mut self.repr)
    }

    #[inline]
    pub fn into_inner(self) -> T {
        T::into_inner(self.repr)
    }

    /// Non-const constructor usable in generic code.
    #[inline]
    pub fn from_value(value: T) -> Self {
        Atomic { repr: T::new_repr(value) }
    }
}

impl<T: AtomicBits> Atomic<T> {
    #[inline]
    pub fn and(&self, value: T, order: MemoryOrder) -> T {
        T::fetch_and(&self.repr, value, order.to_std())
    }

    #[inline]
    pub fn or(&self, value: T, order: MemoryOrder) -> T {
        T::fetch_or(&self.repr, value, order.to_std())
    }

    #[inline]
    pub fn xor(&self, value: T, order: MemoryOrder) -> T {
        T::fetch_xor(&self.repr, value, order.to_std())
    }
}

impl<T: AtomicInteger> Atomic<T> {
    /// Wrapping add; returns the previous value.
    #[inline]
    pub fn add(&self, value: T, order: MemoryOrder) -> T {
        T::fetch_add(&self.repr, value, order.to_std())
    }

    /// Wrapping subtract; returns the previous value.
    #[inline]
    pub fn subtract(&self, value: T, order: MemoryOrder) -> T {
        T::fetch_sub(&self.repr, value, order.to_std())
    }

    #[inline]
    pub fn fetch_add(&self, value: T) -> T {
        self.add(value, MemoryOrder::Sequential)
    }

    #[inline]
    pub fn fetch_sub(&self, value: T) -> T {
        self.subtract(value, MemoryOrder::Sequential)
    }
}

impl<T: AtomicValue + Default> Default for Atomic<T> {
    fn default() -> Self {
        Self::from_value(T::default())
    }
}

impl<T: AtomicValue + fmt::Debug> fmt::Debug for Atomic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Atomic").field(&self.get(MemoryOrder::Relaxed)).finish()
    }
}

impl<T: AtomicValue> From<T> for Atomic<T> {
    fn from(value: T) -> Self {
        Self::from_value(value)
    }
}
