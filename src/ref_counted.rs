//! Intrusive atomic reference counting with a lazily created weak
//! indirection.
//!
//! An object embeds a [`RefCounter`]. Strong ownership
//! ([`SharedPtr`](crate::SharedPtr)) increments the counter directly; weak
//! ownership ([`WeakRef`](crate::WeakRef)) never touches it and instead
//! counts references to a small, separately allocated [`WeakReference`]
//! that points back at the object.
//!
//! Object lifecycle: live (count > 0) → dying (count reached 0, weak
//! indirection detached, deletion hook runs) → freed.
//!
//! Indirection lifecycle: unset → set (points at the object) → detached
//! (null, may still be referenced by weak holders) → freed when its own
//! count reaches 0. The object holds one reference to its indirection for
//! as long as it is alive.
//!
//! Upgrading a weak reference pins the indirection while it probes the
//! object, and the dying object waits for pins to drain before it is
//! freed. A probe therefore either sees a null target, or sees a live
//! allocation whose count it can only increment if non-zero.

use crate::atomic::{Atomic, MemoryOrder};
use crate::contract::check;
use core::hint::spin_loop;
use core::ptr::{self, NonNull};
use std::sync::atomic::fence;
use std::sync::atomic::Ordering;

const MAX_REFCOUNT: usize = isize::MAX as usize;

/// Marker stored in `RefCounter::weak` while one thread allocates the
/// indirection.
#[inline]
fn pending() -> *mut WeakReference {
    usize::MAX as *mut WeakReference
}

/// Strong count plus the weak indirection slot, embedded in a
/// reference-counted object.
#[derive(Debug)]
pub struct RefCounter {
    strong: Atomic<usize>,
    weak: Atomic<*mut WeakReference>,
}

impl RefCounter {
    pub const fn new() -> Self {
        Self {
            strong: Atomic::<usize>::new(0),
            weak: Atomic::<*mut WeakReference>::null(),
        }
    }

    pub fn strong_count(&self) -> usize {
        self.strong.get(MemoryOrder::Acquire)
    }

    /// True once a weak indirection has been created and not yet detached.
    pub fn has_weak_ref(&self) -> bool {
        !self.weak.get(MemoryOrder::Acquire).is_null()
    }

    #[inline]
    pub(crate) fn add_ref(&self) {
        let old = self.strong.add(1, MemoryOrder::Relaxed);
        if old > MAX_REFCOUNT {
            std::process::abort();
        }
    }

    /// Drop one strong reference. Returns true if the count is now zero.
    #[inline]
    #[track_caller]
    pub(crate) fn release(&self) -> bool {
        let old = self.strong.subtract(1, MemoryOrder::Release);
        check!(old != 0, InvalidState, "release on a dead object");
        if old == 1 {
            fence(Ordering::Acquire);
            return true;
        }
        false
    }

    /// Increment only if the count is non-zero at the moment of the
    /// exchange. Never resurrects an object whose count reached zero.
    pub(crate) fn safe_add_ref(&self) -> bool {
        loop {
            let current = self.strong.get(MemoryOrder::Relaxed);
            if current == 0 {
                return false;
            }
            if current > MAX_REFCOUNT {
                std::process::abort();
            }
            if self
                .strong
                .compare_exchange(current, current + 1, MemoryOrder::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Get the weak indirection, creating it on first use. `owner` is the
    /// address of the object embedding this counter. The caller must hold
    /// a strong reference.
    pub(crate) fn weak_ref(&self, owner: *mut ()) -> NonNull<WeakReference> {
        loop {
            let current = self.weak.get(MemoryOrder::Acquire);
            if current.is_null() {
                if self
                    .weak
                    .compare_exchange(ptr::null_mut(), pending(), MemoryOrder::Acquire)
                    .is_ok()
                {
                    let fresh = Box::into_raw(Box::new(WeakReference::new(owner)));
                    self.weak.set(fresh, MemoryOrder::Release);
                    tracing::trace!(object = ?owner, "weak indirection created");
                    // SAFETY: Box::into_raw never returns null.
                    return unsafe { NonNull::new_unchecked(fresh) };
                }
            } else if current != pending() {
                // SAFETY: a published indirection stays allocated while the
                // object holds its reference, which outlives the caller's
                // strong reference.
                return unsafe { NonNull::new_unchecked(current) };
            }
            spin_loop();
        }
    }

    /// Detach the weak indirection as part of deletion: clear its target,
    /// wait for in-flight upgrades, then drop the object's reference.
    pub(crate) fn detach_weak(&self) {
        let w = self.weak.exchange(ptr::null_mut(), MemoryOrder::AcquireRelease);
        if w.is_null() {
            return;
        }
        check!(w != pending(), InvalidState, "weak indirection created during deletion");
        // SAFETY: the object's reference keeps the indirection alive until
        // the release below.
        let weak = unsafe { &*w };
        weak.clear_target();
        while weak.pins() != 0 {
            spin_loop();
        }
        tracing::trace!(indirection = ?w, "weak indirection detached");
        // SAFETY: `w` came from Box::into_raw and we own one reference.
        unsafe { WeakReference::release(NonNull::new_unchecked(w)) };
    }
}

impl Default for RefCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RefCounter {
    fn drop(&mut self) {
        let weak = *self.weak.get_mut();
        check!(weak.is_null(), InvalidState, "object freed with a live weak indirection");
    }
}

/// Separately allocated weak-reference indirection.
#[derive(Debug)]
pub struct WeakReference {
    refs: Atomic<usize>,
    pins: Atomic<usize>,
    target: Atomic<*mut ()>,
}

impl WeakReference {
    fn new(target: *mut ()) -> Self {
        Self {
            refs: Atomic::<usize>::new(1),
            pins: Atomic::<usize>::new(0),
            target: Atomic::<*mut ()>::new(target),
        }
    }

    pub(crate) fn add_ref(&self) {
        let old = self.refs.add(1, MemoryOrder::Relaxed);
        if old > MAX_REFCOUNT {
            std::process::abort();
        }
    }

    /// Drop one reference, freeing the indirection when it was the last.
    ///
    /// # Safety
    /// `this` must come from `Box::into_raw` and the caller must own one
    /// reference.
    pub(crate) unsafe fn release(this: NonNull<Self>) {
        if this.as_ref().refs.subtract(1, MemoryOrder::Release) == 1 {
            fence(Ordering::Acquire);
            drop(Box::from_raw(this.as_ptr()));
        }
    }

    pub(crate) fn ref_count(&self) -> usize {
        self.refs.get(MemoryOrder::Acquire)
    }

    /// True once the object is gone.
    pub fn is_detached(&self) -> bool {
        self.target.load().is_null()
    }

    #[inline]
    pub(crate) fn pin(&self) {
        self.pins.add(1, MemoryOrder::Sequential);
    }

    #[inline]
    pub(crate) fn unpin(&self) {
        self.pins.subtract(1, MemoryOrder::Release);
    }

    #[inline]
    pub(crate) fn pins(&self) -> usize {
        self.pins.load()
    }

    #[inline]
    pub(crate) fn target(&self) -> *mut () {
        self.target.load()
    }

    #[inline]
    pub(crate) fn clear_target(&self) {
        self.target.store(ptr::null_mut());
    }
}

impl Drop for WeakReference {
    fn drop(&mut self) {
        check!(
            self.target.get_mut().is_null() && *self.refs.get_mut() == 0,
            InvalidState,
            "weak indirection freed while still attached"
        );
    }
}

/// An object that embeds a [`RefCounter`].
///
/// # Safety
/// `ref_counter` must always return the same counter, stored inside `self`
/// and used for no other object. Prefer [`impl_ref_counted!`](crate::impl_ref_counted).
/// Objects are shared across threads, hence the `Send + Sync` bound.
pub unsafe trait RefCounted: Send + Sync {
    fn ref_counter(&self) -> &RefCounter;

    /// Deletion hook. Runs once, after the weak indirection is detached and
    /// before the object is dropped and freed.
    fn on_delete(&self) {}
}

/// Implement [`RefCounted`] for a type by naming its counter field.
///
/// ```
/// use keel::{impl_ref_counted, RefCounter, SharedPtr};
///
/// struct Texture {
///     refs: RefCounter,
///     id: u32,
/// }
/// impl_ref_counted!(Texture, refs);
///
/// let t = SharedPtr::new(Texture { refs: RefCounter::new(), id: 3 });
/// assert_eq!(t.id, 3);
/// ```
#[macro_export]
macro_rules! impl_ref_counted {
    ($ty:ty, $field:ident) => {
        // SAFETY: the counter is a field of the object itself.
        unsafe impl $crate::RefCounted for $ty {
            #[inline]
            fn ref_counter(&self) -> &$crate::RefCounter {
                &self.$field
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: safe_add_ref succeeds only while the count is non-zero.
    #[test]
    fn safe_add_ref_refuses_zero() {
        let c = RefCounter::new();
        assert!(!c.safe_add_ref());
        c.add_ref();
        assert!(c.safe_add_ref());
        assert_eq!(c.strong_count(), 2);
        assert!(!c.release());
        assert!(c.release());
        assert!(!c.safe_add_ref());
        assert_eq!(c.strong_count(), 0);
    }

    /// Invariant: only one indirection is ever created per object, and
    /// detaching nulls its target while weak holders keep it allocated.
    #[test]
    fn weak_indirection_is_created_once() {
        let c = RefCounter::new();
        c.add_ref();
        let mut owner = 0u8;
        let owner_ptr = &mut owner as *mut u8 as *mut ();
        let a = c.weak_ref(owner_ptr);
        let b = c.weak_ref(owner_ptr);
        assert_eq!(a, b);
        assert!(c.has_weak_ref());

        // A weak holder takes its own reference.
        unsafe { a.as_ref() }.add_ref();
        assert_eq!(unsafe { a.as_ref() }.ref_count(), 2);

        assert!(c.release());
        c.detach_weak();
        assert!(!c.has_weak_ref());
        assert!(unsafe { a.as_ref() }.is_detached());
        assert_eq!(unsafe { a.as_ref() }.ref_count(), 1);
        unsafe { WeakReference::release(a) };
    }

    /// Invariant: racing first-time requests agree on one indirection.
    #[test]
    fn concurrent_weak_creation_yields_single_indirection() {
        use std::sync::Arc;
        let c = Arc::new(RefCounter::new());
        c.add_ref();
        let addrs: Vec<usize> = (0..8)
            .map(|_| {
                let c = c.clone();
                std::thread::spawn(move || c.weak_ref(ptr::null_mut::<()>().wrapping_add(1)).as_ptr() as usize)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap())
            .collect();
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
        assert!(c.release());
        c.detach_weak();
    }
}
