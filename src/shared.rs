//! `SharedPtr` and `WeakRef`: owning handles over [`RefCounted`] objects.

use crate::contract::check;
use crate::ref_counted::{RefCounted, WeakReference};
use core::fmt;
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::NonNull;

/// Strong handle. Owns exactly one increment of the object's count.
pub struct SharedPtr<T: RefCounted> {
    ptr: NonNull<T>,
    _owns: PhantomData<T>,
}

// SAFETY: `RefCounted: Send + Sync` and the count is atomic.
unsafe impl<T: RefCounted> Send for SharedPtr<T> {}
unsafe impl<T: RefCounted> Sync for SharedPtr<T> {}

impl<T: RefCounted> SharedPtr<T> {
    /// Move `value` to the heap and take the first strong reference.
    #[track_caller]
    pub fn new(value: T) -> Self {
        let counter = value.ref_counter();
        check!(
            counter.strong_count() == 0 && !counter.has_weak_ref(),
            InvalidState,
            "object already owned"
        );
        let ptr = NonNull::from(Box::leak(Box::new(value)));
        // SAFETY: freshly allocated, nobody else can observe it.
        unsafe { ptr.as_ref() }.ref_counter().add_ref();
        Self { ptr, _owns: PhantomData }
    }

    /// Re-acquire a strong handle from a plain reference (intrusive form).
    ///
    /// # Safety
    /// `value` must live inside an allocation made by [`SharedPtr::new`]
    /// whose count is non-zero for the duration of the call.
    pub unsafe fn from_ref(value: &T) -> Self {
        value.ref_counter().add_ref();
        Self {
            ptr: NonNull::from(value),
            _owns: PhantomData,
        }
    }

    /// Release ownership without touching the count.
    pub fn into_raw(this: Self) -> *const T {
        let p = this.ptr.as_ptr() as *const T;
        core::mem::forget(this);
        p
    }

    /// Adopt a pointer from [`SharedPtr::into_raw`] without incrementing.
    ///
    /// # Safety
    /// `ptr` must come from `into_raw` and its increment must not have been
    /// adopted already.
    pub unsafe fn from_raw(ptr: *const T) -> Self {
        Self {
            ptr: NonNull::new_unchecked(ptr as *mut T),
            _owns: PhantomData,
        }
    }

    pub fn as_ptr(this: &Self) -> *const T {
        this.ptr.as_ptr()
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.ptr == b.ptr
    }

    pub fn strong_count(this: &Self) -> usize {
        this.ref_counter().strong_count()
    }

    pub fn downgrade(this: &Self) -> WeakRef<T> {
        WeakRef::from(this)
    }

    /// Exclusive access when this is the only handle and no weak reference
    /// was ever taken.
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        let counter = this.ref_counter();
        if counter.strong_count() == 1 && !counter.has_weak_ref() {
            // SAFETY: unique owner, and no weak indirection exists through
            // which another strong handle could appear.
            Some(unsafe { this.ptr.as_mut() })
        } else {
            None
        }
    }
}

/// Final-release path: detach weak holders, run the deletion hook, free.
///
/// # Safety
/// The count of `ptr` must have just reached zero on this thread.
unsafe fn destroy<T: RefCounted>(ptr: NonNull<T>) {
    let obj = ptr.as_ref();
    obj.ref_counter().detach_weak();
    obj.on_delete();
    drop(Box::from_raw(ptr.as_ptr()));
}

impl<T: RefCounted> Clone for SharedPtr<T> {
    fn clone(&self) -> Self {
        self.ref_counter().add_ref();
        Self {
            ptr: self.ptr,
            _owns: PhantomData,
        }
    }
}

impl<T: RefCounted> Drop for SharedPtr<T> {
    fn drop(&mut self) {
        if self.ref_counter().release() {
            // SAFETY: we released the last strong reference.
            unsafe { destroy(self.ptr) };
        }
    }
}

impl<T: RefCounted> Deref for SharedPtr<T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: our increment keeps the object alive.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: RefCounted> AsRef<T> for SharedPtr<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: RefCounted + fmt::Debug> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: RefCounted + fmt::Display> fmt::Display for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl<T: RefCounted> fmt::Pointer for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.ptr, f)
    }
}

/// Weak handle. Owns one increment of the object's indirection, never of
/// the object itself. Upgrade with [`WeakRef::lock`].
pub struct WeakRef<T: RefCounted> {
    indirection: Option<NonNull<WeakReference>>,
    _marker: PhantomData<*const T>,
}

// SAFETY: the indirection is atomically counted and `T: Send + Sync`.
unsafe impl<T: RefCounted> Send for WeakRef<T> {}
unsafe impl<T: RefCounted> Sync for WeakRef<T> {}

impl<T: RefCounted> WeakRef<T> {
    /// An empty weak reference; `lock` always fails.
    pub const fn new() -> Self {
        Self {
            indirection: None,
            _marker: PhantomData,
        }
    }

    /// Try to obtain a strong handle. Fails once the object's count has
    /// reached zero, even if it has not been freed yet.
    pub fn lock(&self) -> Option<SharedPtr<T>> {
        // SAFETY: our reference keeps the indirection allocated.
        let weak = unsafe { self.indirection?.as_ref() };
        weak.pin();
        let target = weak.target() as *mut T;
        // SAFETY: while pinned, a non-null target has not been freed; the
        // deleting thread waits for pins after nulling the target.
        let acquired = !target.is_null() && unsafe { (*target).ref_counter().safe_add_ref() };
        weak.unpin();
        if acquired {
            // SAFETY: safe_add_ref gave us an increment to adopt.
            Some(unsafe { SharedPtr::from_raw(target) })
        } else {
            None
        }
    }

    /// True when empty or the object is gone.
    pub fn is_expired(&self) -> bool {
        match self.indirection {
            // SAFETY: our reference keeps the indirection allocated.
            Some(w) => unsafe { w.as_ref() }.is_detached(),
            None => true,
        }
    }

    /// Same indirection, i.e. weak references to the same object.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.indirection == b.indirection
    }
}

impl<T: RefCounted> From<&SharedPtr<T>> for WeakRef<T> {
    fn from(strong: &SharedPtr<T>) -> Self {
        let w = strong
            .ref_counter()
            .weak_ref(strong.ptr.as_ptr() as *mut ());
        // SAFETY: the strong handle keeps the object, and with it the
        // object's reference to the indirection, alive.
        unsafe { w.as_ref() }.add_ref();
        Self {
            indirection: Some(w),
            _marker: PhantomData,
        }
    }
}

impl<T: RefCounted> Clone for WeakRef<T> {
    fn clone(&self) -> Self {
        if let Some(w) = self.indirection {
            // SAFETY: our reference keeps the indirection allocated.
            unsafe { w.as_ref() }.add_ref();
        }
        Self {
            indirection: self.indirection,
            _marker: PhantomData,
        }
    }
}

impl<T: RefCounted> Drop for WeakRef<T> {
    fn drop(&mut self) {
        if let Some(w) = self.indirection.take() {
            // SAFETY: we own one reference.
            unsafe { WeakReference::release(w) };
        }
    }
}

impl<T: RefCounted> Default for WeakRef<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RefCounted> fmt::Debug for WeakRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(WeakRef)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::Atomic;
    use crate::RefCounter;
    use std::sync::Arc;

    struct Probe {
        refs: RefCounter,
        value: u32,
        deletes: Arc<Atomic<usize>>,
    }
    crate::impl_ref_counted!(Probe, refs);

    fn probe(value: u32) -> (SharedPtr<Probe>, Arc<Atomic<usize>>) {
        let deletes = Arc::new(Atomic::<usize>::new(0));
        let p = SharedPtr::new(Probe {
            refs: RefCounter::new(),
            value,
            deletes: deletes.clone(),
        });
        (p, deletes)
    }

    struct Hooked {
        refs: RefCounter,
        hook_saw_weak: Arc<Atomic<bool>>,
    }
    unsafe impl RefCounted for Hooked {
        fn ref_counter(&self) -> &RefCounter {
            &self.refs
        }
        fn on_delete(&self) {
            self.hook_saw_weak.store(self.refs.has_weak_ref());
        }
    }

    impl Drop for Probe {
        fn drop(&mut self) {
            self.deletes.fetch_add(1);
        }
    }

    /// Invariant: clones share one object; it is freed exactly once, when
    /// the last strong handle drops.
    #[test]
    fn last_release_frees_once() {
        let (a, deletes) = probe(7);
        let b = a.clone();
        assert!(SharedPtr::ptr_eq(&a, &b));
        assert_eq!(SharedPtr::strong_count(&a), 2);
        drop(a);
        assert_eq!(deletes.load(), 0);
        assert_eq!(b.value, 7);
        drop(b);
        assert_eq!(deletes.load(), 1);
    }

    /// Invariant: lock succeeds while a strong handle exists and fails
    /// forever after the object is gone.
    #[test]
    fn lock_follows_liveness() {
        let (a, deletes) = probe(1);
        let w = SharedPtr::downgrade(&a);
        assert!(!w.is_expired());
        let b = w.lock().expect("object alive");
        assert_eq!(SharedPtr::strong_count(&a), 2);
        drop(b);
        drop(a);
        assert_eq!(deletes.load(), 1);
        assert!(w.is_expired());
        assert!(w.lock().is_none());
        let w2 = w.clone();
        assert!(WeakRef::ptr_eq(&w, &w2));
        assert!(w2.lock().is_none());
    }

    #[test]
    fn empty_weak_never_locks() {
        let w: WeakRef<Probe> = WeakRef::new();
        assert!(w.is_expired());
        assert!(w.lock().is_none());
        let _ = w.clone();
    }

    /// Invariant: the deletion hook runs after the weak indirection is
    /// detached.
    #[test]
    fn on_delete_runs_after_weak_detach() {
        let saw = Arc::new(Atomic::<bool>::new(true));
        let p = SharedPtr::new(Hooked {
            refs: RefCounter::new(),
            hook_saw_weak: saw.clone(),
        });
        let w = SharedPtr::downgrade(&p);
        drop(p);
        assert!(!saw.load());
        assert!(w.is_expired());
    }

    #[test]
    fn raw_round_trip_keeps_count() {
        let (a, deletes) = probe(3);
        let raw = SharedPtr::into_raw(a);
        let back = unsafe { SharedPtr::from_raw(raw) };
        assert_eq!(SharedPtr::strong_count(&back), 1);
        let again = unsafe { SharedPtr::from_ref(&*back) };
        assert_eq!(SharedPtr::strong_count(&again), 2);
        drop(back);
        drop(again);
        assert_eq!(deletes.load(), 1);
    }

    #[test]
    fn get_mut_requires_unique_strong_and_no_weak() {
        let (mut a, _d) = probe(1);
        SharedPtr::get_mut(&mut a).expect("unique").value = 9;
        assert_eq!(a.value, 9);
        let b = a.clone();
        assert!(SharedPtr::get_mut(&mut a).is_none());
        drop(b);
        let _w = SharedPtr::downgrade(&a);
        assert!(SharedPtr::get_mut(&mut a).is_none());
    }

    /// Invariant: constructing from an already-owned object is rejected.
    #[cfg(debug_assertions)]
    #[test]
    fn new_rejects_owned_counter() {
        let res = std::panic::catch_unwind(|| {
            let refs = RefCounter::new();
            refs.add_ref();
            let deletes = Arc::new(Atomic::<usize>::new(0));
            let probe = Probe { refs, value: 0, deletes };
            let _p = SharedPtr::new(probe);
        });
        assert!(res.is_err());
    }
}
