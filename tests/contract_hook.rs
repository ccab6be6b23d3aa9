// Contract hook integration suite.
//
// Runs in its own test binary: the hook is process-wide state.
//
// Invariants exercised:
// - A custom hook sees every violation, and when it returns the operation
//   takes its documented fallback instead of panicking.
// - A cursor from one list never addresses another list's nodes.
// - take_hook restores the default fail-fast hook.
#![cfg(debug_assertions)]

use keel::contract::{self, ContractViolation};
use keel::{Array, CowString, List, ViolationKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

static SEEN: AtomicUsize = AtomicUsize::new(0);
static KINDS: Mutex<Vec<ViolationKind>> = Mutex::new(Vec::new());

fn counting_hook(v: &ContractViolation) {
    SEEN.fetch_add(1, Ordering::SeqCst);
    KINDS.lock().unwrap().push(v.kind);
}

// Test: fallbacks under a non-panicking hook, then restore.
#[test]
fn custom_hook_sees_violations_and_fallbacks_apply() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    contract::set_hook(counting_hook);

    let s = CowString::from("abc");
    assert_eq!(s.at(10), 0, "out-of-range read yields NUL");

    let mut s2 = s.clone();
    s2.set(7, b'x');
    assert_eq!(s2, "abc", "out-of-range write is ignored");

    let mut a: Array<i32> = Array::new();
    a.push_from_within(5);
    assert!(a.is_empty(), "copy of a missing element is skipped");

    let mut l: List<i32> = [1, 2].into_iter().collect();
    let stale = l.begin();
    l.erase(stale);
    assert!(l.next(stale).is_end(), "stale cursor steps to end");

    let mut other: List<i32> = [9].into_iter().collect();
    let theirs = l.begin();
    assert!(other.erase(theirs).is_end(), "foreign cursor erases nothing");
    assert_eq!(other.len(), 1);
    assert_eq!(l.len(), 1);

    assert_eq!(SEEN.load(Ordering::SeqCst), 5);
    assert_eq!(
        *KINDS.lock().unwrap(),
        [
            ViolationKind::InvalidIndex,
            ViolationKind::InvalidIndex,
            ViolationKind::InvalidIndex,
            ViolationKind::InvalidCursor,
            ViolationKind::InvalidCursor,
        ]
    );

    let previous = contract::take_hook();
    assert_eq!(previous as usize, counting_hook as contract::Hook as usize);
    let res = std::panic::catch_unwind(|| {
        let s = CowString::from("abc");
        let _ = s.at(10);
    });
    assert!(res.is_err(), "default hook panics again");
}
