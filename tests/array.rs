// Array integration suite.
//
// Invariants exercised:
// - Growth: capacity follows grow_to exactly (empty jumps to the request,
//   otherwise +50% rounded up until large enough).
// - Order: insert/erase keep relative order; fast_erase only keeps the set.
// - Ownership: every constructed element is dropped exactly once, on
//   erase, truncate, clear or drop of the array.
// - Aliasing: pushing a copy of an existing element survives reallocation.
use keel::Array;
use std::cell::Cell;
use std::rc::Rc;

// Test: deterministic capacity sequence under repeated push.
// Verifies: 0 -> 1 -> 2 -> 3 -> 5 -> 8 -> 12 -> 18 -> 27.
#[test]
fn push_capacity_sequence() {
    let mut a: Array<u32> = Array::new();
    let mut seen = vec![a.capacity()];
    for i in 0..20 {
        a.push(i);
        if *seen.last().unwrap() != a.capacity() {
            seen.push(a.capacity());
        }
    }
    assert_eq!(seen, [0, 1, 2, 3, 5, 8, 12, 18, 27]);
    assert_eq!(a.len(), 20);
}

// Test: erase keeps order; insert at a position restores it.
// Verifies: Array(a).push(x).erase(i) leaves the rest in original order.
#[test]
fn push_then_erase_preserves_order() {
    let base: Array<i32> = (0..10).collect();
    for i in 0..=base.len() {
        let mut a = base.clone();
        a.push(99);
        let pos = a.insert(i, 42);
        assert_eq!(pos, i);
        let next = a.erase(i, 1);
        assert_eq!(next, i);
        a.pop();
        assert_eq!(a, base);
    }
}

// Test: fast_erase swaps the last element in.
// Verifies: same multiset, O(1) reorder.
#[test]
fn fast_erase_keeps_set() {
    let mut a: Array<i32> = Array::from([1, 2, 3, 4, 5]);
    a.fast_erase(1);
    assert_eq!(a.as_slice(), &[1, 5, 3, 4]);
    let mut sorted: Vec<_> = a.iter().copied().collect();
    sorted.sort();
    assert_eq!(sorted, [1, 3, 4, 5]);
}

// Test: push_from_within when the push reallocates.
// Verifies: the copied value is intact after the buffer moved.
#[test]
fn push_from_within_survives_realloc() {
    let mut a: Array<String> = Array::new();
    a.push("first".to_string());
    a.push("second".to_string());
    assert_eq!(a.len(), a.capacity());
    a.push_from_within(0);
    assert_eq!(a.as_slice(), &["first", "second", "first"]);
}

struct Tracked(Rc<Cell<usize>>);
impl Drop for Tracked {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}
impl Clone for Tracked {
    fn clone(&self) -> Self {
        Tracked(self.0.clone())
    }
}

// Test: every element is dropped exactly once across structural edits.
#[test]
fn drops_are_balanced() {
    let drops = Rc::new(Cell::new(0));
    {
        let mut a: Array<Tracked> = Array::new();
        for _ in 0..10 {
            a.push(Tracked(drops.clone()));
        }
        a.erase(2, 3);
        assert_eq!(drops.get(), 3);
        a.fast_erase(0);
        assert_eq!(drops.get(), 4);
        a.insert_slice(1, &[Tracked(drops.clone()), Tracked(drops.clone())]);
        // the two temporaries in the slice literal
        assert_eq!(drops.get(), 6);
        a.resize_with_value(3, Tracked(drops.clone()));
        assert_eq!(a.len(), 3);
        assert_eq!(drops.get(), 6 + 5 + 1);
    }
    // 3 remaining, 12 dropped so far
    assert_eq!(drops.get(), 15);
}

// Test: insert_slice on both paths yields the same contents.
#[test]
fn insert_slice_in_place_and_realloc_agree() {
    let mut tight: Array<u8> = Array::from([1, 2, 5, 6]);
    let mut roomy: Array<u8> = Array::with_capacity(16);
    roomy.extend_from_slice(&[1, 2, 5, 6]);
    tight.insert_slice(2, &[3, 4]);
    roomy.insert_slice(2, &[3, 4]);
    assert_eq!(tight, roomy);
    assert_eq!(roomy.capacity(), 16);
    assert_eq!(tight.as_slice(), &[1, 2, 3, 4, 5, 6]);
}

// Test: owned iteration drops the unconsumed tail.
#[test]
fn into_iter_partial_consumption() {
    let drops = Rc::new(Cell::new(0));
    let a: Array<Tracked> = (0..5).map(|_| Tracked(drops.clone())).collect();
    let mut it = a.into_iter();
    drop(it.next());
    drop(it.next_back());
    assert_eq!(drops.get(), 2);
    assert_eq!(it.len(), 3);
    drop(it);
    assert_eq!(drops.get(), 5);
}
