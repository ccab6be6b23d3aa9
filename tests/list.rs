// List integration suite.
//
// Invariants exercised:
// - Ring: next(prev(c)) == c for every live cursor and for end.
// - Cursor stability: a cursor keeps addressing its element across
//   unrelated insertions and erasures, and resolves to nothing after its
//   own element is erased.
// - Equality: size, then elementwise in iteration order.
use keel::{Cursor, List};

fn collect(l: &List<i32>) -> Vec<i32> {
    l.iter().copied().collect()
}

// Test: ring links are consistent in both directions.
#[test]
fn ring_is_consistent() {
    let l: List<i32> = (1..=5).collect();
    let mut at = l.begin();
    loop {
        assert_eq!(l.next(l.prev(at)), at);
        if at.is_end() {
            break;
        }
        at = l.next(at);
    }
    assert_eq!(l.next(l.end()), l.begin(), "end wraps to the first element");
    assert_eq!(l.get(l.prev(l.end())), Some(&5));
}

// Test: cursors survive unrelated edits and go stale with their element.
#[test]
fn cursor_stability() {
    let mut l = List::new();
    let a = l.push(1);
    let b = l.push(2);
    let c = l.push(3);
    l.push_front(0);
    l.insert(c, 25);
    l.erase(a);
    assert_eq!(collect(&l), [0, 2, 25, 3]);
    assert_eq!(l.get(b), Some(&2));
    assert_eq!(l.get(c), Some(&3));
    assert_eq!(l.get(a), None);
    *l.get_mut(c).unwrap() = 30;
    assert_eq!(l.back(), &30);
}

// Test: walking with erase returns successors until end.
#[test]
fn erase_walk_empties() {
    let mut l: List<i32> = (0..4).collect();
    let mut at = l.begin();
    let mut seen = Vec::new();
    while !at.is_end() {
        seen.push(*l.get(at).unwrap());
        at = l.erase(at);
    }
    assert_eq!(seen, [0, 1, 2, 3]);
    assert!(l.is_empty());
    assert_eq!(l.erase(Cursor::end()), Cursor::end(), "erasing end is a no-op");
}

// Test: equality and clone follow iteration order.
#[test]
fn equality_is_ordered() {
    let a: List<i32> = [1, 2, 3].into_iter().collect();
    let b = a.clone();
    let c: List<i32> = [3, 2, 1].into_iter().collect();
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.iter().rev().copied().collect::<Vec<_>>(), [3, 2, 1]);
    assert_eq!(format!("{a:?}"), "[1, 2, 3]");
}

// Test: find/find_from visit duplicates in order.
#[test]
fn find_duplicates() {
    let l: List<i32> = [7, 1, 7, 2, 7].into_iter().collect();
    let mut hits = 0;
    let mut at = l.find(&7);
    while !at.is_end() {
        hits += 1;
        at = l.find_from(l.next(at), &7);
    }
    assert_eq!(hits, 3);
}

#[cfg(debug_assertions)]
#[test]
fn front_of_empty_is_a_contract_violation() {
    let l: List<i32> = List::new();
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = l.front();
    }));
    assert!(res.is_err());
}
