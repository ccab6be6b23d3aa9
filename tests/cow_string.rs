// CowString integration suite.
//
// Invariants exercised:
// - Copy-on-write: clones share one buffer until either side mutates;
//   the mutated side unshares and the other keeps the old contents.
// - Self-append: appending a string (or a range of itself) to itself
//   reads the source before the buffer is reallocated.
// - Buffers are atomically counted, so clones can cross threads.
// - Match, Format and Split behave as documented on the public API.
use keel::{cow_format, CowString, FormatError};
use std::thread;

// Test: mutation after clone.
// Verifies: the writer unshares; the reader still sees the old bytes.
#[test]
fn copy_on_write_isolates_clones() {
    let a = CowString::from("shared text");
    let mut b = a.clone();
    assert!(a.ptr_eq(&b));
    assert!(a.is_shared());

    b.set(0, b'S');
    b.append_str("!");
    assert!(!a.ptr_eq(&b));
    assert_eq!(a, "shared text");
    assert_eq!(b, "Shared text!");
    assert!(!a.is_shared());
    assert!(!b.is_shared());
}

// Test: x += x and append_from_within over the whole string.
#[test]
fn self_append_doubles() {
    let mut s = CowString::from("abc");
    let copy = s.clone();
    s += &copy;
    assert_eq!(s, "abcabc");
    drop(copy);

    let mut t = CowString::from("xyz");
    for _ in 0..4 {
        let len = t.len();
        t.append_from_within(0..len);
    }
    assert_eq!(t.len(), 48);
    assert!(t.as_bytes().chunks(3).all(|c| c == b"xyz"));
    assert_eq!(t.as_bytes_with_nul().last(), Some(&0));
}

// Test: glob matching from the public docs.
#[test]
fn match_examples() {
    assert!(CowString::glob_match(b"Notes.TXT", b"*.txt", true));
    assert!(!CowString::glob_match(b"Notes.TXT", b"*.txt", false));
    assert!(CowString::glob_match(b"beta", b"[a-z]*", false));
    assert!(!CowString::glob_match(b"Beta", b"[a-z]*", false));
    assert!(CowString::glob_match(b"Beta", b"[a-z]*", true));
    assert!(keel::glob::glob_match(b"file7.rs", b"file?.rs", false));
    assert!(!keel::glob::glob_match(b"", b"*", false));
}

// Test: printf-style formatting through the macro and the fallible API.
#[test]
fn format_examples() {
    assert_eq!(cow_format!("%d items", 3), "3 items");
    assert_eq!(cow_format!("[%5s|%-5s]", "ab", "cd"), "[   ab|cd   ]");
    assert_eq!(cow_format!("%08.3f", 3.14159), "0003.142");
    assert_eq!(cow_format!("%x/%X/%o", 255, 255, 8), "ff/FF/10");
    assert_eq!(cow_format!("100%%"), "100%");

    let name = CowString::from("keel");
    assert_eq!(cow_format!("<%s:%c>", &name, 'k'), "<keel:k>");

    let err = CowString::try_format("%d %d", &[1.into()]).unwrap_err();
    assert!(matches!(err, FormatError::MissingArgument { index: 1 }));
}

// Test: the lossy entry point keeps what was rendered and logs the rest.
#[test]
fn lossy_format_keeps_prefix() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    assert_eq!(cow_format!("ok %d then %Lf", 1, 2.0), "ok 1 then ");
}

// Test: splitting on a delimiter set; no set keeps the whole string.
#[test]
fn split_examples() {
    let words = CowString::split(b"  alpha beta\tgamma\n", Some(&b" \t\n"[..]));
    let words: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    assert_eq!(words, ["alpha", "beta", "gamma"]);

    let whole = CowString::split(b"a b", None);
    assert_eq!(whole.len(), 1);
    assert_eq!(whole[0], "a b");

    let fields = CowString::split(b"a;b;;c", Some(&b";"[..]));
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[2], "c");
}

// Test: compare and find with and without case folding.
#[test]
fn compare_and_find() {
    use std::cmp::Ordering;
    assert_eq!(CowString::compare(b"abc", b"abd", false), Ordering::Less);
    assert_eq!(CowString::compare(b"ABC", b"abc", true), Ordering::Equal);
    assert_eq!(CowString::compare(b"ab", b"abc", true), Ordering::Less);
    assert_eq!(CowString::find(b"Hello World", b"world", true), Some(6));
    assert_eq!(CowString::find(b"Hello World", b"world", false), None);
}

// Test: clones handed to threads.
// Verifies: concurrent reads and drops leave the original intact and
// exclusively owned once every thread has joined.
#[test]
fn clones_cross_threads() {
    let base = CowString::from("payload");
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let mine = base.clone();
            thread::spawn(move || {
                let mut local = mine.clone();
                local.push(b'0' + i as u8);
                assert_eq!(mine, "payload");
                local.len()
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), 8);
    }
    assert!(!base.is_shared());
    assert_eq!(base, "payload");
}
