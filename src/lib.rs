//! keel: foundation containers, a copy-on-write string and intrusive
//! atomic reference counting.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: the building blocks an engine needs before anything else can
//!   exist, each with an explicit, testable policy (growth, ordering,
//!   sharing) rather than whatever the standard library happens to do.
//! - Layers:
//!   - `contract`: the process-wide hook every precondition check reports
//!     to. Everything else depends on it.
//!   - `Atomic<T>` / `MemoryOrder`: typed atomics with the memory order as
//!     a runtime argument, validated per operation.
//!   - `RefCounter` / `SharedPtr<T>` / `WeakRef<T>`: intrusive strong
//!     count plus a lazily created weak indirection.
//!   - `Array<T>`: raw-buffer growable array with the `grow_to` policy.
//!   - `List<T>`: sentinel-ring list over a slotmap arena, addressed by
//!     `Cursor`.
//!   - `HashMap<K, V>`: separate chaining threaded through a `List`, so
//!     iteration is insertion order.
//!   - `CowString`: reference-counted byte buffer, unshared on write, with
//!     printf-style `format`, `glob_match` and `split`.
//!
//! Constraints
//! - Containers are single-writer: `&mut self` for every mutation, no
//!   interior locking. Only reference counts (objects, weak indirections,
//!   string buffers) are atomic.
//! - Precondition failures are never returned as values. They go to the
//!   contract hook, then the operation takes a safe fallback path.
//! - Recoverable outcomes use `Option`, `bool` or `Cursor::end()`.
//!   Formatting is the one fallible API with an error type.
//!
//! Cursor stability
//! - List and map cursors are generational slotmap keys. A cursor stays
//!   valid across unrelated insertions, erasures and map rehashes; once its
//!   element is gone it resolves to nothing and is reported if used for a
//!   structural operation.
//!
//! Weak upgrade vs. final release
//! - `WeakRef::lock` pins the indirection, reads the target and only then
//!   tries a non-resurrecting increment. The deleting thread clears the
//!   target and waits for pins to drain before the object is freed, so a
//!   probe never touches freed memory.
//!
//! Hashing
//! - `MakeHash` yields a `u32`. Entries store it, so rehashing and `Clone`
//!   never call back into `K`.
//!
//! Implementation note
//! - Raw-pointer code is confined to `array`, `cow_buffer`, `ref_counted`
//!   and `shared`. List and map structure uses safe indexing into the
//!   arena.

mod array;
mod array_proptest;
mod atomic;
pub mod contract;
mod cow_buffer;
mod cow_string;
mod format;
pub mod glob;
mod hash;
pub mod hash_map;
mod hash_map_proptest;
pub mod list;
mod ref_counted;
mod ref_counted_proptest;
mod shared;

// Public surface
pub use array::Array;
pub use atomic::{Atomic, AtomicBits, AtomicInteger, AtomicValue, MemoryOrder};
pub use contract::{ContractViolation, ViolationKind};
pub use cow_string::CowString;
pub use format::{FormatArg, FormatError, MAX_FIELD, MAX_SPEC};
pub use hash::{hash_bytes, hash_bytes_ignore_case, MakeHash};
pub use hash_map::HashMap;
pub use list::{Cursor, List};
pub use ref_counted::{RefCounted, RefCounter, WeakReference};
pub use shared::{SharedPtr, WeakRef};

#[cfg(feature = "bench_internal")]
#[doc(hidden)]
pub use array::grow_to;
