//! Contract violations and the process-wide fatal hook.
//!
//! Precondition failures (bad index, empty container, stale cursor, misuse
//! of a memory order) are programming errors. They are never returned as
//! values; every check funnels into [`report`], which hands a
//! [`ContractViolation`] to the installed hook. The default hook logs the
//! violation and panics.
//!
//! Checks are active in debug builds, or in any build with the
//! `contract-checks` feature. Otherwise they compile to nothing and only
//! Rust's own safety checks remain.

use core::fmt;
use core::panic::Location;
use parking_lot::RwLock;

/// True when contract checks are compiled in.
pub const CHECKS_ENABLED: bool = cfg!(any(debug_assertions, feature = "contract-checks"));

/// Category of a violated precondition.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ViolationKind {
    /// Generic assertion on an internal invariant.
    Assert,
    /// Index outside `[0, len)`.
    InvalidIndex,
    /// Element access on an empty container.
    EmptyContainer,
    /// Cursor that is stale or belongs to another container.
    InvalidCursor,
    /// Memory order that is not valid for the requested atomic operation.
    InvalidOrder,
    /// Object used in a state that forbids the operation.
    InvalidState,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationKind::Assert => "assertion failed",
            ViolationKind::InvalidIndex => "invalid index",
            ViolationKind::EmptyContainer => "empty container",
            ViolationKind::InvalidCursor => "invalid cursor",
            ViolationKind::InvalidOrder => "invalid memory order",
            ViolationKind::InvalidState => "invalid state",
        };
        f.write_str(s)
    }
}

/// A reported contract violation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} at {location}: `{condition}` {message}")]
pub struct ContractViolation {
    pub kind: ViolationKind,
    pub location: &'static Location<'static>,
    pub condition: &'static str,
    pub message: String,
}

/// Hook invoked for every violation. It may panic, abort, or return.
pub type Hook = fn(&ContractViolation);

static HOOK: RwLock<Hook> = parking_lot::const_rwlock(default_hook as Hook);

/// Logs the violation and panics.
pub fn default_hook(v: &ContractViolation) {
    tracing::error!(
        kind = %v.kind,
        location = %v.location,
        condition = v.condition,
        "{}",
        v.message
    );
    panic!("contract violation: {v}");
}

/// Install `hook`, returning the previously installed one.
pub fn set_hook(hook: Hook) -> Hook {
    core::mem::replace(&mut *HOOK.write(), hook)
}

/// Restore the default hook, returning the previously installed one.
pub fn take_hook() -> Hook {
    set_hook(default_hook)
}

/// Report a violation to the installed hook.
#[cold]
#[inline(never)]
#[track_caller]
pub fn report(kind: ViolationKind, condition: &'static str, message: String) {
    let v = ContractViolation {
        kind,
        location: Location::caller(),
        condition,
        message,
    };
    // Copy the hook out so it can call `set_hook` itself.
    let hook = *HOOK.read();
    hook(&v);
}

/// `check!(cond, kind, "fmt", args..)` reports `kind` when `cond` is false
/// and contract checks are enabled. Evaluates to `cond` so callers can
/// choose a fallback path.
macro_rules! check {
    ($cond:expr, $kind:ident) => {
        $crate::contract::check!($cond, $kind, "")
    };
    ($cond:expr, $kind:ident, $($msg:tt)+) => {{
        let ok: bool = $cond;
        if $crate::contract::CHECKS_ENABLED && !ok {
            $crate::contract::report(
                $crate::contract::ViolationKind::$kind,
                stringify!($cond),
                format!($($msg)+),
            );
        }
        ok
    }};
}
pub(crate) use check;
