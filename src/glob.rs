//! Glob matching for [`CowString::glob_match`](crate::CowString::glob_match).
//!
//! Pattern syntax:
//! - `*` matches any run of bytes, including none,
//! - `?` matches exactly one byte,
//! - a space matches one or more spaces, and runs of spaces on both sides
//!   collapse,
//! - `[...]` matches one byte from a set; `a-z` is a range (bounds in
//!   either order),
//! - `\[`, `\]` and `\\` are escapes, inside a set or out.
//!
//! Backtracking keeps an explicit stack of `(subject, pattern)` resume
//! points, one per `*` on the current path, so memory is bounded by the
//! pattern rather than the subject. Each `*` tries the shortest expansion
//! first and grows by one byte per failed attempt.

use crate::array::Array;
use crate::cow_string::CowString;
use crate::hash::{lower, upper};

enum Step {
    /// Consumed one subject byte and one pattern position.
    Advance,
    /// Hit a `*`.
    Star,
    Matched,
    Failed,
}

#[inline]
fn is_set_escape(b: Option<u8>) -> bool {
    matches!(b, Some(b'[' | b']' | b'\\'))
}

#[inline]
fn eq(a: u8, b: u8, ignore_case: bool) -> bool {
    a == b || (ignore_case && lower(a) == lower(b))
}

#[inline]
fn in_range(lo: u8, hi: u8, c: u8) -> bool {
    (lo <= c && c <= hi) || (hi <= c && c <= lo)
}

/// Try a `[...]` set at `p[*pi]` (just past the `[`) against `c`. On a
/// match, leaves `*pi` on the closing `]` (or the last byte of an
/// unterminated set).
fn match_set(p: &[u8], pi: &mut usize, c: u8, ignore_case: bool) -> bool {
    loop {
        let Some(mut b) = p.get(*pi).copied() else {
            return false;
        };
        if b == b']' {
            return false;
        }
        if b == b'\\' && is_set_escape(p.get(*pi + 1).copied()) {
            *pi += 1;
            b = p[*pi];
        }
        if eq(b, c, ignore_case) {
            break;
        }
        if p.get(*pi + 1) == Some(&b'-') {
            let Some(&hi) = p.get(*pi + 2) else {
                return false;
            };
            let hit = if ignore_case {
                in_range(b, hi, lower(c)) || in_range(b, hi, upper(c))
            } else {
                in_range(b, hi, c)
            };
            if hit {
                break;
            }
            *pi += 2;
        }
        *pi += 1;
    }
    // Skip the rest of the set.
    while p.get(*pi) != Some(&b']') {
        if p[*pi] == b'\\' && is_set_escape(p.get(*pi + 1).copied()) {
            *pi += 1;
        }
        *pi += 1;
        if *pi >= p.len() {
            *pi = p.len() - 1;
            break;
        }
    }
    true
}

fn step(s: &[u8], p: &[u8], si: &mut usize, pi: &mut usize, ignore_case: bool) -> Step {
    let sc = s.get(*si).copied();
    let Some(pc) = p.get(*pi).copied() else {
        return if sc.is_none() { Step::Matched } else { Step::Failed };
    };
    if pc == b'*' {
        return Step::Star;
    }
    let Some(c) = sc else {
        return Step::Failed;
    };
    match pc {
        b'?' => Step::Advance,
        b' ' => {
            if c != b' ' {
                return Step::Failed;
            }
            while p.get(*pi + 1) == Some(&b' ') {
                *pi += 1;
            }
            while s.get(*si + 1) == Some(&b' ') {
                *si += 1;
            }
            Step::Advance
        }
        b'[' => {
            *pi += 1;
            if match_set(p, pi, c, ignore_case) {
                Step::Advance
            } else {
                Step::Failed
            }
        }
        _ => {
            let mut lit = pc;
            if lit == b'\\' && is_set_escape(p.get(*pi + 1).copied()) {
                *pi += 1;
                lit = p[*pi];
            }
            if eq(lit, c, ignore_case) {
                Step::Advance
            } else {
                Step::Failed
            }
        }
    }
}

/// True if all of `s` matches `pattern`. An empty subject or pattern never
/// matches.
pub fn glob_match(s: &[u8], pattern: &[u8], ignore_case: bool) -> bool {
    if s.is_empty() || pattern.is_empty() {
        return false;
    }
    let mut stars: Array<(usize, usize)> = Array::new();
    let (mut si, mut pi) = (0, 0);
    loop {
        match step(s, pattern, &mut si, &mut pi, ignore_case) {
            Step::Advance => {
                si += 1;
                pi += 1;
            }
            Step::Star => {
                pi += 1;
                if pi == pattern.len() {
                    return true;
                }
                stars.push((si, pi));
            }
            Step::Matched => return true,
            Step::Failed => loop {
                let Some(top) = stars.last_mut() else {
                    return false;
                };
                if top.0 >= s.len() {
                    stars.pop();
                    continue;
                }
                top.0 += 1;
                (si, pi) = *top;
                break;
            },
        }
    }
}

impl CowString {
    /// Glob-match `s` against `pattern`. See the [`glob`](crate::glob)
    /// module for the syntax.
    #[inline]
    pub fn glob_match(s: &[u8], pattern: &[u8], ignore_case: bool) -> bool {
        glob_match(s, pattern, ignore_case)
    }
}
