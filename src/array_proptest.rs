#![cfg(test)]

// Property tests for Array kept inside the crate so they can check the
// growth policy against the real capacity.

use crate::array::{grow_to, Array};
use proptest::prelude::*;

// Index arguments are raw so shrinking moves toward small positions; they
// are reduced against the current length when applied.
#[derive(Clone, Debug)]
enum Op {
    Push(i32),
    Pop,
    Insert(usize, i32),
    InsertSlice(usize, Vec<i32>),
    Erase(usize, usize),
    FastErase(usize),
    Resize(usize, i32),
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        6 => any::<i32>().prop_map(Op::Push),
        2 => Just(Op::Pop),
        3 => (0..64usize, any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
        2 => (0..64usize, proptest::collection::vec(any::<i32>(), 0..12)).prop_map(|(i, s)| Op::InsertSlice(i, s)),
        2 => (0..64usize, 0..6usize).prop_map(|(i, n)| Op::Erase(i, n)),
        2 => (0..64usize).prop_map(Op::FastErase),
        1 => (0..48usize, any::<i32>()).prop_map(|(n, v)| Op::Resize(n, v)),
    ];
    proptest::collection::vec(op, 1..120)
}

fn sorted(xs: &[i32]) -> Vec<i32> {
    let mut v = xs.to_vec();
    v.sort_unstable();
    v
}

// Capacity a single operation should leave behind: unchanged unless the
// new length exceeds it, in which case the growth policy decides.
fn expected_cap(cap: usize, new_len: usize) -> usize {
    if new_len > cap {
        grow_to(cap, new_len)
    } else {
        cap
    }
}

fn run(ops: Vec<Op>) -> Result<(), TestCaseError> {
    let mut sut: Array<i32> = Array::new();
    let mut model: Vec<i32> = Vec::new();
    let mut cap = 0usize;
    // Once fast_erase reorders, only the multiset is comparable.
    let mut ordered = true;

    for op in ops {
        match op {
            Op::Push(v) => {
                sut.push(v);
                model.push(v);
            }
            Op::Pop => {
                prop_assert_eq!(sut.pop().is_some(), model.pop().is_some());
            }
            Op::Insert(i, v) => {
                let at = sut.insert(i, v);
                let pos = i.min(model.len());
                model.insert(pos, v);
                prop_assert_eq!(at, pos);
                prop_assert_eq!(sut.get(at), Some(&v));
            }
            Op::InsertSlice(i, src) => {
                let at = sut.insert_slice(i, &src);
                let pos = i.min(model.len());
                model.splice(pos..pos, src.iter().copied());
                prop_assert_eq!(at, pos);
                if ordered {
                    prop_assert_eq!(&sut.as_slice()[pos..pos + src.len()], &src[..]);
                }
            }
            Op::Erase(i, n) => {
                let next = sut.erase(i, n);
                let start = i.min(model.len());
                let count = n.min(model.len() - start);
                model.drain(start..start + count);
                if count == 0 {
                    prop_assert_eq!(next, model.len(), "nothing removed reports len");
                } else {
                    prop_assert_eq!(next, start);
                }
            }
            Op::FastErase(i) => {
                let at = sut.fast_erase(i);
                if i < model.len() {
                    model.swap_remove(i);
                    prop_assert_eq!(at, i);
                } else {
                    prop_assert_eq!(at, model.len());
                }
                ordered = false;
            }
            Op::Resize(n, v) => {
                sut.resize_with_value(n, v);
                model.resize(n, v);
            }
        }

        // Post-conditions after each op
        // 1) Length parity and contents.
        prop_assert_eq!(sut.len(), model.len());
        if ordered {
            prop_assert_eq!(sut.as_slice(), &model[..]);
        } else {
            prop_assert_eq!(sorted(sut.as_slice()), sorted(&model));
        }
        // 2) Capacity follows the growth policy and never shrinks.
        cap = expected_cap(cap, sut.len());
        prop_assert_eq!(sut.capacity(), cap);
        prop_assert!(sut.capacity() >= sut.len());
    }
    Ok(())
}

// Property: state-machine equivalence against Vec.
// - positional ops clamp like the documented API and return the same index,
// - capacity only moves when the length outgrows it, and then to grow_to,
// - fast_erase keeps the same elements, in some order.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(ops in arb_ops()) {
        run(ops)?;
    }
}

// Property: push then erase at any valid index equals the Vec result, and
// the erase reports the slot that now holds the successor.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_push_then_erase(
        (base, i) in proptest::collection::vec(any::<i32>(), 0..40)
            .prop_flat_map(|base| { let n = base.len() + 1; (Just(base), 0..n) }),
        x in any::<i32>(),
    ) {
        let mut sut: Array<i32> = base.iter().copied().collect();
        let mut model = base.clone();
        sut.push(x);
        model.push(x);
        let next = sut.erase(i, 1);
        model.remove(i);
        prop_assert_eq!(next, i);
        prop_assert_eq!(sut.as_slice(), &model[..]);
        prop_assert_eq!(sut.get(i), model.get(i));
    }
}
