#![cfg(test)]

// Property tests for HashMap kept inside the crate so they can check the
// bucket table directly.

use crate::hash::MakeHash;
use crate::hash_map::HashMap;
use proptest::prelude::*;
use std::borrow::Borrow;
use std::fmt;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}
impl MakeHash for Key {
    fn make_hash(&self) -> u32 {
        self.0.make_hash()
    }
}

// Every key lands in the same chain; lookups go through the Key itself.
#[derive(Clone, Eq, PartialEq, Debug)]
struct Collide(String);
impl MakeHash for Collide {
    fn make_hash(&self) -> u32 {
        7
    }
}

trait PoolKey: MakeHash + Eq + Clone + fmt::Debug {
    fn make(s: &str) -> Self;
    fn name(&self) -> &str;
}
impl PoolKey for Key {
    fn make(s: &str) -> Self {
        Key(s.to_string())
    }
    fn name(&self) -> &str {
        &self.0
    }
}
impl PoolKey for Collide {
    fn make(s: &str) -> Self {
        Collide(s.to_string())
    }
    fn name(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations so shrinking moves toward earlier keys.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    GetOrDefault(usize, i32),
    Erase(usize),
    EraseFirst,
    Remove(usize),
    Find(usize),
    Mutate(usize, i32),
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=10).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::GetOrDefault(i, d)),
            2 => idx.clone().prop_map(Op::Erase),
            1 => Just(Op::EraseFirst),
            2 => idx.clone().prop_map(Op::Remove),
            2 => idx.clone().prop_map(Op::Find),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            1 => Just(Op::Clear),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Oracle: hashbrown for membership and values, a Vec for first-insertion
// order of the keys still present.
struct Model {
    values: hashbrown::HashMap<String, i32>,
    order: Vec<String>,
}

impl Model {
    fn new() -> Self {
        Self {
            values: hashbrown::HashMap::new(),
            order: Vec::new(),
        }
    }

    fn insert(&mut self, k: &str, v: i32) {
        if self.values.insert(k.to_string(), v).is_none() {
            self.order.push(k.to_string());
        }
    }

    fn remove(&mut self, k: &str) -> Option<i32> {
        let v = self.values.remove(k)?;
        self.order.retain(|o| o != k);
        Some(v)
    }
}

fn run<K: PoolKey>(pool: &[String], ops: Vec<Op>) -> Result<(), TestCaseError> {
    let mk = K::make;
    let name = K::name;
    let mut sut: HashMap<K, i32> = HashMap::new();
    let mut model = Model::new();

    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let at = sut.insert(mk(&pool[i]), v);
                prop_assert_eq!(sut.value_at(at), Some(&v));
                model.insert(&pool[i], v);
            }
            Op::GetOrDefault(i, d) => {
                let slot = sut.get_or_insert_default(mk(&pool[i]));
                *slot = slot.wrapping_add(d);
                let expected = model.values.get(&pool[i]).copied().unwrap_or(0).wrapping_add(d);
                model.insert(&pool[i], expected);
                prop_assert_eq!(sut.get(&mk(&pool[i])), Some(&expected));
            }
            Op::Erase(i) => {
                let k = mk(&pool[i]);
                let position = model.order.iter().position(|o| *o == pool[i]);
                let next = sut.erase(&k);
                let expected_next = position.and_then(|p| model.order.get(p + 1)).cloned();
                prop_assert_eq!(sut.key_at(next).map(|k| name(k).to_string()), expected_next);
                model.remove(&pool[i]);
                prop_assert!(!sut.contains(&k));
            }
            Op::EraseFirst => {
                let next = sut.erase_at(sut.begin());
                if !model.order.is_empty() {
                    let first = model.order[0].clone();
                    model.remove(&first);
                }
                prop_assert_eq!(next, sut.begin(), "erasing the head yields the new head");
            }
            Op::Remove(i) => {
                let got = sut.remove(&mk(&pool[i])).map(|(k, v)| (name(&k).to_string(), v));
                let expected = model.remove(&pool[i]).map(|v| (pool[i].clone(), v));
                prop_assert_eq!(got, expected);
            }
            Op::Find(i) => {
                let k = mk(&pool[i]);
                let at = sut.find(&k);
                prop_assert_eq!(at.is_end(), !model.values.contains_key(&pool[i]));
                prop_assert_eq!(sut.value_at(at), model.values.get(&pool[i]));
            }
            Op::Mutate(i, d) => {
                if let Some(v) = sut.get_mut(&mk(&pool[i])) {
                    *v = v.wrapping_add(d);
                }
                if let Some(v) = model.values.get_mut(&pool[i]) {
                    *v = v.wrapping_add(d);
                }
            }
            Op::Clear => {
                let buckets = sut.bucket_count();
                sut.clear();
                prop_assert_eq!(sut.bucket_count(), buckets);
                model.values.clear();
                model.order.clear();
            }
        }

        // Post-conditions after each op
        // 1) Iteration is first-insertion order with the model's values.
        let got: Vec<(String, i32)> = sut.iter().map(|(k, v)| (name(k).to_string(), *v)).collect();
        let want: Vec<(String, i32)> = model.order.iter().map(|k| (k.clone(), model.values[k])).collect();
        prop_assert_eq!(got, want);
        // 2) Size parity
        prop_assert_eq!(sut.len(), model.values.len());
        prop_assert_eq!(sut.is_empty(), model.values.is_empty());
        // 3) Buckets: power of two, at least 4, never fewer than entries.
        let b = sut.bucket_count();
        if b != 0 {
            prop_assert!(b.is_power_of_two() && b >= 4 && b >= sut.len());
        }
    }
    Ok(())
}

// Property: state-machine equivalence against hashbrown plus an order log.
// - insert assigns in place and never moves an existing key,
// - erase returns the entry that followed in iteration order,
// - get_or_insert_default appends only for new keys,
// - clear keeps the bucket table.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run::<Key>(&pool, ops)?;
    }
}

// Property: same invariants with every key in one bucket chain, which
// stresses predecessor splicing and equality resolution.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run::<Collide>(&pool, ops)?;
    }
}

// Property: borrowed lookups agree with owned lookups.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_borrowed_lookup(keys in proptest::collection::vec("[a-c]{0,3}", 0..30)) {
        let mut sut: HashMap<Key, usize> = HashMap::new();
        for (i, k) in keys.iter().enumerate() {
            sut.insert(Key(k.clone()), i);
        }
        for k in &keys {
            prop_assert_eq!(sut.get(k.as_str()), sut.get(&Key(k.clone())));
            prop_assert!(sut.contains(k.as_str()));
        }
        let rebuilt = sut.clone();
        prop_assert!(rebuilt == sut);
        let a: Vec<_> = rebuilt.keys().cloned().collect();
        let b: Vec<_> = sut.keys().cloned().collect();
        prop_assert_eq!(a, b);
    }
}
