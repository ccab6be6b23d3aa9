//! `HashMap<K, V>`: separate-chaining hash map that iterates in insertion
//! order.
//!
//! Every entry lives in one arena-backed [`List`], which gives the
//! iteration order, and in one bucket chain threaded through the entries'
//! `down` links. Buckets are a power of two, at least 4, allocated on the
//! first insert. When `len` exceeds the bucket count the table doubles and
//! the chains are rebuilt by walking the insertion-order list, so
//! rehashing never reorders iteration and never calls back into `K`.

use crate::contract::check;
use crate::hash::MakeHash;
use crate::list::{self, Cursor, Link, List};
use core::borrow::Borrow;
use core::fmt;
use slotmap::DefaultKey;

const MIN_BUCKETS: usize = 4;

struct Entry<K, V> {
    key: K,
    value: V,
    hash: u32,
    down: Option<DefaultKey>,
}

/// Insertion-ordered hash map keyed by [`MakeHash`].
pub struct HashMap<K, V> {
    order: List<Entry<K, V>>,
    buckets: Vec<Option<DefaultKey>>,
}

#[cold]
#[track_caller]
fn empty_map() -> ! {
    panic!("element access on an empty map")
}

impl<K, V> HashMap<K, V> {
    pub fn new() -> Self {
        Self {
            order: List::new(),
            buckets: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Current number of buckets; 0 before the first insert.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Remove every entry. The bucket table is kept.
    pub fn clear(&mut self) {
        self.order.clear();
        self.buckets.iter_mut().for_each(|b| *b = None);
    }

    #[inline]
    fn bucket_index(&self, hash: u32) -> usize {
        hash as usize & (self.buckets.len() - 1)
    }

    /// Append an entry for a key known to be absent.
    fn insert_unique(&mut self, key: K, value: V, hash: u32) -> DefaultKey {
        if self.buckets.is_empty() {
            self.buckets = vec![None; MIN_BUCKETS];
        }
        let index = self.bucket_index(hash);
        let down = self.buckets[index];
        let k = self.order.link_before(
            Link::Sentinel,
            Entry {
                key,
                value,
                hash,
                down,
            },
        );
        self.buckets[index] = Some(k);
        if self.order.len() > self.buckets.len() {
            self.rehash(self.buckets.len() * 2);
        }
        k
    }

    fn rehash(&mut self, bucket_count: usize) {
        tracing::trace!(
            from = self.buckets.len(),
            to = bucket_count,
            len = self.len(),
            "hash map rehash"
        );
        self.buckets.clear();
        self.buckets.resize(bucket_count, None);
        let mask = bucket_count - 1;
        let mut at = self.order.first_link();
        while let Link::Node(k) = at {
            let entry = self.order.node_mut(k);
            let index = entry.hash as usize & mask;
            entry.down = self.buckets[index];
            self.buckets[index] = Some(k);
            at = self.order.next_link(k);
        }
    }

    /// Bucket predecessor of `key`, found by scanning its chain.
    fn bucket_prev(&self, index: usize, key: DefaultKey) -> Option<DefaultKey> {
        let mut prev = None;
        let mut at = self.buckets[index];
        while let Some(k) = at {
            if k == key {
                return prev;
            }
            prev = Some(k);
            at = self.order.node(k).down;
        }
        None
    }

    /// Unlink `key` from its bucket chain and the order list.
    fn detach(
        &mut self,
        key: DefaultKey,
        index: usize,
        prev: Option<DefaultKey>,
    ) -> Option<(Entry<K, V>, Cursor)> {
        let down = self.order.node(key).down;
        match prev {
            Some(p) => self.order.node_mut(p).down = down,
            None => self.buckets[index] = down,
        }
        let (entry, next) = self.order.unlink(key)?;
        Some((entry, self.order.cursor(next)))
    }

    /// Remove the entry at `at`, returning the next position in order.
    /// End is a no-op; a stale or foreign cursor is a contract violation.
    #[track_caller]
    pub fn erase_at(&mut self, at: Cursor) -> Cursor {
        let Some(key) = self.order.key_of(at) else {
            return Cursor::end();
        };
        let Some(hash) = self.order.value(key).map(|e| e.hash) else {
            check!(false, InvalidCursor, "erase through a stale cursor");
            return Cursor::end();
        };
        let index = self.bucket_index(hash);
        let prev = self.bucket_prev(index, key);
        match self.detach(key, index, prev) {
            Some((_, next)) => next,
            None => Cursor::end(),
        }
    }

    pub fn begin(&self) -> Cursor {
        self.order.begin()
    }

    pub fn end(&self) -> Cursor {
        Cursor::end()
    }

    /// Next position in insertion order.
    #[track_caller]
    pub fn next(&self, at: Cursor) -> Cursor {
        self.order.next(at)
    }

    #[track_caller]
    pub fn key_at(&self, at: Cursor) -> Option<&K> {
        self.order.get(at).map(|e| &e.key)
    }

    #[track_caller]
    pub fn value_at(&self, at: Cursor) -> Option<&V> {
        self.order.get(at).map(|e| &e.value)
    }

    #[track_caller]
    pub fn value_at_mut(&mut self, at: Cursor) -> Option<&mut V> {
        self.order.get_mut(at).map(|e| &mut e.value)
    }

    /// Oldest key.
    #[track_caller]
    pub fn front_key(&self) -> &K {
        check!(!self.is_empty(), EmptyContainer, "front of empty map");
        self.key_at(self.begin()).unwrap_or_else(|| empty_map())
    }

    /// Newest key.
    #[track_caller]
    pub fn back_key(&self) -> &K {
        check!(!self.is_empty(), EmptyContainer, "back of empty map");
        self.key_at(self.order.cursor(self.order.last_link()))
            .unwrap_or_else(|| empty_map())
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.order.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.order.iter_mut(),
        }
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator + '_ {
        self.order.iter().map(|e| &e.key)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator + '_ {
        self.order.iter().map(|e| &e.value)
    }

    pub fn values_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut V> + '_ {
        self.order.iter_mut().map(|e| &mut e.value)
    }
}

impl<K: MakeHash + Eq, V> HashMap<K, V> {
    /// Locate `q` and its bucket predecessor.
    fn find_slot<Q>(&self, q: &Q, hash: u32) -> Option<(DefaultKey, Option<DefaultKey>)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        if self.buckets.is_empty() {
            return None;
        }
        let mut prev = None;
        let mut at = self.buckets[self.bucket_index(hash)];
        while let Some(k) = at {
            let entry = self.order.node(k);
            if entry.hash == hash && entry.key.borrow() == q {
                return Some((k, prev));
            }
            prev = Some(k);
            at = entry.down;
        }
        None
    }

    pub fn find<Q>(&self, q: &Q) -> Cursor
    where
        K: Borrow<Q>,
        Q: ?Sized + MakeHash + Eq,
    {
        match self.find_slot(q, q.make_hash()) {
            Some((k, _)) => self.order.cursor(Link::Node(k)),
            None => Cursor::end(),
        }
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + MakeHash + Eq,
    {
        let (k, _) = self.find_slot(q, q.make_hash())?;
        Some(&self.order.node(k).value)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + MakeHash + Eq,
    {
        let (k, _) = self.find_slot(q, q.make_hash())?;
        Some(&mut self.order.node_mut(k).value)
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + MakeHash + Eq,
    {
        self.find_slot(q, q.make_hash()).is_some()
    }

    /// Insert or assign. An existing key keeps its position and its
    /// original key value; only the mapped value is replaced.
    pub fn insert(&mut self, key: K, value: V) -> Cursor {
        let hash = key.make_hash();
        match self.find_slot(&key, hash) {
            Some((k, _)) => {
                self.order.node_mut(k).value = value;
                self.order.cursor(Link::Node(k))
            }
            None => {
                let k = self.insert_unique(key, value, hash);
                self.order.cursor(Link::Node(k))
            }
        }
    }

    /// Value for `key`, inserting `make()` at the back if absent.
    pub fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> &mut V {
        let hash = key.make_hash();
        let k = match self.find_slot(&key, hash) {
            Some((k, _)) => k,
            None => self.insert_unique(key, make(), hash),
        };
        &mut self.order.node_mut(k).value
    }

    /// Erase `q`, returning the position that followed it, or end.
    pub fn erase<Q>(&mut self, q: &Q) -> Cursor
    where
        K: Borrow<Q>,
        Q: ?Sized + MakeHash + Eq,
    {
        let hash = q.make_hash();
        match self.find_slot(q, hash) {
            Some((k, prev)) => {
                let index = self.bucket_index(hash);
                match self.detach(k, index, prev) {
                    Some((_, next)) => next,
                    None => Cursor::end(),
                }
            }
            None => Cursor::end(),
        }
    }

    /// Remove `q` and hand back its key and value.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + MakeHash + Eq,
    {
        let hash = q.make_hash();
        let (k, prev) = self.find_slot(q, hash)?;
        let index = self.bucket_index(hash);
        self.detach(k, index, prev).map(|(e, _)| (e.key, e.value))
    }
}

impl<K: MakeHash + Eq, V: Default> HashMap<K, V> {
    /// Value for `key`, inserting `V::default()` at the back if absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V {
        self.get_or_insert_with(key, V::default)
    }
}

impl<K, V> Default for HashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone> Clone for HashMap<K, V> {
    /// Rebuilds the chains from the stored hashes; keys are not rehashed.
    fn clone(&self) -> Self {
        let mut out = Self::new();
        for e in self.order.iter() {
            out.insert_unique(e.key.clone(), e.value.clone(), e.hash);
        }
        out
    }
}

impl<K: MakeHash + Eq, V: PartialEq> PartialEq for HashMap<K, V> {
    /// Same key set with equal values; order is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: MakeHash + Eq, V: Eq> Eq for HashMap<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for HashMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: MakeHash + Eq, V> Extend<(K, V)> for HashMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: MakeHash + Eq, V> FromIterator<(K, V)> for HashMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut m = Self::new();
        m.extend(iter);
        m
    }
}

/// Iterator over `(&K, &V)` in insertion order.
pub struct Iter<'a, K, V> {
    inner: list::Iter<'a, Entry<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|e| (&e.key, &e.value))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V> DoubleEndedIterator for Iter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|e| (&e.key, &e.value))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// Iterator over `(&K, &mut V)` in insertion order.
pub struct IterMut<'a, K, V> {
    inner: list::IterMut<'a, Entry<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|e| (&e.key, &mut e.value))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V> DoubleEndedIterator for IterMut<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|e| (&e.key, &mut e.value))
    }
}

/// Owning iterator over `(K, V)` in insertion order.
pub struct IntoIter<K, V> {
    inner: list::IntoIter<Entry<K, V>>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);
    fn next(&mut self) -> Option<(K, V)> {
        self.inner.next().map(|e| (e.key, e.value))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for IntoIter<K, V> {
    fn next_back(&mut self) -> Option<(K, V)> {
        self.inner.next_back().map(|e| (e.key, e.value))
    }
}

impl<K, V> IntoIterator for HashMap<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;
    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter {
            inner: self.order.into_iter(),
        }
    }
}

impl<'a, K, V> IntoIterator for &'a HashMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V> IntoIterator for &'a mut HashMap<K, V> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;
    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Constant hash: every key lands in one chain.
    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Collide(u32);
    impl MakeHash for Collide {
        fn make_hash(&self) -> u32 {
            7
        }
    }

    /// Invariant: buckets appear on first insert, stay a power of two and
    /// never drop below len.
    #[test]
    fn bucket_growth() {
        let mut m = HashMap::new();
        assert_eq!(m.bucket_count(), 0);
        m.insert(1u32, ());
        assert_eq!(m.bucket_count(), 4);
        for i in 2..=4u32 {
            m.insert(i, ());
        }
        assert_eq!(m.bucket_count(), 4);
        m.insert(5, ());
        assert_eq!(m.bucket_count(), 8);
        for i in 6..=100u32 {
            m.insert(i, ());
            assert!(m.bucket_count().is_power_of_two());
            assert!(m.bucket_count() >= m.len());
        }
    }

    /// Invariant: iteration follows first insertion, across rehashes and
    /// reassignments.
    #[test]
    fn insertion_order_is_kept() {
        let mut m = HashMap::new();
        for k in [5u32, 1, 9, 3, 7, 2, 8] {
            m.insert(k, k * 10);
        }
        m.insert(9, 0);
        let keys: Vec<u32> = m.keys().copied().collect();
        assert_eq!(keys, vec![5, 1, 9, 3, 7, 2, 8]);
        assert_eq!(m.get(&9), Some(&0));
        assert_eq!((*m.front_key(), *m.back_key()), (5, 8));
    }

    #[test]
    fn erase_returns_next_in_order() {
        let mut m: HashMap<u32, &str> = [(1, "a"), (2, "b"), (3, "c")].into_iter().collect();
        let next = m.erase(&2);
        assert_eq!(m.key_at(next), Some(&3));
        assert!(m.erase(&3).is_end());
        assert!(m.erase(&42).is_end());
        assert_eq!(m.len(), 1);
    }

    /// Invariant: erasing inside a shared chain relinks the survivors.
    #[test]
    fn colliding_chain_erase() {
        let mut m = HashMap::new();
        for i in 0..6 {
            m.insert(Collide(i), i);
        }
        // Chain head is the newest entry; erase head, middle and tail.
        m.erase(&Collide(5));
        let mid = m.find(&Collide(2));
        m.erase_at(mid);
        m.erase(&Collide(0));
        for i in [1, 3, 4] {
            assert_eq!(m.get(&Collide(i)), Some(&i));
        }
        for i in [0, 2, 5] {
            assert!(!m.contains(&Collide(i)));
        }
        assert_eq!(m.remove(&Collide(3)), Some((Collide(3), 3)));
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn index_like_access_inserts_default() {
        let mut m: HashMap<String, u32> = HashMap::new();
        *m.get_or_insert_default("a".to_string()) += 2;
        *m.get_or_insert_default("a".to_string()) += 3;
        assert_eq!(m.get("a"), Some(&5));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn clear_keeps_buckets() {
        let mut m: HashMap<u32, u32> = (0..20).map(|i| (i, i)).collect();
        let buckets = m.bucket_count();
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.bucket_count(), buckets);
        assert!(m.get(&3).is_none());
        m.insert(3, 4);
        assert_eq!(m.get(&3), Some(&4));
    }

    #[test]
    fn clone_and_cursor_walk() {
        let m: HashMap<u32, u32> = (0..10).map(|i| (i, i * i)).collect();
        let c = m.clone();
        assert_eq!(m, c);
        let mut at = c.begin();
        let mut seen = vec![];
        while !at.is_end() {
            seen.push(*c.value_at(at).unwrap());
            at = c.next(at);
        }
        assert_eq!(seen, (0..10).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn iter_mut_and_into_iter() {
        let mut m: HashMap<u32, u32> = (0..4).map(|i| (i, i)).collect();
        for (_, v) in m.iter_mut() {
            *v += 100;
        }
        let c = m.find(&2);
        *m.value_at_mut(c).unwrap() = 0;
        let all: Vec<(u32, u32)> = m.into_iter().collect();
        assert_eq!(all, vec![(0, 100), (1, 101), (2, 0), (3, 103)]);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn stale_cursor_erase_is_a_contract_violation() {
        use std::panic::AssertUnwindSafe;
        let mut m: HashMap<u32, u32> = HashMap::new();
        let c = m.insert(1, 1);
        m.erase_at(c);
        let res = std::panic::catch_unwind(AssertUnwindSafe(|| {
            m.erase_at(c);
        }));
        assert!(res.is_err());
    }

    /// Invariant: a cursor from another map never reaches this map's
    /// entries, even when both arenas hold a node under the same key.
    #[cfg(debug_assertions)]
    #[test]
    fn foreign_cursor_is_a_contract_violation() {
        use std::panic::AssertUnwindSafe;
        let mut m1: HashMap<u32, u32> = HashMap::new();
        let mut m2: HashMap<u32, u32> = HashMap::new();
        let c1 = m1.insert(1, 1);
        m2.insert(2, 2);
        let res = std::panic::catch_unwind(AssertUnwindSafe(|| {
            m2.erase_at(c1);
        }));
        assert!(res.is_err());
        let res = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = m2.key_at(c1);
        }));
        assert!(res.is_err());
        assert_eq!(m2.len(), 1);
        assert_eq!(m1.key_at(c1), Some(&1));
    }
}
