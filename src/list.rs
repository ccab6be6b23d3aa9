//! `List<T>`: doubly-linked list closed into a ring by a sentinel.
//!
//! Nodes live in a generational arena; links are arena keys or the
//! sentinel, whose own links are stored in the list. A [`Cursor`] names a
//! node or the end position, and carries the id of the list that issued
//! it. Cursors stay valid across unrelated insertions and erasures; a
//! cursor to an erased node is stale, a cursor from another list is
//! foreign, and using either is a contract violation rather than a silent
//! access to whatever node shares its arena key.

use crate::atomic::Atomic;
use crate::contract::check;
use core::fmt;
use core::iter::FusedIterator;
use slotmap::{DefaultKey, SecondaryMap, SlotMap};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) enum Link {
    Sentinel,
    Node(DefaultKey),
}

/// Source of list ids. 0 is reserved for the end cursor, which every list
/// accepts.
static NEXT_OWNER: Atomic<usize> = Atomic::<usize>::new(1);

/// Position in a [`List`] or [`HashMap`](crate::HashMap): a live element or
/// the end sentinel.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Cursor {
    link: Link,
    owner: usize,
}

impl Cursor {
    /// The past-the-end position.
    pub const fn end() -> Self {
        Cursor {
            link: Link::Sentinel,
            owner: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.link == Link::Sentinel
    }

    fn key(&self) -> Option<DefaultKey> {
        match self.link {
            Link::Sentinel => None,
            Link::Node(k) => Some(k),
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::end()
    }
}

#[derive(Copy, Clone, Debug)]
struct Links {
    prev: Link,
    next: Link,
}

const EMPTY: Links = Links {
    prev: Link::Sentinel,
    next: Link::Sentinel,
};

#[derive(Debug, Clone)]
struct Node<T> {
    value: T,
    links: Links,
}

/// Doubly-linked list with stable cursors.
pub struct List<T> {
    nodes: SlotMap<DefaultKey, Node<T>>,
    sentinel: Links,
    owner: usize,
}

#[cold]
#[track_caller]
fn empty_list() -> ! {
    panic!("element access on an empty list")
}

impl<T> List<T> {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            sentinel: EMPTY,
            owner: NEXT_OWNER.fetch_add(1),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn links(&self, at: Link) -> &Links {
        match at {
            Link::Sentinel => &self.sentinel,
            Link::Node(k) => &self.nodes[k].links,
        }
    }

    fn links_mut(&mut self, at: Link) -> &mut Links {
        match at {
            Link::Sentinel => &mut self.sentinel,
            Link::Node(k) => &mut self.nodes[k].links,
        }
    }

    /// Cursor issued by this list for `link`.
    pub(crate) fn cursor(&self, link: Link) -> Cursor {
        match link {
            Link::Sentinel => Cursor::end(),
            Link::Node(_) => Cursor {
                link,
                owner: self.owner,
            },
        }
    }

    fn owns(&self, at: Cursor) -> bool {
        at.owner == 0 || at.owner == self.owner
    }

    /// End or a live node of this list.
    fn is_valid(&self, at: Cursor) -> bool {
        self.owns(at)
            && match at.link {
                Link::Sentinel => true,
                Link::Node(k) => self.nodes.contains_key(k),
            }
    }

    /// Arena key named by `at`. None for end; a foreign cursor is reported
    /// and also yields None. A stale key is returned as is.
    #[track_caller]
    pub(crate) fn key_of(&self, at: Cursor) -> Option<DefaultKey> {
        let key = at.key()?;
        if !check!(self.owns(at), InvalidCursor, "cursor from another container") {
            return None;
        }
        Some(key)
    }

    /// Link a new node holding `value` before `at`, which must be live.
    pub(crate) fn link_before(&mut self, at: Link, value: T) -> DefaultKey {
        let prev = self.links(at).prev;
        let key = self.nodes.insert(Node {
            value,
            links: Links { prev, next: at },
        });
        self.links_mut(prev).next = Link::Node(key);
        self.links_mut(at).prev = Link::Node(key);
        key
    }

    /// Unlink and remove a live node, returning its value and successor.
    pub(crate) fn unlink(&mut self, key: DefaultKey) -> Option<(T, Link)> {
        let node = self.nodes.remove(key)?;
        let Links { prev, next } = node.links;
        self.links_mut(prev).next = next;
        self.links_mut(next).prev = prev;
        Some((node.value, next))
    }

    pub(crate) fn value(&self, key: DefaultKey) -> Option<&T> {
        self.nodes.get(key).map(|n| &n.value)
    }

    pub(crate) fn value_mut(&mut self, key: DefaultKey) -> Option<&mut T> {
        self.nodes.get_mut(key).map(|n| &mut n.value)
    }

    /// Value of a node known to be live.
    pub(crate) fn node(&self, key: DefaultKey) -> &T {
        &self.nodes[key].value
    }

    pub(crate) fn node_mut(&mut self, key: DefaultKey) -> &mut T {
        &mut self.nodes[key].value
    }

    pub(crate) fn first_link(&self) -> Link {
        self.sentinel.next
    }

    pub(crate) fn last_link(&self) -> Link {
        self.sentinel.prev
    }

    pub(crate) fn next_link(&self, key: DefaultKey) -> Link {
        self.nodes[key].links.next
    }

    /// Append and return a cursor to the new element.
    pub fn push(&mut self, value: T) -> Cursor {
        let key = self.link_before(Link::Sentinel, value);
        self.cursor(Link::Node(key))
    }

    /// Prepend and return a cursor to the new element.
    pub fn push_front(&mut self, value: T) -> Cursor {
        let first = self.sentinel.next;
        let key = self.link_before(first, value);
        self.cursor(Link::Node(key))
    }

    pub fn pop(&mut self) -> Option<T> {
        match self.sentinel.prev {
            Link::Sentinel => None,
            Link::Node(k) => self.unlink(k).map(|(v, _)| v),
        }
    }

    pub fn pop_front(&mut self) -> Option<T> {
        match self.sentinel.next {
            Link::Sentinel => None,
            Link::Node(k) => self.unlink(k).map(|(v, _)| v),
        }
    }

    /// Insert `value` before `at` and return a cursor to it. A stale or
    /// foreign cursor is a contract violation; the value then goes to the
    /// back.
    #[track_caller]
    pub fn insert(&mut self, at: Cursor, value: T) -> Cursor {
        let at = if check!(self.is_valid(at), InvalidCursor, "insert before a stale or foreign cursor") {
            at.link
        } else {
            Link::Sentinel
        };
        let key = self.link_before(at, value);
        self.cursor(Link::Node(key))
    }

    /// Remove the element at `at`, returning a cursor to its successor.
    /// The end cursor is a no-op returning end.
    #[track_caller]
    pub fn erase(&mut self, at: Cursor) -> Cursor {
        let Some(key) = self.key_of(at) else {
            return Cursor::end();
        };
        match self.unlink(key) {
            Some((_, next)) => self.cursor(next),
            None => {
                check!(false, InvalidCursor, "erase through a stale cursor");
                Cursor::end()
            }
        }
    }

    /// Like [`List::erase`] but hands back the removed value.
    #[track_caller]
    pub fn take(&mut self, at: Cursor) -> Option<T> {
        let key = self.key_of(at)?;
        let out = self.unlink(key).map(|(v, _)| v);
        check!(out.is_some(), InvalidCursor, "take through a stale cursor");
        out
    }

    pub fn begin(&self) -> Cursor {
        self.cursor(self.sentinel.next)
    }

    pub fn end(&self) -> Cursor {
        Cursor::end()
    }

    /// Successor of `at`. The ring wraps: the successor of end is the
    /// first element.
    #[track_caller]
    pub fn next(&self, at: Cursor) -> Cursor {
        if !check!(self.is_valid(at), InvalidCursor, "stale or foreign cursor") {
            return Cursor::end();
        }
        self.cursor(self.links(at.link).next)
    }

    /// Predecessor of `at`. The predecessor of end is the last element.
    #[track_caller]
    pub fn prev(&self, at: Cursor) -> Cursor {
        if !check!(self.is_valid(at), InvalidCursor, "stale or foreign cursor") {
            return Cursor::end();
        }
        self.cursor(self.links(at.link).prev)
    }

    /// Element at `at`; None for end or a stale cursor. A foreign cursor
    /// is a contract violation.
    #[track_caller]
    pub fn get(&self, at: Cursor) -> Option<&T> {
        self.value(self.key_of(at)?)
    }

    #[track_caller]
    pub fn get_mut(&mut self, at: Cursor) -> Option<&mut T> {
        let key = self.key_of(at)?;
        self.value_mut(key)
    }

    #[track_caller]
    pub fn front(&self) -> &T {
        check!(!self.is_empty(), EmptyContainer, "front of empty list");
        self.get(self.begin()).unwrap_or_else(|| empty_list())
    }

    #[track_caller]
    pub fn front_mut(&mut self) -> &mut T {
        check!(!self.is_empty(), EmptyContainer, "front of empty list");
        let first = self.begin();
        self.get_mut(first).unwrap_or_else(|| empty_list())
    }

    #[track_caller]
    pub fn back(&self) -> &T {
        check!(!self.is_empty(), EmptyContainer, "back of empty list");
        self.get(self.cursor(self.sentinel.prev)).unwrap_or_else(|| empty_list())
    }

    #[track_caller]
    pub fn back_mut(&mut self) -> &mut T {
        check!(!self.is_empty(), EmptyContainer, "back of empty list");
        let last = self.cursor(self.sentinel.prev);
        self.get_mut(last).unwrap_or_else(|| empty_list())
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.sentinel = EMPTY;
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            front: self.sentinel.next,
            back: self.sentinel.prev,
            remaining: self.len(),
        }
    }

    /// Mutable iteration in list order.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        let order: Vec<DefaultKey> = self.keys_in_order().collect();
        let mut slots: SecondaryMap<DefaultKey, &mut T> = self
            .nodes
            .iter_mut()
            .map(|(k, n)| (k, &mut n.value))
            .collect();
        let items: Vec<&mut T> = order.into_iter().filter_map(|k| slots.remove(k)).collect();
        IterMut {
            items: items.into_iter(),
        }
    }

    pub(crate) fn keys_in_order(&self) -> impl Iterator<Item = DefaultKey> + '_ {
        let mut at = self.sentinel.next;
        core::iter::from_fn(move || match at {
            Link::Sentinel => None,
            Link::Node(k) => {
                at = self.nodes[k].links.next;
                Some(k)
            }
        })
    }
}

impl<T: PartialEq> List<T> {
    /// First element equal to `value`, or end.
    pub fn find(&self, value: &T) -> Cursor {
        self.find_from(self.begin(), value)
    }

    /// First element equal to `value` at or after `start`, or end.
    #[track_caller]
    pub fn find_from(&self, start: Cursor, value: &T) -> Cursor {
        if !check!(self.is_valid(start), InvalidCursor, "stale or foreign cursor") {
            return Cursor::end();
        }
        let mut at = start.link;
        while let Link::Node(k) = at {
            let node = &self.nodes[k];
            if node.value == *value {
                return self.cursor(at);
            }
            at = node.links.next;
        }
        Cursor::end()
    }

    /// Remove the first element equal to `value`.
    pub fn remove(&mut self, value: &T) -> bool {
        match self.find(value).key() {
            Some(k) => self.unlink(k).is_some(),
            None => false,
        }
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for List<T> {
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl<T: PartialEq> PartialEq for List<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for List<T> {}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Extend<T> for List<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for v in iter {
            self.push(v);
        }
    }
}

impl<T> FromIterator<T> for List<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut l = Self::new();
        l.extend(iter);
        l
    }
}

/// Iterator over `&T` in list order.
pub struct Iter<'a, T> {
    list: &'a List<T>,
    front: Link,
    back: Link,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;
    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        let Link::Node(k) = self.front else {
            return None;
        };
        let node = &self.list.nodes[k];
        self.front = node.links.next;
        self.remaining -= 1;
        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        let Link::Node(k) = self.back else {
            return None;
        };
        let node = &self.list.nodes[k];
        self.back = node.links.prev;
        self.remaining -= 1;
        Some(&node.value)
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

/// Iterator over `&mut T` in list order.
pub struct IterMut<'a, T> {
    items: std::vec::IntoIter<&'a mut T>,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;
    fn next(&mut self) -> Option<&'a mut T> {
        self.items.next()
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl<'a, T> DoubleEndedIterator for IterMut<'a, T> {
    fn next_back(&mut self) -> Option<&'a mut T> {
        self.items.next_back()
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}

/// Owning iterator; pops from either end.
pub struct IntoIter<T> {
    list: List<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;
    fn next(&mut self) -> Option<T> {
        self.list.pop_front()
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.list.len(), Some(self.list.len()))
    }
}

impl<T> DoubleEndedIterator for IntoIter<T> {
    fn next_back(&mut self) -> Option<T> {
        self.list.pop()
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}

impl<T> IntoIterator for List<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;
    fn into_iter(self) -> IntoIter<T> {
        IntoIter { list: self }
    }
}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;
    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut List<T> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T>;
    fn into_iter(self) -> IterMut<'a, T> {
        self.iter_mut()
    }
}
