//! Traversals that may remove the entries they visit.

use super::{Error, Keys, NoCurrentEntry, OpenHashMap};
use crate::{alloc::Alloc, hash::Primitive, hash::Strategy};
use core::mem;

/// What the last call to [`Cursor::next`] returned.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Visited<K> {
    Nothing,
    ZeroKey,
    Slot(usize),
    /// An entry found through the list of wrapped keys, identified by key
    /// since its slot may have changed.
    Wrapped(K),
}

/// A traversal of an [`OpenHashMap`] that can remove the entry it is on.
///
/// Entries are visited in the same order as [`OpenHashMap::iter`]. Removing
/// an entry shifts later entries of its probe run backwards; the few that
/// get moved from the start of the table to its end (slots the traversal
/// has not yet passed, to slots it has already left behind) are remembered
/// and visited once the scan of the table is over. Every entry present when
/// the cursor was created, and not removed meanwhile, is visited exactly
/// once.
///
/// Removals through a cursor never shrink the table.
///
/// ```
/// use primitive_collections::OpenHashMap;
///
/// let mut map = OpenHashMap::try_from_iter((0..100u32).map(|i| (i, i))).unwrap();
/// let mut cursor = map.cursor();
/// while let Some(mut entry) = cursor.next() {
///     if entry.key() % 2 == 0 {
///         cursor.remove().unwrap();
///     } else {
///         *entry.value_mut() *= 10;
///     }
/// }
/// assert_eq!(map.len(), 50);
/// assert_eq!(map.get(7), Some(&70));
/// ```
pub struct Cursor<'a, K: Primitive, V, S, A: Alloc> {
    map: &'a mut OpenHashMap<K, V, S, A>,
    /// The next main slot to look at is `pos - 1`.
    pos: usize,
    remaining: usize,
    zero_pending: bool,
    last: Visited<K>,
    wrapped: Vec<K>,
    wrapped_next: usize,
}

/// An entry under a [`Cursor`], with write access to its value.
#[derive(Debug)]
pub struct Entry<'c, K, V> {
    key: K,
    value: &'c mut V,
}

impl<'c, K: Copy, V> Entry<'c, K, V> {
    pub fn key(&self) -> K {
        self.key
    }

    pub fn value(&self) -> &V {
        self.value
    }

    pub fn value_mut(&mut self) -> &mut V {
        self.value
    }

    /// Writes `value` into the map, returning the old value.
    pub fn set_value(&mut self, value: V) -> V {
        mem::replace(self.value, value)
    }

    pub fn into_value_mut(self) -> &'c mut V {
        self.value
    }
}

impl<'a, K, V, S, A> Cursor<'a, K, V, S, A>
where
    K: Primitive,
    S: Strategy<K>,
    A: Alloc + Clone,
{
    pub(super) fn new(map: &'a mut OpenHashMap<K, V, S, A>) -> Self {
        Cursor {
            pos: map.n,
            remaining: map.size,
            zero_pending: map.contains_zero_key,
            last: Visited::Nothing,
            wrapped: Vec::new(),
            wrapped_next: 0,
            map,
        }
    }

    /// How many entries are left to visit.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    fn next_slot(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        if self.zero_pending {
            self.zero_pending = false;
            self.last = Visited::ZeroKey;
            return Some(self.map.n);
        }
        loop {
            if self.pos == 0 {
                // The scan is over; what is left has wrapped around.
                let key = *self.wrapped.get(self.wrapped_next)?;
                self.wrapped_next += 1;
                self.last = Visited::Wrapped(key);
                return self.map.find(key).ok();
            }
            self.pos -= 1;
            if !self.map.key_at(self.pos).is_zero_bits() {
                self.last = Visited::Slot(self.pos);
                return Some(self.pos);
            }
        }
    }

    /// Moves to the next entry.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<Entry<'_, K, V>> {
        let pos = self.next_slot()?;
        let key = self.map.key_at(pos);
        let value = unsafe { &mut *self.map.value_ptr(pos) };
        Some(Entry { key, value })
    }

    /// Skips up to `n` entries, returning how many were skipped.
    pub fn skip(&mut self, n: usize) -> usize {
        let mut skipped = 0;
        while skipped < n && self.next_slot().is_some() {
            skipped += 1;
        }
        skipped
    }

    /// Removes the entry returned by the last call to [`next`](Self::next),
    /// and returns its value.
    ///
    /// Fails if `next` has not been called yet, or if the entry has already
    /// been removed.
    pub fn remove(&mut self) -> Result<V, Error> {
        let map = &mut *self.map;
        match mem::replace(&mut self.last, Visited::Nothing) {
            Visited::Nothing => NoCurrentEntry.fail(),
            Visited::ZeroKey => Ok(map.take_zero_entry()),
            Visited::Slot(pos) => {
                let wrapped = &mut self.wrapped;
                Ok(map.take_entry(pos, |key| wrapped.push(key)))
            }
            Visited::Wrapped(key) => match map.find(key) {
                Ok(pos) => Ok(map.take_entry(pos, |_| {})),
                Err(_) => NoCurrentEntry.fail(),
            },
        }
    }
}

/// A live view of the keys of an [`OpenHashMap`].
///
/// Keys can be looked up and removed, but not added.
pub struct KeySet<'a, K: Primitive, V, S, A: Alloc> {
    map: &'a mut OpenHashMap<K, V, S, A>,
}

impl<'a, K, V, S, A> KeySet<'a, K, V, S, A>
where
    K: Primitive,
    S: Strategy<K>,
    A: Alloc + Clone,
{
    pub(super) fn new(map: &'a mut OpenHashMap<K, V, S, A>) -> Self {
        KeySet { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, key: K) -> bool {
        self.map.contains_key(key)
    }

    /// Removes `key` along with its value.
    pub fn remove(&mut self, key: K) -> bool {
        self.map.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.map.clear()
    }

    pub fn iter(&self) -> Keys<'_, K, V> {
        self.map.keys()
    }

    /// Removes every key (and its value) for which `keep` returns `false`.
    pub fn retain<F: FnMut(K) -> bool>(&mut self, mut keep: F) {
        self.map.retain(|key, _| keep(key))
    }
}
