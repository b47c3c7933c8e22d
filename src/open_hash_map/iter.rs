//! Borrowing iterators over an [`OpenHashMap`](super::OpenHashMap).

use crate::hash::Primitive;
use core::{fmt, iter::FusedIterator, marker::PhantomData};

/// Walks the occupied slots of a table: the zero-key slot first, then the
/// main slots in decreasing order.
#[derive(Clone)]
struct Slots<'a, K> {
    /// All `n + 1` key slots.
    keys: &'a [K],
    pos: usize,
    remaining: usize,
    zero_pending: bool,
}

impl<'a, K: Primitive> Slots<'a, K> {
    fn new(keys: &'a [K], contains_zero_key: bool, size: usize) -> Self {
        Slots {
            keys,
            pos: keys.len() - 1,
            remaining: size,
            zero_pending: contains_zero_key,
        }
    }

    #[inline]
    fn next(&mut self) -> Option<(K, usize)> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        if self.zero_pending {
            self.zero_pending = false;
            let n = self.keys.len() - 1;
            return Some((self.keys[n], n));
        }
        loop {
            self.pos -= 1;
            let key = self.keys[self.pos];
            if !key.is_zero_bits() {
                return Some((key, self.pos));
            }
        }
    }
}

/// Iterator over `(key, &value)` pairs.
pub struct Iter<'a, K, V> {
    slots: Slots<'a, K>,
    values: *const V,
    _marker: PhantomData<&'a V>,
}

unsafe impl<K: Sync, V: Sync> Send for Iter<'_, K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for Iter<'_, K, V> {}

impl<'a, K: Primitive, V> Iter<'a, K, V> {
    pub(super) fn new(keys: &'a [K], values: *const V, contains_zero_key: bool, size: usize) -> Self {
        Iter {
            slots: Slots::new(keys, contains_zero_key, size),
            values,
            _marker: PhantomData,
        }
    }
}

impl<K: Primitive, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            slots: self.slots.clone(),
            values: self.values,
            _marker: PhantomData,
        }
    }
}

impl<'a, K: Primitive, V> Iterator for Iter<'a, K, V> {
    type Item = (K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, pos) = self.slots.next()?;
        Some((key, unsafe { &*self.values.add(pos) }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.slots.remaining, Some(self.slots.remaining))
    }
}

impl<K: Primitive, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K: Primitive, V> FusedIterator for Iter<'_, K, V> {}

impl<K: Primitive, V: fmt::Debug> fmt::Debug for Iter<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

/// Iterator over `(key, &mut value)` pairs.
pub struct IterMut<'a, K, V> {
    slots: Slots<'a, K>,
    values: *mut V,
    _marker: PhantomData<&'a mut V>,
}

unsafe impl<K: Sync, V: Send> Send for IterMut<'_, K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for IterMut<'_, K, V> {}

impl<'a, K: Primitive, V> IterMut<'a, K, V> {
    pub(super) fn new(keys: &'a [K], values: *mut V, contains_zero_key: bool, size: usize) -> Self {
        IterMut {
            slots: Slots::new(keys, contains_zero_key, size),
            values,
            _marker: PhantomData,
        }
    }
}

impl<'a, K: Primitive, V> Iterator for IterMut<'a, K, V> {
    type Item = (K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, pos) = self.slots.next()?;
        // Every slot is visited at most once.
        Some((key, unsafe { &mut *self.values.add(pos) }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.slots.remaining, Some(self.slots.remaining))
    }
}

impl<K: Primitive, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K: Primitive, V> FusedIterator for IterMut<'_, K, V> {}

/// Iterator over the keys of a map.
pub struct Keys<'a, K, V> {
    pub(super) inner: Iter<'a, K, V>,
}

impl<K: Primitive, V> Clone for Keys<'_, K, V> {
    fn clone(&self) -> Self {
        Keys {
            inner: self.inner.clone(),
        }
    }
}

impl<K: Primitive, V> Iterator for Keys<'_, K, V> {
    type Item = K;

    fn next(&mut self) -> Option<K> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: Primitive, V> ExactSizeIterator for Keys<'_, K, V> {}
impl<K: Primitive, V> FusedIterator for Keys<'_, K, V> {}

/// Iterator over the values of a map.
pub struct Values<'a, K, V> {
    pub(super) inner: Iter<'a, K, V>,
}

impl<K: Primitive, V> Clone for Values<'_, K, V> {
    fn clone(&self) -> Self {
        Values {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K: Primitive, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: Primitive, V> ExactSizeIterator for Values<'_, K, V> {}
impl<K: Primitive, V> FusedIterator for Values<'_, K, V> {}

pub struct ValuesMut<'a, K, V> {
    pub(super) inner: IterMut<'a, K, V>,
}

impl<'a, K: Primitive, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<&'a mut V> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: Primitive, V> ExactSizeIterator for ValuesMut<'_, K, V> {}
impl<K: Primitive, V> FusedIterator for ValuesMut<'_, K, V> {}

/// A detached copy of a map entry.
///
/// Changing the value of a `BasicEntry` does not affect the map it was taken
/// from; use [`Cursor`](super::Cursor) entries for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BasicEntry<K, V> {
    key: K,
    value: V,
}

impl<K: Copy, V> BasicEntry<K, V> {
    pub fn new(key: K, value: V) -> Self {
        BasicEntry { key, value }
    }

    pub fn key(&self) -> K {
        self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    /// Replaces the value, returning the old one.
    pub fn set_value(&mut self, value: V) -> V {
        core::mem::replace(&mut self.value, value)
    }

    pub fn into_pair(self) -> (K, V) {
        (self.key, self.value)
    }
}

impl<K: Copy, V: Clone> From<(K, &V)> for BasicEntry<K, V> {
    fn from((key, value): (K, &V)) -> Self {
        BasicEntry::new(key, value.clone())
    }
}
