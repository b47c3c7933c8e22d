//! Splittable traversal of an [`OpenHashMap`](super::OpenHashMap), for
//! handing parts of a table to other threads.

use crate::{hash::Primitive, traverse::Spliterator};
use core::marker::PhantomData;

/// A splittable traversal over a range of table slots.
///
/// Unlike [`Iter`](super::Iter), slots are visited in increasing order (the
/// zero key, if any, coming first). [`try_split`](Spliterator::try_split)
/// hands out the first half of the remaining range.
pub struct TableSplit<'a, K, V> {
    /// All `n + 1` key slots.
    keys: &'a [K],
    values: *const V,
    pos: usize,
    max: usize,
    zero_pending: bool,
    /// Entries returned so far by this part.
    returned: usize,
    /// Entries of the whole map when the traversal started.
    size: usize,
    /// The same, without the zero key.
    real_size: usize,
    has_split: bool,
    _marker: PhantomData<&'a V>,
}

unsafe impl<K: Sync, V: Sync> Send for TableSplit<'_, K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for TableSplit<'_, K, V> {}

impl<'a, K: Primitive, V> TableSplit<'a, K, V> {
    pub(super) fn new(keys: &'a [K], values: *const V, contains_zero_key: bool, size: usize) -> Self {
        TableSplit {
            keys,
            values,
            pos: 0,
            max: keys.len() - 1,
            zero_pending: contains_zero_key,
            returned: 0,
            size,
            real_size: size - contains_zero_key as usize,
            has_split: false,
            _marker: PhantomData,
        }
    }

    #[inline]
    fn table_size(&self) -> usize {
        self.keys.len() - 1
    }

    fn entry(&self, pos: usize) -> (K, &'a V) {
        (self.keys[pos], unsafe { &*self.values.add(pos) })
    }
}

impl<'a, K: Primitive, V> Iterator for TableSplit<'a, K, V> {
    type Item = (K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.zero_pending {
            self.zero_pending = false;
            self.returned += 1;
            return Some(self.entry(self.table_size()));
        }
        while self.pos < self.max {
            let pos = self.pos;
            self.pos += 1;
            if !self.keys[pos].is_zero_bits() {
                self.returned += 1;
                return Some(self.entry(pos));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.size - self.returned;
        if self.has_split {
            (0, Some(left))
        } else {
            (left, Some(left))
        }
    }
}

impl<K: Primitive, V> Spliterator for TableSplit<'_, K, V> {
    fn try_split(&mut self) -> Option<Self> {
        if self.pos + 1 >= self.max {
            return None;
        }
        let half = (self.max - self.pos) >> 1;
        if half <= 1 {
            return None;
        }
        let middle = self.pos + half;
        let prefix = TableSplit {
            keys: self.keys,
            values: self.values,
            pos: self.pos,
            max: middle,
            zero_pending: self.zero_pending,
            returned: 0,
            size: self.size,
            real_size: self.real_size,
            has_split: true,
            _marker: PhantomData,
        };
        self.pos = middle;
        self.zero_pending = false;
        self.has_split = true;
        Some(prefix)
    }

    fn estimate_size(&self) -> usize {
        let left = self.size - self.returned;
        if !self.has_split {
            return left;
        }
        // Assume the entries are spread evenly over the table.
        let share =
            self.real_size as f64 / self.table_size() as f64 * (self.max - self.pos) as f64;
        left.min(share as usize + self.zero_pending as usize)
    }

    fn is_exact(&self) -> bool {
        !self.has_split
    }
}

#[cfg(test)]
mod test {
    use crate::{traverse::split_all, OpenHashMap, Spliterator};
    use std::collections::HashSet;

    #[test]
    fn ascending_order_zero_first() {
        let map = OpenHashMap::try_from_iter((-3..=3i32).map(|i| (i, i))).unwrap();
        let mut split = map.split_iter();
        assert!(split.is_exact());
        assert_eq!(split.estimate_size(), 7);
        assert_eq!(split.next(), Some((0, &0)));
        assert_eq!(split.estimate_size(), 6);
        assert_eq!(split.count(), 6);
    }

    #[test]
    fn parts_cover_the_map() {
        let map = OpenHashMap::try_from_iter((0..1000u64).map(|i| (i, i * 3))).unwrap();
        let parts = split_all(map.split_iter(), 16);
        assert!(parts.len() > 1);
        assert!(parts.iter().all(|part| !part.is_exact()));

        let keys: Vec<u64> = parts.into_iter().flatten().map(|(key, _)| key).collect();
        assert_eq!(keys.len(), 1000);
        let unique: HashSet<u64> = keys.iter().copied().collect();
        assert_eq!(unique.len(), 1000);
    }

    #[test]
    fn traverse_parts_on_threads() {
        let map = OpenHashMap::try_from_iter((1..=500u32).map(|i| (i, u64::from(i)))).unwrap();
        let parts = split_all(map.split_iter(), 64);
        let total: u64 = std::thread::scope(|scope| {
            let handles: Vec<_> = parts
                .into_iter()
                .map(|part| scope.spawn(move || part.map(|(_, &value)| value).sum::<u64>()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(total, 500 * 501 / 2);
    }

    #[test]
    fn small_ranges_do_not_split() {
        let mut map = OpenHashMap::<i8, ()>::with_capacity(0).unwrap();
        map.insert(1, ()).unwrap();
        let mut split = map.split_iter();
        assert_eq!(map.table_size(), 2);
        assert!(split.try_split().is_none());
        assert_eq!(split.count(), 1);
    }
}
