//! Open addressing hash map keyed by primitives.
//!
//! Keys and values live in two parallel arrays of `n + 1` slots, where `n` is
//! a power of two. Collisions are resolved by linear probing. A key whose
//! bits are all zero marks an empty slot, so the key equal to
//! [`Primitive::ZERO`] (under the map's [`Strategy`]) is kept apart, in the
//! extra slot `n`, with its presence tracked by a flag.
//!
//! Removal never leaves tombstones: the entries following the freed slot
//! are shifted back so that every key stays reachable from its home slot.

use crate::{
    alloc::{Alloc, Global},
    hash::{
        self, DefaultStrategy, Primitive, Strategy, DEFAULT_INITIAL_SIZE, DEFAULT_LOAD_FACTOR,
    },
    raw_vec::{self, RawVec},
    traverse::estimation,
};
use core::{fmt, mem, ptr, slice};
use log::{debug, trace};
use snafu::{ensure, OptionExt, ResultExt, Snafu};

mod cursor;
mod iter;
#[cfg(feature = "serde")]
mod persist;
mod split;

pub use cursor::{Cursor, Entry, KeySet};
pub use iter::{BasicEntry, Iter, IterMut, Keys, Values, ValuesMut};
pub use split::TableSplit;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "Load factor must be greater than 0 and smaller than 1, got {}",
        load_factor
    ))]
    InvalidLoadFactor { load_factor: f32 },

    #[snafu(display(
        "A table for {} entries with load factor {} is too large",
        expected,
        load_factor
    ))]
    TooLarge { expected: usize, load_factor: f32 },

    #[snafu(display(
        "The key array and the value array have different lengths ({} and {})",
        keys,
        values
    ))]
    LengthMismatch { keys: usize, values: usize },

    #[snafu(display("There is no current entry to remove"))]
    NoCurrentEntry,

    #[snafu(display("Unable to allocate the table: {}", source))]
    Storage { source: raw_vec::Error },
}

/// A hash map from primitive keys to arbitrary values.
///
/// Lookups that miss can either report `None` ([`get`](Self::get),
/// [`insert`](Self::insert), [`remove`](Self::remove)) or answer with the
/// map's *default return value* ([`get_or_default_return`],
/// [`put`], [`remove_or_default_return`]); in the latter case
/// [`contains_key`](Self::contains_key) is the only way to tell a missing
/// key from one mapped to the default.
///
/// [`get_or_default_return`]: Self::get_or_default_return
/// [`put`]: Self::put
/// [`remove_or_default_return`]: Self::remove_or_default_return
///
/// ```
/// use primitive_collections::OpenHashMap;
///
/// let mut map = OpenHashMap::<f64, &str>::new().unwrap();
/// map.insert(0.0, "zero").unwrap();
/// map.insert(2.5, "two and a half").unwrap();
/// assert_eq!(map.get(0.0), Some(&"zero"));
/// assert_eq!(map.remove(2.5), Some("two and a half"));
/// assert_eq!(map.get_or_default_return(2.5), &"");
/// assert_eq!(map.len(), 1);
/// ```
pub struct OpenHashMap<K: Primitive, V, S = DefaultStrategy, A: Alloc = Global> {
    keys: RawVec<K, A>,
    /// A value slot is initialized iff the matching key slot is occupied.
    values: RawVec<V, A>,
    contains_zero_key: bool,
    n: usize,
    mask: usize,
    max_fill: usize,
    /// The table never shrinks below the size it was created with.
    min_n: usize,
    size: usize,
    load_factor: f32,
    strategy: S,
    default_value: V,
}

fn allocate_table<K: Primitive, V, A: Alloc + Clone>(
    n: usize,
    alloc: &A,
) -> Result<(RawVec<K, A>, RawVec<V, A>), Error> {
    let keys = RawVec::with_capacity_zeroed_in(n + 1, A::clone(alloc)).context(Storage)?;
    let values = RawVec::with_capacity_in(n + 1, A::clone(alloc)).context(Storage)?;
    Ok((keys, values))
}

impl<K: Primitive, V: Default> OpenHashMap<K, V> {
    /// Creates a map for [`DEFAULT_INITIAL_SIZE`] entries.
    pub fn new() -> Result<Self, Error> {
        Self::with_capacity(DEFAULT_INITIAL_SIZE)
    }

    /// Creates a map that holds `expected` entries without rehashing.
    pub fn with_capacity(expected: usize) -> Result<Self, Error> {
        Self::with_capacity_and_load_factor(expected, DEFAULT_LOAD_FACTOR)
    }

    pub fn with_capacity_and_load_factor(expected: usize, load_factor: f32) -> Result<Self, Error> {
        Self::with_capacity_and_strategy_in(expected, load_factor, DefaultStrategy, Global)
    }

    /// Builds a map from two parallel slices.
    pub fn from_slices(keys: &[K], values: &[V]) -> Result<Self, Error>
    where
        V: Clone,
    {
        ensure!(
            keys.len() == values.len(),
            LengthMismatch {
                keys: keys.len(),
                values: values.len()
            }
        );
        let mut map = Self::with_capacity(keys.len())?;
        for (&key, value) in keys.iter().zip(values) {
            map.insert(key, value.clone())?;
        }
        Ok(map)
    }

    /// Tries to build a map from an iterator of pairs; later pairs win.
    pub fn try_from_iter<I>(iter: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let iter = iter.into_iter();
        let mut map = Self::with_capacity(estimation(&iter))?;
        map.try_extend(iter)?;
        Ok(map)
    }
}

impl<K: Primitive, V: Default, S: Strategy<K>> OpenHashMap<K, V, S> {
    pub fn with_strategy(strategy: S) -> Result<Self, Error> {
        Self::with_capacity_and_strategy(DEFAULT_INITIAL_SIZE, DEFAULT_LOAD_FACTOR, strategy)
    }

    pub fn with_capacity_and_strategy(
        expected: usize,
        load_factor: f32,
        strategy: S,
    ) -> Result<Self, Error> {
        Self::with_capacity_and_strategy_in(expected, load_factor, strategy, Global)
    }
}

impl<K: Primitive, V: Default, S: Strategy<K>, A: Alloc + Clone> OpenHashMap<K, V, S, A> {
    /// Creates a map for `expected` entries at the given load factor, using
    /// `strategy` for key equality and `alloc` for the table.
    ///
    /// The table size is the least power of two not smaller than
    /// `expected / load_factor`.
    pub fn with_capacity_and_strategy_in(
        expected: usize,
        load_factor: f32,
        strategy: S,
        alloc: A,
    ) -> Result<Self, Error> {
        ensure!(
            load_factor > 0.0 && load_factor < 1.0,
            InvalidLoadFactor { load_factor }
        );
        let n = hash::array_size(expected, load_factor).context(TooLarge {
            expected,
            load_factor,
        })?;
        let (keys, values) = allocate_table(n, &alloc)?;
        Ok(OpenHashMap {
            keys,
            values,
            contains_zero_key: false,
            n,
            mask: n - 1,
            max_fill: hash::max_fill(n, load_factor),
            min_n: n,
            size: 0,
            load_factor,
            strategy,
            default_value: V::default(),
        })
    }
}

impl<K: Primitive, V, S, A: Alloc> OpenHashMap<K, V, S, A> {
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// How many entries fit before the table has to grow.
    pub fn capacity(&self) -> usize {
        self.max_fill
    }

    /// The number of main slots of the table (a power of two).
    pub fn table_size(&self) -> usize {
        self.n
    }

    pub fn load_factor(&self) -> f32 {
        self.load_factor
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// The value reported for missing keys by the `*_default_return` family
    /// and by [`put`](Self::put).
    pub fn default_return_value(&self) -> &V {
        &self.default_value
    }

    pub fn set_default_return_value(&mut self, value: V) {
        self.default_value = value;
    }

    /// Entries in the main part of the table.
    #[inline]
    fn real_size(&self) -> usize {
        self.size - self.contains_zero_key as usize
    }

    /// All `n + 1` key slots; every one of them is initialized.
    #[inline(always)]
    fn key_slots(&self) -> &[K] {
        unsafe { slice::from_raw_parts(self.keys.as_ptr(), self.n + 1) }
    }

    #[inline(always)]
    fn key_at(&self, pos: usize) -> K {
        debug_assert!(pos <= self.n);
        unsafe { *self.keys.as_ptr().add(pos) }
    }

    #[inline(always)]
    unsafe fn set_key(&mut self, pos: usize, key: K) {
        debug_assert!(pos <= self.n);
        self.keys.as_ptr().add(pos).write(key)
    }

    #[inline(always)]
    unsafe fn value_ptr(&self, pos: usize) -> *mut V {
        debug_assert!(pos <= self.n);
        self.values.as_ptr().add(pos)
    }

    #[inline]
    fn is_occupied(&self, pos: usize) -> bool {
        if pos == self.n {
            self.contains_zero_key
        } else {
            !self.key_at(pos).is_zero_bits()
        }
    }

    /// Iterates over `(key, &value)`: the zero key first, then the table in
    /// decreasing slot order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self.key_slots(), self.values.as_ptr(), self.contains_zero_key, self.size)
    }

    /// Like [`iter`](Self::iter), with mutable access to the values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let (contains_zero_key, size) = (self.contains_zero_key, self.size);
        let values = self.values.as_ptr();
        IterMut::new(self.key_slots(), values, contains_zero_key, size)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Snapshots of the entries, detached from the table.
    pub fn basic_entries(&self) -> impl Iterator<Item = BasicEntry<K, V>> + '_
    where
        V: Clone,
    {
        self.iter().map(BasicEntry::from)
    }

    /// A splittable traversal of the table in increasing slot order, for
    /// handing disjoint parts of the map to different threads.
    pub fn split_iter(&self) -> TableSplit<'_, K, V> {
        TableSplit::new(
            self.key_slots(),
            self.values.as_ptr(),
            self.contains_zero_key,
            self.size,
        )
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.values().any(|v| v == value)
    }

    /// Removes every entry, keeping the table size.
    pub fn clear(&mut self) {
        if self.size == 0 {
            return;
        }
        if mem::needs_drop::<V>() {
            self.drop_values();
        }
        unsafe { ptr::write_bytes(self.keys.as_ptr(), 0, self.n + 1) };
        self.size = 0;
        self.contains_zero_key = false;
    }

    /// Drops every live value, clearing each key before its value is dropped
    /// so that a panicking destructor cannot cause a double drop.
    fn drop_values(&mut self) {
        if self.contains_zero_key {
            self.contains_zero_key = false;
            self.size -= 1;
            unsafe {
                self.set_key(self.n, K::ZERO);
                ptr::drop_in_place(self.value_ptr(self.n));
            }
        }
        let mut pos = self.n;
        while self.size != 0 && pos != 0 {
            pos -= 1;
            if !self.key_at(pos).is_zero_bits() {
                self.size -= 1;
                unsafe {
                    self.set_key(pos, K::ZERO);
                    ptr::drop_in_place(self.value_ptr(pos));
                }
            }
        }
    }
}

impl<K: Primitive, V, S: Strategy<K>, A: Alloc + Clone> OpenHashMap<K, V, S, A> {
    /// Home slot of a key in the main table.
    #[inline(always)]
    fn slot_of(&self, key: K) -> usize {
        hash::mix(self.strategy.hash(key)) as usize & self.mask
    }

    /// Locates `key`: `Ok(pos)` if it is present, `Err(pos)` with the slot
    /// it would be inserted at otherwise.
    fn find(&self, key: K) -> Result<usize, usize> {
        if self.strategy.equals(key, K::ZERO) {
            return if self.contains_zero_key {
                Ok(self.n)
            } else {
                Err(self.n)
            };
        }
        let keys = self.key_slots();
        let mut pos = self.slot_of(key);
        // There's always an empty slot.
        loop {
            let curr = unsafe { *keys.get_unchecked(pos) };
            if curr.is_zero_bits() {
                return Err(pos);
            }
            if self.strategy.equals(key, curr) {
                return Ok(pos);
            }
            pos = (pos + 1) & self.mask;
        }
    }

    /// The first free slot on the probe sequence of a key known to be absent.
    fn free_slot_for(&self, key: K) -> usize {
        if self.strategy.equals(key, K::ZERO) {
            return self.n;
        }
        let mut pos = self.slot_of(key);
        while !self.key_at(pos).is_zero_bits() {
            pos = (pos + 1) & self.mask;
        }
        pos
    }

    /// Maps `key` to `value`, returning the previous value if there was one.
    ///
    /// If the table has to grow and the larger table can't be allocated, the
    /// map is left unchanged.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, Error> {
        let pos = match self.find(key) {
            Ok(pos) => return Ok(Some(unsafe { ptr::replace(self.value_ptr(pos), value) })),
            Err(pos) => pos,
        };
        let pos = if self.size >= self.max_fill {
            self.grow_for(self.size + 1)?;
            self.free_slot_for(key)
        } else {
            pos
        };
        if pos == self.n {
            self.contains_zero_key = true;
        }
        unsafe {
            self.value_ptr(pos).write(value);
            self.set_key(pos, key);
        }
        self.size += 1;
        debug_assert!(self.size <= self.max_fill);
        Ok(None)
    }

    /// Default-return flavour of [`insert`](Self::insert): the previous value,
    /// or a copy of the default return value if the key was absent.
    pub fn put(&mut self, key: K, value: V) -> Result<V, Error>
    where
        V: Clone,
    {
        let old = self.insert(key, value)?;
        Ok(old.unwrap_or_else(|| self.default_value.clone()))
    }

    pub fn get(&self, key: K) -> Option<&V> {
        self.find(key)
            .ok()
            .map(|pos| unsafe { &*self.value_ptr(pos) })
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        match self.find(key) {
            Ok(pos) => Some(unsafe { &mut *self.value_ptr(pos) }),
            Err(_) => None,
        }
    }

    /// The value of `key`, or the default return value.
    pub fn get_or_default_return(&self, key: K) -> &V {
        self.get(key).unwrap_or(&self.default_value)
    }

    pub fn contains_key(&self, key: K) -> bool {
        self.find(key).is_ok()
    }

    pub fn remove(&mut self, key: K) -> Option<V> {
        let pos = self.find(key).ok()?;
        let value = if pos == self.n {
            self.take_zero_entry()
        } else {
            self.take_entry(pos, |_| {})
        };
        self.shrink_if_sparse();
        Some(value)
    }

    /// The removed value, or a copy of the default return value.
    pub fn remove_or_default_return(&mut self, key: K) -> V
    where
        V: Clone,
    {
        match self.remove(key) {
            Some(value) => value,
            None => self.default_value.clone(),
        }
    }

    /// Removes every entry for which `keep` returns `false`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(K, &mut V) -> bool,
    {
        let mut cursor = self.cursor();
        while let Some(mut entry) = cursor.next() {
            let key = entry.key();
            if !keep(key, entry.value_mut()) {
                let _ = cursor.remove();
            }
        }
    }

    /// A traversal that can remove the entries it visits.
    pub fn cursor(&mut self) -> Cursor<'_, K, V, S, A> {
        Cursor::new(self)
    }

    /// A live view of the keys; removals through it remove entries.
    pub fn key_set(&mut self) -> KeySet<'_, K, V, S, A> {
        KeySet::new(self)
    }

    /// Moves the value out of the zero-key slot.
    fn take_zero_entry(&mut self) -> V {
        debug_assert!(self.contains_zero_key);
        self.contains_zero_key = false;
        self.size -= 1;
        unsafe {
            self.set_key(self.n, K::ZERO);
            self.value_ptr(self.n).read()
        }
    }

    /// Moves the value out of main slot `pos` and closes the gap. Keys that
    /// get moved from the start of the table to its end are reported to
    /// `on_wrap`.
    fn take_entry<F: FnMut(K)>(&mut self, pos: usize, on_wrap: F) -> V {
        debug_assert!(pos < self.n && self.is_occupied(pos));
        let value = unsafe { self.value_ptr(pos).read() };
        self.size -= 1;
        self.shift_keys(pos, on_wrap);
        value
    }

    /// Closes the gap at `pos` by shifting back the entries that would become
    /// unreachable from their home slot.
    fn shift_keys<F: FnMut(K)>(&mut self, mut pos: usize, mut on_wrap: F) {
        loop {
            let last = pos;
            // The gap owns no value; clearing its key first keeps the table
            // consistent while the strategy runs.
            unsafe { self.set_key(last, K::ZERO) };
            pos = (last + 1) & self.mask;
            let curr = loop {
                let curr = self.key_at(pos);
                if curr.is_zero_bits() {
                    return;
                }
                let slot = self.slot_of(curr);
                let unreachable = if last <= pos {
                    last >= slot || slot > pos
                } else {
                    last >= slot && slot > pos
                };
                if unreachable {
                    break curr;
                }
                pos = (pos + 1) & self.mask;
            };
            if pos < last {
                on_wrap(curr);
            }
            unsafe {
                self.set_key(last, curr);
                ptr::copy_nonoverlapping(self.value_ptr(pos), self.value_ptr(last), 1);
            }
        }
    }

    fn shrink_if_sparse(&mut self) {
        if self.n > self.min_n && self.size < self.max_fill / 4 && self.n > DEFAULT_INITIAL_SIZE {
            if let Err(e) = self.rehash(self.n / 2) {
                debug!("Keeping a sparse table of {} slots: {}", self.n, e);
            }
        }
    }

    /// Grows the table so that it holds `entries` entries.
    fn grow_for(&mut self, entries: usize) -> Result<(), Error> {
        let load_factor = self.load_factor;
        let n = hash::array_size(entries, load_factor).context(TooLarge {
            expected: entries,
            load_factor,
        })?;
        self.rehash(n)
    }

    /// Moves every entry to a fresh table of `new_n` main slots.
    ///
    /// Both new arrays are allocated before anything moves, so a failure
    /// leaves the map untouched.
    fn rehash(&mut self, new_n: usize) -> Result<(), Error> {
        debug_assert!(new_n.is_power_of_two());
        debug_assert!(self.real_size() < new_n);
        let (new_keys, new_values) = allocate_table::<K, V, A>(new_n, self.keys.alloc())?;
        trace!(
            "Rehashing {} entries from {} to {} slots",
            self.size,
            self.n,
            new_n
        );
        let new_mask = new_n - 1;
        let mut i = self.n;
        for _ in 0..self.real_size() {
            i -= 1;
            while self.key_at(i).is_zero_bits() {
                i -= 1;
            }
            let key = self.key_at(i);
            let mut pos = hash::mix(self.strategy.hash(key)) as usize & new_mask;
            unsafe {
                while !(*new_keys.as_ptr().add(pos)).is_zero_bits() {
                    pos = (pos + 1) & new_mask;
                }
                new_keys.as_ptr().add(pos).write(key);
                ptr::copy_nonoverlapping(self.value_ptr(i), new_values.as_ptr().add(pos), 1);
            }
        }
        unsafe {
            new_keys.as_ptr().add(new_n).write(self.key_at(self.n));
            if self.contains_zero_key {
                ptr::copy_nonoverlapping(self.value_ptr(self.n), new_values.as_ptr().add(new_n), 1);
            }
        }
        // The old buffers only release their memory: the values were moved.
        self.keys = new_keys;
        self.values = new_values;
        self.n = new_n;
        self.mask = new_mask;
        self.max_fill = hash::max_fill(new_n, self.load_factor);
        Ok(())
    }

    /// Makes room for `additional` more entries.
    pub fn reserve(&mut self, additional: usize) -> Result<(), Error> {
        self.ensure_capacity(self.size.saturating_add(additional))
    }

    fn ensure_capacity(&mut self, capacity: usize) -> Result<(), Error> {
        let load_factor = self.load_factor;
        let needed = hash::array_size(capacity, load_factor).context(TooLarge {
            expected: capacity,
            load_factor,
        })?;
        if needed > self.n {
            self.rehash(needed)?;
        }
        Ok(())
    }

    /// Like `ensure_capacity`, but clamps oversized requests instead of
    /// failing: the estimate may count keys that are already present.
    fn try_capacity(&mut self, capacity: usize) -> Result<(), Error> {
        let wanted = hash::table_size_for(capacity, self.load_factor);
        let needed = hash::next_power_of_two(wanted).max(2);
        if needed > self.n {
            self.rehash(needed)?;
        }
        Ok(())
    }

    /// Inserts every pair of `iter`.
    ///
    /// The table is sized up front: for load factors up to one half only for
    /// the incoming pairs, otherwise tentatively for the current entries plus
    /// the incoming ones.
    pub fn try_extend<I>(&mut self, iter: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let iter = iter.into_iter();
        let incoming = estimation(&iter);
        if self.load_factor <= 0.5 {
            self.ensure_capacity(incoming)?;
        } else {
            self.try_capacity(self.size.saturating_add(incoming))?;
        }
        for (key, value) in iter {
            self.insert(key, value)?;
        }
        Ok(())
    }

    /// Shrinks the table to the smallest size that holds the current entries.
    ///
    /// Returns `false` only if the smaller table could not be allocated; the
    /// map is unchanged in that case.
    pub fn trim(&mut self) -> bool {
        self.trim_to(self.size)
    }

    /// Shrinks the table to the smallest size that holds `entries` entries,
    /// if that is smaller than the current one. Nothing happens when the
    /// current entries would not fit in that size.
    ///
    /// Useful when a map is cleared and reused, so that it does not keep a
    /// huge table around because of a few large transient contents.
    pub fn trim_to(&mut self, entries: usize) -> bool {
        let wanted = hash::table_size_for(entries, self.load_factor);
        let l = hash::next_power_of_two(wanted).max(2);
        if l >= self.n || self.size > hash::max_fill(l, self.load_factor) {
            return true;
        }
        match self.rehash(l) {
            Ok(()) => true,
            Err(e) => {
                debug!("Unable to trim table to {} slots: {}", l, e);
                false
            }
        }
    }

    /// Tries to copy the map, keeping its exact table layout.
    pub fn try_clone(&self) -> Result<Self, Error>
    where
        V: Clone,
        S: Clone,
    {
        let (keys, values) = allocate_table(self.n, self.keys.alloc())?;
        let mut clone = OpenHashMap {
            keys,
            values,
            contains_zero_key: false,
            n: self.n,
            mask: self.mask,
            max_fill: self.max_fill,
            min_n: self.min_n,
            size: 0,
            load_factor: self.load_factor,
            strategy: S::clone(&self.strategy),
            default_value: V::clone(&self.default_value),
        };
        // Slot by slot, so that a panicking `clone` leaves a consistent copy.
        for pos in (0..self.n).filter(|&pos| self.is_occupied(pos)) {
            let value = unsafe { V::clone(&*self.value_ptr(pos)) };
            unsafe {
                clone.value_ptr(pos).write(value);
                clone.set_key(pos, self.key_at(pos));
            }
            clone.size += 1;
        }
        if self.contains_zero_key {
            let value = unsafe { V::clone(&*self.value_ptr(self.n)) };
            unsafe {
                clone.value_ptr(self.n).write(value);
                clone.set_key(self.n, self.key_at(self.n));
            }
            clone.contains_zero_key = true;
            clone.size += 1;
        }
        Ok(clone)
    }
}

impl<K: Primitive, V, S, A: Alloc> Drop for OpenHashMap<K, V, S, A> {
    fn drop(&mut self) {
        if mem::needs_drop::<V>() {
            self.drop_values();
        }
    }
}

impl<K, V, S, A> Clone for OpenHashMap<K, V, S, A>
where
    K: Primitive,
    V: Clone,
    S: Strategy<K> + Clone,
    A: Alloc + Clone,
{
    fn clone(&self) -> Self {
        self.try_clone().expect("Unable to clone a map")
    }
}

impl<K, V, S1, S2, A1, A2> PartialEq<OpenHashMap<K, V, S2, A2>> for OpenHashMap<K, V, S1, A1>
where
    K: Primitive,
    V: PartialEq,
    A1: Alloc,
    S2: Strategy<K>,
    A2: Alloc + Clone,
{
    fn eq(&self, other: &OpenHashMap<K, V, S2, A2>) -> bool {
        self.len() == other.len() && self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K: Primitive, V: fmt::Debug, S, A: Alloc> fmt::Debug for OpenHashMap<K, V, S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K: Primitive, V, S, A: Alloc> IntoIterator for &'a OpenHashMap<K, V, S, A> {
    type Item = (K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K: Primitive, V, S, A: Alloc> IntoIterator for &'a mut OpenHashMap<K, V, S, A> {
    type Item = (K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{alloc::testing::Capped, hash::NumericStrategy};
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;
    use rand::Rng;
    use std::{collections::HashMap, rc::Rc};

    /// Checks the structural invariants of the table.
    fn check_table<K: Primitive, V, S: Strategy<K>, A: Alloc + Clone>(
        map: &OpenHashMap<K, V, S, A>,
    ) {
        assert!(map.n.is_power_of_two());
        assert_eq!(map.mask, map.n - 1);
        assert!(map.size <= map.max_fill);
        let occupied = (0..map.n).filter(|&pos| map.is_occupied(pos)).count();
        assert_eq!(occupied + map.contains_zero_key as usize, map.size);
        for pos in (0..map.n).filter(|&pos| map.is_occupied(pos)) {
            let key = map.key_at(pos);
            assert_eq!(map.find(key), Ok(pos), "{:?} is not reachable", key);
        }
    }

    #[test]
    fn zero_key_scenario() {
        let mut map = OpenHashMap::<f64, &str>::new().unwrap();
        for (&key, &value) in [0.0, 5.5, -3.2, 0.0].iter().zip(&["a", "b", "c", "d"]) {
            map.insert(key, value).unwrap();
        }
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(0.0), Some(&"d"));
        assert_eq!(map.get(5.5), Some(&"b"));
        assert_eq!(map.get(-3.2), Some(&"c"));
        assert_eq!(map.get(-0.0), None);
        assert!(map.contains_key(0.0));

        assert_eq!(map.remove(0.0), Some("d"));
        assert!(!map.contains_key(0.0));
        assert_eq!(map.remove(0.0), None);
        assert_eq!(map.len(), 2);
        check_table(&map);
    }

    #[test]
    fn default_return_value() {
        let mut map = OpenHashMap::<i32, i64>::new().unwrap();
        map.set_default_return_value(-1);
        assert_eq!(map.put(3, 30).unwrap(), -1);
        assert_eq!(map.put(3, 31).unwrap(), 30);
        assert_eq!(*map.get_or_default_return(3), 31);
        assert_eq!(*map.get_or_default_return(4), -1);
        assert_eq!(map.remove_or_default_return(4), -1);
        assert_eq!(map.remove_or_default_return(3), 31);

        map.put(0, -1).unwrap();
        assert_eq!(*map.get_or_default_return(0), -1);
        assert!(map.contains_key(0));
    }

    #[test]
    fn numeric_strategy_merges_zeroes() {
        let mut map = OpenHashMap::with_strategy(NumericStrategy).unwrap();
        map.insert(-0.0f64, 1).unwrap();
        assert_eq!(map.get(0.0), Some(&1));
        assert_eq!(map.insert(0.0, 2).unwrap(), Some(1));
        // The first inserted representation is kept.
        assert_eq!(map.keys().next().map(f64::to_bits), Some((-0.0f64).to_bits()));
        map.insert(f64::NAN, 3).unwrap();
        assert_eq!(map.get(f64::from_bits(f64::NAN.to_bits() | 1)), Some(&3));
        assert_eq!(map.len(), 2);

        let mut exact = OpenHashMap::new().unwrap();
        exact.insert(-0.0f64, 1).unwrap();
        assert_eq!(exact.get(0.0), None);
        assert_eq!(exact.get(-0.0), Some(&1));
    }

    #[test]
    fn invalid_arguments() {
        assert!(matches!(
            OpenHashMap::<i32, ()>::with_capacity_and_load_factor(4, 1.0),
            Err(Error::InvalidLoadFactor { .. })
        ));
        assert!(matches!(
            OpenHashMap::<i32, ()>::with_capacity_and_load_factor(4, 0.0),
            Err(Error::InvalidLoadFactor { .. })
        ));
        assert!(matches!(
            OpenHashMap::<i32, ()>::with_capacity_and_load_factor(4, f32::NAN),
            Err(Error::InvalidLoadFactor { .. })
        ));
        assert!(matches!(
            OpenHashMap::<i32, ()>::with_capacity(usize::MAX / 2),
            Err(Error::TooLarge { .. })
        ));
        assert!(matches!(
            OpenHashMap::<i32, i32>::from_slices(&[1, 2], &[1]),
            Err(Error::LengthMismatch { keys: 2, values: 1 })
        ));
    }

    #[test]
    fn from_slices() {
        let map = OpenHashMap::from_slices(&['a', 'b', '\0'], &[1u8, 2, 3]).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get('\0'), Some(&3));
        assert_eq!(map.get('b'), Some(&2));
    }

    #[test]
    fn grows_and_shrinks() {
        let mut map = OpenHashMap::<u32, u32>::new().unwrap();
        assert_eq!(map.table_size(), 32);
        for i in 0..1000 {
            map.insert(i, i * 2).unwrap();
        }
        assert_eq!(map.len(), 1000);
        assert!(map.table_size() >= 1024);
        check_table(&map);
        for i in 0..1000 {
            assert_eq!(map.get(i), Some(&(i * 2)));
        }

        let large = map.table_size();
        for i in 10..1000 {
            assert_eq!(map.remove(i), Some(i * 2));
        }
        assert!(map.table_size() < large);
        assert!(map.table_size() >= 32);
        check_table(&map);
        for i in 0..10 {
            assert_eq!(map.get(i), Some(&(i * 2)));
        }
    }

    #[test]
    fn never_shrinks_below_initial_size() {
        let mut map = OpenHashMap::<i64, ()>::with_capacity(1000).unwrap();
        let initial = map.table_size();
        for i in 1..=1000 {
            map.insert(i, ()).unwrap();
        }
        for i in 1..=1000 {
            map.remove(i);
        }
        assert_eq!(map.table_size(), initial);
    }

    #[test]
    fn clear_keeps_table() {
        let mut map = OpenHashMap::<i16, String>::new().unwrap();
        for i in -50..50 {
            map.insert(i, i.to_string()).unwrap();
        }
        let n = map.table_size();
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.table_size(), n);
        assert_eq!(map.get(0), None);
        assert_eq!(map.iter().count(), 0);
        map.insert(0, "zero".to_string()).unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn trim() {
        let mut map = OpenHashMap::<i32, i32>::new().unwrap();
        for i in 0..500 {
            map.insert(i, i).unwrap();
        }
        map.retain(|key, _| key < 3);
        assert_eq!(map.len(), 3);
        let before = map.table_size();
        assert!(map.trim());
        assert!(map.table_size() < before);
        assert_eq!(map.table_size(), 4);
        check_table(&map);
        for i in 0..3 {
            assert_eq!(map.get(i), Some(&i));
        }

        assert!(map.trim_to(100));
        assert_eq!(map.table_size(), 4);
    }

    #[test]
    fn failed_trim_reports_false() {
        let capped = Capped::new(usize::MAX);
        let mut map = OpenHashMap::<u64, u64, _, _>::with_capacity_and_strategy_in(
            4,
            DEFAULT_LOAD_FACTOR,
            DefaultStrategy,
            capped.clone(),
        )
        .unwrap();
        for i in 0..200 {
            map.insert(i, i).unwrap();
        }
        map.retain(|key, _| key == 7);
        capped.set_limit(0);
        assert!(!map.trim());
        assert_eq!(map.get(7), Some(&7));
        capped.set_limit(usize::MAX);
        assert!(map.trim());
        assert_eq!(map.table_size(), 2);
        assert_eq!(map.get(7), Some(&7));
    }

    #[test]
    fn failed_growth_leaves_map_unchanged() {
        let capped = Capped::new(usize::MAX);
        let mut map = OpenHashMap::<i32, i32, _, _>::with_capacity_and_strategy_in(
            0,
            DEFAULT_LOAD_FACTOR,
            DefaultStrategy,
            capped.clone(),
        )
        .unwrap();
        map.insert(1, 1).unwrap();
        capped.set_limit(0);
        let err = map.insert(2, 2).unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(2), None);
        assert_eq!(map.insert(1, 10).unwrap(), Some(1));
        check_table(&map);
    }

    #[test]
    fn drops_values() {
        let rc = Rc::new(());
        {
            let mut map = OpenHashMap::<i32, Rc<()>>::new().unwrap();
            for i in 0..100 {
                map.insert(i, Rc::clone(&rc)).unwrap();
            }
            assert_eq!(Rc::strong_count(&rc), 101);
            map.insert(5, Rc::clone(&rc)).unwrap();
            assert_eq!(Rc::strong_count(&rc), 101);
            for i in 0..50 {
                map.remove(i);
            }
            assert_eq!(Rc::strong_count(&rc), 51);
            let clone = map.clone();
            assert_eq!(Rc::strong_count(&rc), 101);
            drop(clone);
            map.clear();
            assert_eq!(Rc::strong_count(&rc), 1);
            for i in 0..10 {
                map.insert(i, Rc::clone(&rc)).unwrap();
            }
        }
        assert_eq!(Rc::strong_count(&rc), 1);
    }

    #[test]
    fn clone_and_eq() {
        let mut map = OpenHashMap::<f32, Vec<u8>>::new().unwrap();
        for i in 0..40 {
            map.insert(i as f32 / 4.0, vec![i; 3]).unwrap();
        }
        let clone = map.try_clone().unwrap();
        assert_eq!(map, clone);
        map.get_mut(1.0).unwrap().push(1);
        assert_ne!(map, clone);
        map.get_mut(1.0).unwrap().pop();
        map.remove(0.25);
        assert_ne!(map, clone);
    }

    #[test]
    fn extend_and_reserve() {
        let mut map = OpenHashMap::try_from_iter((1..=100).map(|i| (i as u8, i))).unwrap();
        assert_eq!(map.len(), 100);
        map.try_extend((50..=150).map(|i| (i as u8, i * 10))).unwrap();
        assert_eq!(map.len(), 150);
        assert_eq!(map.get(50), Some(&500));
        assert_eq!(map.get(1), Some(&1));
        map.reserve(10_000).unwrap();
        assert!(map.capacity() >= 10_150);
        check_table(&map);

        let mut sparse =
            OpenHashMap::<i32, i32>::with_capacity_and_load_factor(0, hash::FAST_LOAD_FACTOR)
                .unwrap();
        sparse.try_extend((0..64).map(|i| (i, i))).unwrap();
        assert_eq!(sparse.table_size(), 128);
        assert_eq!(sparse.len(), 64);
    }

    #[test]
    fn sized_from_lower_bounds() {
        let map =
            OpenHashMap::try_from_iter((0..u64::MAX).take_while(|&x| x < 3).map(|x| (x, x)))
                .unwrap();
        assert_eq!(map.len(), 3);
        assert!(map.table_size() <= 8);
        check_table(&map);

        let mut grown = OpenHashMap::<u64, u64>::new().unwrap();
        grown
            .try_extend((0..u64::MAX).take_while(|&x| x < 3).map(|x| (x, x)))
            .unwrap();
        assert_eq!(grown, map);

        let data: Vec<u32> = (0..100_000).collect();
        let mut filtered =
            OpenHashMap::try_from_iter(data.iter().filter(|&&x| x <= 3).map(|&x| (x, x))).unwrap();
        assert_eq!(filtered.len(), 4);
        for i in 10..1000 {
            filtered.insert(i, i).unwrap();
        }
        for i in 10..1000 {
            assert_eq!(filtered.remove(i), Some(i));
        }
        assert!(filtered.table_size() <= DEFAULT_INITIAL_SIZE);
        check_table(&filtered);
    }

    #[test]
    fn huge_trim_targets() {
        assert_eq!(
            hash::table_size_for(usize::MAX, DEFAULT_LOAD_FACTOR),
            hash::MAXIMUM_TABLE_SIZE
        );
        let mut map = OpenHashMap::<i32, i32>::new().unwrap();
        map.insert(1, 1).unwrap();
        let before = map.table_size();
        assert!(map.trim_to(usize::MAX));
        assert_eq!(map.table_size(), before);
        assert_eq!(map.get(1), Some(&1));
    }

    #[test]
    fn debug_output() {
        let map = OpenHashMap::from_slices(&[7i32], &["seven"]).unwrap();
        assert_eq!(format!("{:?}", map), r#"{7: "seven"}"#);
    }

    #[derive(Debug, Clone)]
    enum Action {
        Insert(f64, u16),
        Remove(f64),
        Get(f64),
        Clear,
        Trim,
        RemoveDuringTraversal(usize),
    }

    fn arbitrary_key<G: Gen>(g: &mut G) -> f64 {
        match g.gen_range(0, 10) {
            0 => 0.0,
            1 => -0.0,
            _ => f64::from(g.gen_range(-40i32, 40)) / 2.0,
        }
    }

    impl Arbitrary for Action {
        fn arbitrary<G: Gen>(g: &mut G) -> Self {
            match g.gen_range(0, 20) {
                0..=8 => Action::Insert(arbitrary_key(g), u16::arbitrary(g)),
                9..=13 => Action::Remove(arbitrary_key(g)),
                14..=16 => Action::Get(arbitrary_key(g)),
                17 => Action::Clear,
                18 => Action::Trim,
                19 => Action::RemoveDuringTraversal(g.gen_range(1, 4)),
                _ => unreachable!(),
            }
        }
    }

    #[quickcheck]
    fn behaves_like_std(actions: Vec<Action>) {
        let mut map = OpenHashMap::<f64, u16>::with_capacity(4).unwrap();
        let mut reference = HashMap::<u64, u16>::new();

        for action in actions {
            match action {
                Action::Insert(key, value) => {
                    let result = map.insert(key, value).unwrap();
                    assert_eq!(result, reference.insert(key.to_bits(), value));
                }
                Action::Remove(key) => {
                    assert_eq!(map.remove(key), reference.remove(&key.to_bits()));
                }
                Action::Get(key) => {
                    assert_eq!(map.get(key), reference.get(&key.to_bits()));
                    assert_eq!(map.contains_key(key), reference.contains_key(&key.to_bits()));
                }
                Action::Clear => {
                    map.clear();
                    reference.clear();
                }
                Action::Trim => assert!(map.trim()),
                Action::RemoveDuringTraversal(every) => {
                    let mut cursor = map.cursor();
                    let mut idx = 0;
                    while let Some(entry) = cursor.next() {
                        let key = entry.key();
                        idx += 1;
                        if idx % every == 0 {
                            let value = cursor.remove().unwrap();
                            assert_eq!(reference.remove(&key.to_bits()), Some(value));
                        }
                    }
                }
            }
            assert_eq!(map.len(), reference.len());
        }

        check_table(&map);
        let mut collected: Vec<(u64, u16)> =
            map.iter().map(|(key, &value)| (key.to_bits(), value)).collect();
        let mut expected: Vec<(u64, u16)> = reference.into_iter().collect();
        collected.sort_unstable();
        expected.sort_unstable();
        assert_eq!(collected, expected);
    }

    #[quickcheck]
    fn removals_keep_remaining_reachable(keys: Vec<i32>, removed: Vec<usize>) {
        let mut map = OpenHashMap::<i32, i32>::with_capacity(0).unwrap();
        for &key in &keys {
            map.insert(key, key.wrapping_mul(3)).unwrap();
        }
        let mut gone = std::collections::HashSet::new();
        for idx in removed {
            if keys.is_empty() {
                break;
            }
            let key = keys[idx % keys.len()];
            map.remove(key);
            gone.insert(key);
        }
        check_table(&map);
        for &key in &keys {
            if gone.contains(&key) {
                assert_eq!(map.get(key), None);
            } else {
                assert_eq!(map.get(key), Some(&key.wrapping_mul(3)));
            }
        }
    }
}
