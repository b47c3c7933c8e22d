//! Small sets stored as a plain array.
//!
//! Membership is a linear scan, which beats hashing for a handful of
//! elements and keeps the memory footprint to the elements themselves.

use crate::{
    alloc::{Alloc, Global},
    hash::Primitive,
    open_hash_map::{self, OpenHashMap},
    raw_vec::{self, RawVec},
    traverse::SliceSplit,
};
use core::{fmt, iter::Copied, mem::ManuallyDrop, ptr, slice};
use snafu::{ensure, ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Duplicate element: {}", element))]
    DuplicateElement { element: String },

    #[snafu(display(
        "The provided size ({}) is larger than the array ({})",
        size,
        len
    ))]
    SizeExceedsArray { size: usize, len: usize },

    #[snafu(display("There is no current element to remove"))]
    NoCurrentElement,

    #[snafu(display("Unable to grow the set: {}", source))]
    Storage { source: raw_vec::Error },

    #[snafu(display("Unable to check the elements for duplicates: {}", source))]
    Scratch { source: open_hash_map::Error },
}

/// A set of primitives kept in insertion order in a flat array.
///
/// Elements are compared by their bit patterns, so `0.0` and `-0.0` are
/// different elements.
///
/// ```
/// use primitive_collections::ArraySet;
///
/// let mut set = ArraySet::of(&[1.0, 2.0]).unwrap();
/// assert!(set.add(3.0).unwrap());
/// assert!(!set.add(2.0).unwrap());
/// assert!(set.remove(1.0));
/// assert_eq!(set.as_slice(), &[2.0, 3.0]);
/// ```
pub struct ArraySet<T: Primitive, A: Alloc = Global> {
    buf: RawVec<T, A>,
    len: usize,
}

impl<T: Primitive> ArraySet<T> {
    /// Creates an empty set, without allocating.
    pub fn new() -> Self {
        ArraySet {
            buf: RawVec::new_in(Global),
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, Error> {
        Self::with_capacity_in(capacity, Global)
    }

    /// Wraps a vector without copying it.
    ///
    /// The elements are not checked for duplicates: it is up to the caller
    /// to make sure there are none.
    pub fn from_vec_unchecked(vec: Vec<T>) -> Self {
        let len = vec.len();
        Self::adopt(vec, len)
    }

    /// Wraps the first `size` elements of a vector, without copying it.
    ///
    /// The elements are not checked for duplicates.
    pub fn from_vec_with_size(vec: Vec<T>, size: usize) -> Result<Self, Error> {
        ensure!(
            size <= vec.len(),
            SizeExceedsArray {
                size,
                len: vec.len()
            }
        );
        Ok(Self::adopt(vec, size))
    }

    fn adopt(vec: Vec<T>, len: usize) -> Self {
        let mut vec = ManuallyDrop::new(vec);
        let (ptr, capacity) = (vec.as_mut_ptr(), vec.capacity());
        // The vector's buffer comes from the global allocator.
        let buf = unsafe { RawVec::from_raw_parts_in(ptr, capacity, Global) };
        ArraySet { buf, len }
    }

    /// Creates a set holding `elements`, failing if any of them is repeated.
    pub fn of(elements: &[T]) -> Result<Self, Error> {
        match elements {
            [a, b] => ensure!(
                !a.bits_eq(*b),
                DuplicateElement {
                    element: format!("{:?}", b)
                }
            ),
            [_, _, _, ..] => {
                let mut seen = OpenHashMap::<T, ()>::with_capacity(elements.len()).context(Scratch)?;
                for &element in elements {
                    ensure!(
                        seen.insert(element, ()).context(Scratch)?.is_none(),
                        DuplicateElement {
                            element: format!("{:?}", element)
                        }
                    );
                }
            }
            _ => {}
        }
        Self::of_unchecked(elements)
    }

    /// Creates a set holding `elements`, which are not checked for
    /// duplicates.
    pub fn of_unchecked(elements: &[T]) -> Result<Self, Error> {
        let mut set = Self::with_capacity(elements.len())?;
        unsafe {
            ptr::copy_nonoverlapping(elements.as_ptr(), set.buf.as_ptr(), elements.len());
        }
        set.len = elements.len();
        Ok(set)
    }

    /// Tries to collect an iterator into a set; repeated elements are
    /// skipped.
    pub fn try_from_iter<I: IntoIterator<Item = T>>(iter: I) -> Result<Self, Error> {
        let mut set = Self::new();
        for element in iter {
            set.add(element)?;
        }
        Ok(set)
    }
}

impl<T: Primitive> Default for ArraySet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Primitive, A: Alloc> ArraySet<T, A> {
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Result<Self, Error> {
        Ok(ArraySet {
            buf: RawVec::with_capacity_in(capacity, alloc).context(Storage)?,
            len: 0,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn as_slice(&self) -> &[T] {
        unsafe { slice::from_raw_parts(self.buf.as_ptr(), self.len) }
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }

    pub fn iter(&self) -> Copied<slice::Iter<'_, T>> {
        self.as_slice().iter().copied()
    }

    pub fn split_iter(&self) -> SliceSplit<'_, T> {
        SliceSplit::new(self.as_slice())
    }

    /// Position of `element`, scanning from the end.
    fn find(&self, element: T) -> Option<usize> {
        self.as_slice().iter().rposition(|x| x.bits_eq(element))
    }

    pub fn contains(&self, element: T) -> bool {
        self.find(element).is_some()
    }

    /// Adds `element` unless it is already there. Returns whether the set
    /// changed.
    pub fn add(&mut self, element: T) -> Result<bool, Error> {
        if self.contains(element) {
            return Ok(false);
        }
        if self.len == self.buf.capacity() {
            self.buf.try_reserve(self.len, 1, 2).context(Storage)?;
        }
        unsafe { self.buf.as_ptr().add(self.len).write(element) };
        self.len += 1;
        Ok(true)
    }

    /// Removes `element`, shifting the following ones left. Returns whether
    /// it was there.
    pub fn remove(&mut self, element: T) -> bool {
        match self.find(element) {
            Some(pos) => {
                self.remove_at(pos);
                true
            }
            None => false,
        }
    }

    fn remove_at(&mut self, pos: usize) {
        debug_assert!(pos < self.len);
        let tail = self.len - pos - 1;
        unsafe {
            let base = self.buf.as_ptr();
            ptr::copy(base.add(pos + 1), base.add(pos), tail);
        }
        self.len -= 1;
    }

    /// Removes every element, keeping the buffer.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Keeps only the elements for which `keep` returns `true`, in order.
    pub fn retain<F: FnMut(T) -> bool>(&mut self, mut keep: F) {
        let base = self.buf.as_ptr();
        let mut kept = 0;
        for i in 0..self.len {
            let element = unsafe { base.add(i).read() };
            if keep(element) {
                unsafe { base.add(kept).write(element) };
                kept += 1;
            }
        }
        self.len = kept;
    }

    /// A traversal that can remove the elements it visits.
    pub fn cursor(&mut self) -> Cursor<'_, T, A> {
        Cursor {
            set: self,
            next: 0,
            can_remove: false,
        }
    }

    pub fn try_clone(&self) -> Result<Self, Error>
    where
        A: Clone,
    {
        let mut clone = Self::with_capacity_in(self.len, self.buf.alloc().clone())?;
        unsafe {
            ptr::copy_nonoverlapping(self.buf.as_ptr(), clone.buf.as_ptr(), self.len);
        }
        clone.len = self.len;
        Ok(clone)
    }
}

impl<T: Primitive, A: Alloc + Clone> Clone for ArraySet<T, A> {
    fn clone(&self) -> Self {
        self.try_clone().expect("Unable to clone a set")
    }
}

/// Set equality: the same elements, in any order.
impl<T: Primitive, A1: Alloc, A2: Alloc> PartialEq<ArraySet<T, A2>> for ArraySet<T, A1> {
    fn eq(&self, other: &ArraySet<T, A2>) -> bool {
        self.len() == other.len() && self.iter().all(|x| other.contains(x))
    }
}

impl<T: Primitive, A: Alloc> fmt::Debug for ArraySet<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.as_slice()).finish()
    }
}

impl<'a, T: Primitive, A: Alloc> IntoIterator for &'a ArraySet<T, A> {
    type Item = T;
    type IntoIter = Copied<slice::Iter<'a, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A traversal of an [`ArraySet`] that can remove the element it is on.
pub struct Cursor<'a, T: Primitive, A: Alloc> {
    set: &'a mut ArraySet<T, A>,
    next: usize,
    can_remove: bool,
}

impl<T: Primitive, A: Alloc> Cursor<'_, T, A> {
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<T> {
        let element = *self.set.as_slice().get(self.next)?;
        self.next += 1;
        self.can_remove = true;
        Some(element)
    }

    /// Skips up to `n` elements, returning how many were skipped.
    pub fn skip(&mut self, n: usize) -> usize {
        let skipped = n.min(self.set.len - self.next);
        self.next += skipped;
        self.can_remove = false;
        skipped
    }

    /// Removes the element returned by the last call to
    /// [`next`](Self::next).
    pub fn remove(&mut self) -> Result<(), Error> {
        ensure!(self.can_remove, NoCurrentElement);
        self.can_remove = false;
        self.next -= 1;
        self.set.remove_at(self.next);
        Ok(())
    }
}

#[cfg(feature = "serde")]
mod persist {
    use super::ArraySet;
    use crate::{alloc::Alloc, hash::Primitive};
    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

    impl<T: Primitive + Serialize, A: Alloc> Serialize for ArraySet<T, A> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(self.as_slice())
        }
    }

    /// Repeated elements are rejected.
    impl<'de, T: Primitive + Deserialize<'de>> Deserialize<'de> for ArraySet<T> {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let elements = Vec::<T>::deserialize(deserializer)?;
            ArraySet::of(&elements).map_err(D::Error::custom)
        }
    }

    #[cfg(test)]
    mod test {
        use crate::ArraySet;

        #[test]
        fn json_round_trip() {
            let set = ArraySet::of(&[3u16, 1, 2]).unwrap();
            let json = serde_json::to_string(&set).unwrap();
            assert_eq!(json, "[3,1,2]");
            let back: ArraySet<u16> = serde_json::from_str(&json).unwrap();
            assert_eq!(back.as_slice(), set.as_slice());
            assert!(serde_json::from_str::<ArraySet<u16>>("[1,2,1]").is_err());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::alloc::NoOp;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;
    use rand::Rng;
    use std::collections::HashSet;

    #[test]
    fn duplicates() {
        let err = ArraySet::of(&[1.0, 2.0, 2.0]).unwrap_err();
        assert!(matches!(err, Error::DuplicateElement { .. }));
        assert_eq!(err.to_string(), "Duplicate element: 2.0");
        assert!(matches!(
            ArraySet::of(&['x', 'x']),
            Err(Error::DuplicateElement { .. })
        ));

        let set = ArraySet::of_unchecked(&[1.0, 2.0, 2.0]).unwrap();
        assert_eq!(set.len(), 3);

        let set = ArraySet::of(&[0.0, -0.0]).unwrap();
        assert_eq!(set.len(), 2);
        assert!(ArraySet::<u8>::of(&[]).unwrap().is_empty());
    }

    #[test]
    fn wraps_vectors() {
        let set = ArraySet::from_vec_with_size(vec![1, 2, 3, 4], 2).unwrap();
        assert_eq!(set.as_slice(), &[1, 2]);
        assert!(!set.contains(3));
        assert_eq!(set.capacity(), 4);
        assert!(matches!(
            ArraySet::from_vec_with_size(vec![1, 2], 3),
            Err(Error::SizeExceedsArray { size: 3, len: 2 })
        ));
        let set = ArraySet::from_vec_unchecked(vec![true, false]);
        assert_eq!(set.to_vec(), vec![true, false]);
    }

    #[test]
    fn growth() {
        let mut set = ArraySet::new();
        assert_eq!(set.capacity(), 0);
        assert!(set.add(5i64).unwrap());
        assert_eq!(set.capacity(), 2);
        set.add(6).unwrap();
        set.add(7).unwrap();
        assert_eq!(set.capacity(), 4);
        assert!(!set.add(6).unwrap());
        assert_eq!(set.len(), 3);

        let mut fixed = ArraySet::with_capacity_in(0, NoOp).unwrap();
        assert!(matches!(fixed.add(1u8), Err(Error::Storage { .. })));
        assert!(fixed.is_empty());
    }

    #[test]
    fn remove_shifts() {
        let mut set = ArraySet::of(&[1u32, 2, 3, 4]).unwrap();
        assert!(set.remove(2));
        assert!(!set.remove(2));
        assert_eq!(set.as_slice(), &[1, 3, 4]);
        assert!(set.remove(4));
        assert_eq!(set.as_slice(), &[1, 3]);
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn cursor_removal() {
        let mut set = ArraySet::of(&[1i32, 2, 3, 4, 5]).unwrap();
        let mut cursor = set.cursor();
        assert!(matches!(cursor.remove(), Err(Error::NoCurrentElement)));
        while let Some(x) = cursor.next() {
            if x % 2 == 1 {
                cursor.remove().unwrap();
            }
        }
        assert!(matches!(cursor.remove(), Err(Error::NoCurrentElement)));
        assert_eq!(set.as_slice(), &[2, 4]);

        let mut cursor = set.cursor();
        assert_eq!(cursor.skip(1), 1);
        assert_eq!(cursor.next(), Some(4));
        assert_eq!(cursor.skip(3), 0);
    }

    #[test]
    fn set_semantics() {
        let a = ArraySet::of(&[1i8, 2, 3]).unwrap();
        let b = ArraySet::of(&[3i8, 1, 2]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.clone(), a);
        assert_ne!(a, ArraySet::of(&[1, 2]).unwrap());
        assert_eq!(format!("{:?}", a), "{1, 2, 3}");

        let mut c = a.try_clone().unwrap();
        c.retain(|x| x != 2);
        assert_eq!(c.as_slice(), &[1, 3]);
        assert_eq!((&c).into_iter().sum::<i8>(), 4);
        assert_eq!(c.split_iter().count(), 2);
    }

    #[derive(Debug, Clone)]
    enum Action {
        Add(i16),
        Remove(i16),
        Contains(i16),
        Clear,
    }

    impl Arbitrary for Action {
        fn arbitrary<G: Gen>(g: &mut G) -> Self {
            match g.gen_range(0, 12) {
                0..=5 => Action::Add(g.gen_range(-16, 16)),
                6..=8 => Action::Remove(g.gen_range(-16, 16)),
                9..=10 => Action::Contains(g.gen_range(-16, 16)),
                11 => Action::Clear,
                _ => unreachable!(),
            }
        }
    }

    #[quickcheck]
    fn behaves_like_std(actions: Vec<Action>) {
        let mut set = ArraySet::new();
        let mut reference = HashSet::new();
        for action in actions {
            match action {
                Action::Add(x) => assert_eq!(set.add(x).unwrap(), reference.insert(x)),
                Action::Remove(x) => assert_eq!(set.remove(x), reference.remove(&x)),
                Action::Contains(x) => assert_eq!(set.contains(x), reference.contains(&x)),
                Action::Clear => {
                    set.clear();
                    reference.clear();
                }
            }
            assert_eq!(set.len(), reference.len());
        }
        let elements: HashSet<i16> = set.iter().collect();
        assert_eq!(elements.len(), set.len());
        assert_eq!(elements, reference);
    }

    #[quickcheck]
    fn of_accepts_only_distinct(elements: Vec<u8>) -> bool {
        let distinct = elements.iter().collect::<HashSet<_>>().len() == elements.len();
        ArraySet::of(&elements).is_ok() == distinct
    }
}
