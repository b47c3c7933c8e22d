//! Splittable traversals.
//!
//! A [`Spliterator`] is an iterator that can hand out a part of what it has
//! left, so that a container can be walked by several threads at once. The
//! parts are disjoint and, taken in the order they were handed out (each
//! prefix before what remains of its source), cover the traversal in
//! encounter order.
//!
//! None of the traversals here detect concurrent modification: they borrow
//! their container, so the borrow checker rules it out.

/// An iterator that can be split into disjoint parts.
pub trait Spliterator: Iterator + Sized {
    /// Splits off a prefix of the remaining elements, or returns `None` if
    /// there is too little left to be worth splitting.
    fn try_split(&mut self) -> Option<Self>;

    /// An estimate of the number of elements left.
    fn estimate_size(&self) -> usize;

    /// Whether [`estimate_size`](Self::estimate_size) is exact.
    fn is_exact(&self) -> bool {
        true
    }
}

/// Splits `root` until every part is estimated to hold at most `threshold`
/// elements or refuses to split further. Parts are returned in encounter
/// order.
pub fn split_all<S: Spliterator>(root: S, threshold: usize) -> Vec<S> {
    let mut pending = vec![root];
    let mut parts = Vec::new();
    while let Some(mut part) = pending.pop() {
        if part.estimate_size() > threshold {
            if let Some(prefix) = part.try_split() {
                pending.push(part);
                pending.push(prefix);
                continue;
            }
        }
        parts.push(part);
    }
    parts
}

/// A splittable traversal of a slice, for the array backed containers.
#[derive(Debug)]
pub struct SliceSplit<'a, T> {
    rest: &'a [T],
}

impl<T> Clone for SliceSplit<'_, T> {
    fn clone(&self) -> Self {
        SliceSplit { rest: self.rest }
    }
}

impl<'a, T> SliceSplit<'a, T> {
    pub fn new(slice: &'a [T]) -> Self {
        SliceSplit { rest: slice }
    }

    /// What is left to traverse.
    pub fn as_slice(&self) -> &'a [T] {
        self.rest
    }
}

impl<'a, T> Iterator for SliceSplit<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let (first, rest) = self.rest.split_first()?;
        self.rest = rest;
        Some(first)
    }

    fn nth(&mut self, n: usize) -> Option<&'a T> {
        let skipped = n.min(self.rest.len());
        self.rest = &self.rest[skipped..];
        self.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.rest.len(), Some(self.rest.len()))
    }
}

impl<T> ExactSizeIterator for SliceSplit<'_, T> {}
impl<T> core::iter::FusedIterator for SliceSplit<'_, T> {}

impl<T> Spliterator for SliceSplit<'_, T> {
    fn try_split(&mut self) -> Option<Self> {
        let half = self.rest.len() >> 1;
        if half <= 1 {
            return None;
        }
        let (prefix, rest) = self.rest.split_at(half);
        self.rest = rest;
        Some(SliceSplit { rest: prefix })
    }

    fn estimate_size(&self) -> usize {
        self.rest.len()
    }
}

/// How many items an iterator is sure to yield, for sizing storage up front.
///
/// Only the lower bound is trusted: filtering adaptors report loose upper
/// bounds that may be far beyond what is actually produced.
pub(crate) fn estimation<I: Iterator>(iter: &I) -> usize {
    iter.size_hint().0
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn split_halves() {
        let data = [1, 2, 3, 4, 5, 6, 7];
        let mut split = SliceSplit::new(&data);
        let prefix = split.try_split().unwrap();
        assert_eq!(prefix.as_slice(), &[1, 2, 3]);
        assert_eq!(split.as_slice(), &[4, 5, 6, 7]);
        assert_eq!(split.nth(2), Some(&6));
        assert_eq!(split.estimate_size(), 1);
        assert!(split.try_split().is_none());
    }

    #[test]
    fn tiny_slices_stay_whole() {
        let data = [1u8, 2, 3];
        let mut split = SliceSplit::new(&data);
        assert!(split.try_split().is_none());
        assert_eq!(split_all(split, 0).len(), 1);
    }

    #[test]
    fn sum_on_threads() {
        let data: Vec<u64> = (1..=10_000).collect();
        let parts = split_all(SliceSplit::new(&data), 512);
        assert!(parts.len() >= 16);
        let total: u64 = std::thread::scope(|scope| {
            let handles: Vec<_> = parts
                .into_iter()
                .map(|part| scope.spawn(move || part.sum::<u64>()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(total, 10_000 * 10_001 / 2);
    }

    #[quickcheck]
    fn parts_keep_encounter_order(data: Vec<u16>, threshold: u8) -> bool {
        let parts = split_all(SliceSplit::new(&data), usize::from(threshold));
        let joined: Vec<u16> = parts.into_iter().flatten().copied().collect();
        joined == data
    }
}
