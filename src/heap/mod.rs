//! Array based binary heaps.

use crate::{
    alloc::{Alloc, Global},
    hash::Primitive,
    order::{Comparator, Natural},
    raw_vec::{self, RawVec},
    traverse::{estimation, SliceSplit},
};
use core::{
    fmt,
    mem::{self, ManuallyDrop},
    ops::{Deref, DerefMut},
    ptr, slice,
};
use log::debug;
use snafu::{ensure, OptionExt, ResultExt, Snafu};

mod sift;

pub use sift::{down_heap, is_heap, make_heap, up_heap};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("The queue is empty"))]
    NoSuchElement,

    #[snafu(display("Unable to grow the queue: {}", source))]
    Storage { source: raw_vec::Error },
}

/// A priority queue backed by a binary heap: the least element (according
/// to the comparator) comes out first.
///
/// ```
/// use primitive_collections::HeapPriorityQueue;
///
/// let mut queue = HeapPriorityQueue::from_vec(vec![5, 3, 8, 1, 9, 2]);
/// let mut sorted = Vec::new();
/// while let Ok(x) = queue.dequeue() {
///     sorted.push(x);
/// }
/// assert_eq!(sorted, [1, 2, 3, 5, 8, 9]);
/// ```
pub struct HeapPriorityQueue<T, C = Natural, A: Alloc = Global> {
    buf: RawVec<T, A>,
    len: usize,
    comparator: C,
}

impl<T: Primitive> HeapPriorityQueue<T> {
    /// Creates an empty queue in natural order, without allocating.
    pub fn new() -> Self {
        Self::with_comparator(Natural)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, Error> {
        Self::with_capacity_and_comparator_in(capacity, Natural, Global)
    }

    /// Turns a vector into a queue in natural order, reusing its buffer.
    pub fn from_vec(vec: Vec<T>) -> Self {
        Self::from_vec_with_comparator(vec, Natural)
    }

    /// Tries to build a queue in natural order out of an iterator.
    pub fn try_from_iter<I: IntoIterator<Item = T>>(iter: I) -> Result<Self, Error> {
        Self::try_from_iter_with_comparator(iter, Natural)
    }
}

impl<T: Primitive> Default for HeapPriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Comparator<T>> HeapPriorityQueue<T, C> {
    pub fn with_comparator(comparator: C) -> Self {
        HeapPriorityQueue {
            buf: RawVec::new_in(Global),
            len: 0,
            comparator,
        }
    }

    /// Turns a vector into a queue, reusing its buffer. Building the heap
    /// takes linear time.
    pub fn from_vec_with_comparator(vec: Vec<T>, comparator: C) -> Self {
        let mut vec = ManuallyDrop::new(vec);
        let (ptr, len, capacity) = (vec.as_mut_ptr(), vec.len(), vec.capacity());
        // The vector's buffer comes from the global allocator.
        let buf = unsafe { RawVec::from_raw_parts_in(ptr, capacity, Global) };
        let mut queue = HeapPriorityQueue {
            buf,
            len,
            comparator,
        };
        let (heap, c) = queue.parts();
        make_heap(heap, c);
        queue
    }

    pub fn try_from_iter_with_comparator<I>(iter: I, comparator: C) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
    {
        let iter = iter.into_iter();
        let mut queue =
            Self::with_capacity_and_comparator_in(estimation(&iter), comparator, Global)?;
        for x in iter {
            queue.push_unordered(x)?;
        }
        let (heap, c) = queue.parts();
        make_heap(heap, c);
        Ok(queue)
    }

    /// Takes the elements out, least first.
    pub fn into_sorted_vec(mut self) -> Vec<T> {
        {
            let (heap, c) = self.parts();
            for end in (1..heap.len()).rev() {
                heap.swap(0, end);
                down_heap(&mut heap[..end], 0, c);
            }
            // The loop sorts greatest first.
            heap.reverse();
        }
        let me = ManuallyDrop::new(self);
        unsafe {
            drop(ptr::read(&me.comparator));
            let buf = ManuallyDrop::new(ptr::read(&me.buf));
            Vec::from_raw_parts(buf.as_ptr(), me.len, buf.capacity())
        }
    }
}

impl<T, C: Comparator<T>, A: Alloc> HeapPriorityQueue<T, C, A> {
    pub fn with_capacity_and_comparator_in(
        capacity: usize,
        comparator: C,
        alloc: A,
    ) -> Result<Self, Error> {
        Ok(HeapPriorityQueue {
            buf: RawVec::with_capacity_in(capacity, alloc).context(Storage)?,
            len: 0,
            comparator,
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

    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    /// The elements in heap order.
    pub fn as_slice(&self) -> &[T] {
        unsafe { slice::from_raw_parts(self.buf.as_ptr(), self.len) }
    }

    /// The elements in heap order (not sorted).
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn split_iter(&self) -> SliceSplit<'_, T> {
        SliceSplit::new(self.as_slice())
    }

    /// The heap and its comparator, borrowed apart.
    fn parts(&mut self) -> (&mut [T], &C) {
        let heap = unsafe { slice::from_raw_parts_mut(self.buf.as_ptr(), self.len) };
        (heap, &self.comparator)
    }

    /// Appends `x` without restoring the heap property.
    fn push_unordered(&mut self, x: T) -> Result<(), Error> {
        if self.len == self.buf.capacity() {
            self.buf.try_reserve(self.len, 1, 2).context(Storage)?;
        }
        unsafe { self.buf.as_ptr().add(self.len).write(x) };
        self.len += 1;
        Ok(())
    }

    /// Adds an element. Amortized `O(log n)`.
    pub fn enqueue(&mut self, x: T) -> Result<(), Error> {
        self.push_unordered(x)?;
        let (heap, c) = self.parts();
        let last = heap.len() - 1;
        up_heap(heap, last, c);
        Ok(())
    }

    /// Removes and returns the least element.
    pub fn dequeue(&mut self) -> Result<T, Error> {
        ensure!(self.len != 0, NoSuchElement);
        self.len -= 1;
        let last = unsafe { self.buf.as_ptr().add(self.len).read() };
        if self.len == 0 {
            return Ok(last);
        }
        let (heap, c) = self.parts();
        let first = mem::replace(&mut heap[0], last);
        down_heap(heap, 0, c);
        Ok(first)
    }

    /// The least element.
    pub fn first(&self) -> Result<&T, Error> {
        self.as_slice().first().context(NoSuchElement)
    }

    /// Mutable access to the least element. The heap is fixed up when the
    /// returned guard is dropped.
    pub fn first_mut(&mut self) -> Result<FirstMut<'_, T, C, A>, Error> {
        ensure!(self.len != 0, NoSuchElement);
        Ok(FirstMut { queue: self })
    }

    /// Restores the heap after the least element was changed in place.
    pub fn changed(&mut self) {
        if self.len != 0 {
            let (heap, c) = self.parts();
            down_heap(heap, 0, c);
        }
    }

    /// Drops every element, keeping the buffer.
    pub fn clear(&mut self) {
        let elements = ptr::slice_from_raw_parts_mut(self.buf.as_ptr(), self.len);
        self.len = 0;
        unsafe { ptr::drop_in_place(elements) };
    }

    /// Shrinks the buffer to the number of elements. Returns `false` if the
    /// smaller buffer could not be allocated, leaving the queue unchanged.
    pub fn trim(&mut self) -> bool {
        match self.buf.shrink_to_fit(self.len) {
            Ok(()) => true,
            Err(e) => {
                debug!("Unable to trim a queue to {} elements: {}", self.len, e);
                false
            }
        }
    }

    pub fn try_clone(&self) -> Result<Self, Error>
    where
        T: Clone,
        C: Clone,
        A: Clone,
    {
        let buf: RawVec<T, A> =
            RawVec::with_capacity_in(self.len, self.buf.alloc().clone()).context(Storage)?;
        let mut clone = HeapPriorityQueue {
            buf,
            len: 0,
            comparator: self.comparator.clone(),
        };
        for (i, x) in self.iter().enumerate() {
            unsafe { clone.buf.as_ptr().add(i).write(x.clone()) };
            clone.len += 1;
        }
        Ok(clone)
    }
}

impl<T, C, A: Alloc> Drop for HeapPriorityQueue<T, C, A> {
    fn drop(&mut self) {
        let elements = ptr::slice_from_raw_parts_mut(self.buf.as_ptr(), self.len);
        unsafe { ptr::drop_in_place(elements) };
    }
}

impl<T: Clone, C: Comparator<T> + Clone, A: Alloc + Clone> Clone for HeapPriorityQueue<T, C, A> {
    fn clone(&self) -> Self {
        self.try_clone().expect("Unable to clone a queue")
    }
}

impl<T: fmt::Debug, C: Comparator<T>, A: Alloc> fmt::Debug for HeapPriorityQueue<T, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<'a, T, C: Comparator<T>, A: Alloc> IntoIterator for &'a HeapPriorityQueue<T, C, A> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Write access to the least element of a [`HeapPriorityQueue`].
pub struct FirstMut<'a, T, C: Comparator<T>, A: Alloc> {
    queue: &'a mut HeapPriorityQueue<T, C, A>,
}

impl<T, C: Comparator<T>, A: Alloc> Deref for FirstMut<'_, T, C, A> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.queue.as_slice()[0]
    }
}

impl<T, C: Comparator<T>, A: Alloc> DerefMut for FirstMut<'_, T, C, A> {
    fn deref_mut(&mut self) -> &mut T {
        let (heap, _) = self.queue.parts();
        &mut heap[0]
    }
}

impl<T, C: Comparator<T>, A: Alloc> Drop for FirstMut<'_, T, C, A> {
    fn drop(&mut self) {
        self.queue.changed();
    }
}

#[cfg(feature = "serde")]
mod persist {
    use super::HeapPriorityQueue;
    use crate::{alloc::Alloc, order::Comparator};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Written as the sequence of elements in heap order.
    impl<T: Serialize, C: Comparator<T>, A: Alloc> Serialize for HeapPriorityQueue<T, C, A> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(self.as_slice())
        }
    }

    /// The heap is rebuilt, so any sequence is accepted.
    impl<'de, T, C> Deserialize<'de> for HeapPriorityQueue<T, C>
    where
        T: Deserialize<'de>,
        C: Comparator<T> + Default,
    {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let elements = Vec::<T>::deserialize(deserializer)?;
            Ok(HeapPriorityQueue::from_vec_with_comparator(elements, C::default()))
        }
    }

}
