//! Binary heap routines over plain slices.
//!
//! The heap is laid out level by level: the children of slot `i` are
//! `2i + 1` and `2i + 2`, and no element compares smaller than its parent,
//! so the least element sits at slot 0. Sifting moves a hole through the
//! slice and writes the sifted element only once, at its final slot.

use crate::order::Comparator;
use core::{cmp::Ordering, mem::ManuallyDrop, ptr};

/// An element taken out of a slice, leaving a hole that is filled back when
/// the `Hole` is dropped, even during a panic.
struct Hole<'a, T> {
    data: &'a mut [T],
    elt: ManuallyDrop<T>,
    pos: usize,
}

impl<'a, T> Hole<'a, T> {
    /// # Safety
    ///
    /// `pos` must be in bounds.
    #[inline]
    unsafe fn new(data: &'a mut [T], pos: usize) -> Self {
        debug_assert!(pos < data.len());
        let elt = ptr::read(data.get_unchecked(pos));
        Hole {
            data,
            elt: ManuallyDrop::new(elt),
            pos,
        }
    }

    #[inline]
    fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    fn element(&self) -> &T {
        &self.elt
    }

    /// # Safety
    ///
    /// `index` must be in bounds and differ from the hole's position.
    #[inline]
    unsafe fn get(&self, index: usize) -> &T {
        debug_assert!(index != self.pos && index < self.data.len());
        self.data.get_unchecked(index)
    }

    /// Moves the element at `index` into the hole, which moves to `index`.
    ///
    /// # Safety
    ///
    /// Same as [`get`](Self::get).
    #[inline]
    unsafe fn move_to(&mut self, index: usize) {
        debug_assert!(index != self.pos && index < self.data.len());
        let base = self.data.as_mut_ptr();
        ptr::copy_nonoverlapping(base.add(index), base.add(self.pos), 1);
        self.pos = index;
    }
}

impl<T> Drop for Hole<'_, T> {
    #[inline]
    fn drop(&mut self) {
        unsafe {
            let pos = self.pos;
            ptr::copy_nonoverlapping(&*self.elt, self.data.get_unchecked_mut(pos), 1);
        }
    }
}

/// Moves the element at `i` down until none of its children is smaller.
/// Returns its new position.
///
/// # Panics
///
/// Panics if `i` is out of bounds.
pub fn down_heap<T, C: Comparator<T> + ?Sized>(heap: &mut [T], i: usize, c: &C) -> usize {
    assert!(i < heap.len(), "Heap index out of bounds");
    let size = heap.len();
    let mut hole = unsafe { Hole::new(heap, i) };
    loop {
        let mut child = 2 * hole.pos() + 1;
        if child >= size {
            break;
        }
        let right = child + 1;
        unsafe {
            if right < size && c.compare(hole.get(right), hole.get(child)) == Ordering::Less {
                child = right;
            }
            if c.compare(hole.element(), hole.get(child)) != Ordering::Greater {
                break;
            }
            hole.move_to(child);
        }
    }
    hole.pos()
}

/// Moves the element at `i` up until its parent is not greater. Returns its
/// new position.
///
/// # Panics
///
/// Panics if `i` is out of bounds.
pub fn up_heap<T, C: Comparator<T> + ?Sized>(heap: &mut [T], i: usize, c: &C) -> usize {
    assert!(i < heap.len(), "Heap index out of bounds");
    let mut hole = unsafe { Hole::new(heap, i) };
    while hole.pos() != 0 {
        let parent = (hole.pos() - 1) / 2;
        unsafe {
            if c.compare(hole.get(parent), hole.element()) != Ordering::Greater {
                break;
            }
            hole.move_to(parent);
        }
    }
    hole.pos()
}

/// Rearranges the whole slice into a heap, in linear time.
pub fn make_heap<T, C: Comparator<T> + ?Sized>(heap: &mut [T], c: &C) {
    let mut i = heap.len() / 2;
    while i != 0 {
        i -= 1;
        down_heap(heap, i, c);
    }
}

/// Whether `heap` satisfies the heap property.
pub fn is_heap<T, C: Comparator<T> + ?Sized>(heap: &[T], c: &C) -> bool {
    (1..heap.len()).all(|i| c.compare(&heap[(i - 1) / 2], &heap[i]) != Ordering::Greater)
}
