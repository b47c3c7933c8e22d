//! Owned, uninitialized backing storage for the containers.

use crate::alloc::{self, Alloc, Global};
use core::{cmp, marker::PhantomData, mem, ptr::NonNull};
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::alloc::Layout;

/// A buffer of `capacity` slots of `T` allocated through `A`.
///
/// The buffer never reads, writes or drops its slots: keeping track of which
/// slots hold live values is up to the owning container. Dropping a `RawVec`
/// only releases the memory.
///
/// Zero-sized types never allocate and report a capacity of `usize::MAX`.
pub struct RawVec<T, A: Alloc = Global> {
    ptr: NonNull<T>,
    cap: usize,
    a: A,
    _owns: PhantomData<T>,
}

unsafe impl<T: Send, A: Alloc + Send> Send for RawVec<T, A> {}
unsafe impl<T: Sync, A: Alloc + Sync> Sync for RawVec<T, A> {}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Capacity overflow"))]
    CapacityOverflow,

    #[snafu(display("Allocation failed for: {}", source))]
    Allocation { source: alloc::Error },
}

impl<T, A: Alloc> RawVec<T, A> {
    /// Creates an empty buffer without allocating.
    pub fn new_in(a: A) -> Self {
        RawVec {
            ptr: NonNull::dangling(),
            cap: if mem::size_of::<T>() == 0 { !0 } else { 0 },
            a,
            _owns: PhantomData,
        }
    }

    /// Allocates room for exactly `capacity` values.
    #[inline]
    pub fn with_capacity_in(capacity: usize, a: A) -> Result<Self, Error> {
        RawVec::allocate_in(capacity, false, a)
    }

    /// Allocates room for exactly `capacity` values, with every byte set to
    /// zero.
    #[inline]
    pub fn with_capacity_zeroed_in(capacity: usize, a: A) -> Result<Self, Error> {
        RawVec::allocate_in(capacity, true, a)
    }

    fn allocate_in(capacity: usize, zeroed: bool, mut a: A) -> Result<Self, Error> {
        if mem::size_of::<T>() == 0 || capacity == 0 {
            return Ok(RawVec::new_in(a));
        }
        let layout = Layout::array::<T>(capacity)
            .ok()
            .context(CapacityOverflow)?;
        alloc_guard(layout.size())?;
        let ptr = unsafe {
            if zeroed {
                a.alloc_zeroed(layout)
            } else {
                a.alloc(layout)
            }
        }
        .context(Allocation)?;
        Ok(RawVec {
            ptr: ptr.cast(),
            cap: capacity,
            a,
            _owns: PhantomData,
        })
    }

    /// Takes ownership of an existing allocation.
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated by `a` (or an allocator compatible
    /// with it) with the layout of `[T; capacity]`, or be dangling when
    /// `capacity` is zero.
    pub unsafe fn from_raw_parts_in(ptr: *mut T, capacity: usize, a: A) -> Self {
        RawVec {
            ptr: NonNull::new_unchecked(ptr),
            cap: if mem::size_of::<T>() == 0 { !0 } else { capacity },
            a,
            _owns: PhantomData,
        }
    }

    /// Raw pointer to the first slot. Dangling when nothing is allocated.
    #[inline(always)]
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// The allocator backing this buffer.
    pub fn alloc(&self) -> &A {
        &self.a
    }

    fn current_layout(&self) -> Option<Layout> {
        if self.cap == 0 || mem::size_of::<T>() == 0 {
            None
        } else {
            // The layout was validated when the block was allocated.
            unsafe {
                Some(Layout::from_size_align_unchecked(
                    mem::size_of::<T>() * self.cap,
                    mem::align_of::<T>(),
                ))
            }
        }
    }

    /// Makes sure there is room for `used + extra` values, growing to at
    /// least twice the current capacity and never below `min_capacity`.
    ///
    /// On failure the buffer is left as it was.
    pub fn try_reserve(
        &mut self,
        used: usize,
        extra: usize,
        min_capacity: usize,
    ) -> Result<(), Error> {
        if self.cap.wrapping_sub(used) >= extra {
            return Ok(());
        }
        let required = used.checked_add(extra).context(CapacityOverflow)?;
        let doubled = self.cap.saturating_mul(2);
        self.grow_to(cmp::max(cmp::max(doubled, required), min_capacity))
    }

    /// Makes sure there is room for exactly `used + extra` values.
    pub fn try_reserve_exact(&mut self, used: usize, extra: usize) -> Result<(), Error> {
        if self.cap.wrapping_sub(used) >= extra {
            return Ok(());
        }
        let required = used.checked_add(extra).context(CapacityOverflow)?;
        self.grow_to(required)
    }

    fn grow_to(&mut self, new_cap: usize) -> Result<(), Error> {
        ensure!(mem::size_of::<T>() != 0, CapacityOverflow);
        let new_layout = Layout::array::<T>(new_cap).ok().context(CapacityOverflow)?;
        alloc_guard(new_layout.size())?;
        let ptr = unsafe {
            match self.current_layout() {
                Some(layout) => {
                    debug_assert_eq!(layout.align(), new_layout.align());
                    self.a.realloc(self.ptr.cast(), layout, new_layout.size())
                }
                None => self.a.alloc(new_layout),
            }
        }
        .context(Allocation)?;
        self.ptr = ptr.cast();
        self.cap = new_cap;
        Ok(())
    }

    /// Shrinks the allocation down to `amount` slots; `0` releases it.
    ///
    /// On failure the buffer keeps its old allocation.
    ///
    /// # Panics
    ///
    /// Panics if `amount` is larger than the current capacity.
    pub fn shrink_to_fit(&mut self, amount: usize) -> Result<(), Error> {
        if mem::size_of::<T>() == 0 {
            return Ok(());
        }
        assert!(self.cap >= amount, "Tried to shrink to a larger capacity");
        if amount == self.cap {
            return Ok(());
        }
        if amount == 0 {
            unsafe { self.dealloc_buffer() };
            self.ptr = NonNull::dangling();
            self.cap = 0;
            return Ok(());
        }
        let new_size = mem::size_of::<T>() * amount;
        let ptr = unsafe {
            match self.current_layout() {
                Some(layout) => self.a.realloc(self.ptr.cast(), layout, new_size),
                None => unreachable!("non-empty capacity without a layout"),
            }
        }
        .context(Allocation)?;
        self.ptr = ptr.cast();
        self.cap = amount;
        Ok(())
    }

    /// Frees the memory owned by the buffer *without* dropping its contents.
    unsafe fn dealloc_buffer(&mut self) {
        if let Some(layout) = self.current_layout() {
            self.a.dealloc(self.ptr.cast(), layout);
        }
    }
}

impl<T, A: Alloc> Drop for RawVec<T, A> {
    fn drop(&mut self) {
        unsafe { self.dealloc_buffer() }
    }
}

// Allocations above `isize::MAX` bytes are invalid; on 64-bit targets the
// allocator fails on them anyway.
#[inline]
fn alloc_guard(alloc_size: usize) -> Result<(), Error> {
    ensure!(
        !(mem::size_of::<usize>() < 8 && alloc_size > core::isize::MAX as usize),
        CapacityOverflow
    );
    Ok(())
}
