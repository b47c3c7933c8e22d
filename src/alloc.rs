//! Allocator abstraction used by every container of the crate.
//!
//! Unlike `std::alloc::GlobalAlloc`, failures are reported as errors, so a
//! container can refuse a growth (or give up an optional shrink) instead of
//! aborting the process.

use snafu::{OptionExt, Snafu};
use std::{
    alloc::Layout,
    cmp,
    ptr::{self, NonNull},
};

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub")]
pub enum Error {
    #[snafu(display("Allocation of {:?} failed", layout))]
    AllocationError { layout: Layout },

    #[snafu(display("Allocation of {} items of {:?} has failed", items, layout))]
    ArrayAllocationError { layout: Layout, items: usize },

    #[snafu(display("Reallocation of {:?} to size {} failed", layout, new_size))]
    ReallocationError { layout: Layout, new_size: usize },
}

/// A source of raw memory blocks.
///
/// # Safety
///
/// Implementors must return blocks that satisfy the requested layout and
/// stay valid until they are passed back to `dealloc` of the same allocator
/// (or of a clone of it).
pub unsafe trait Alloc {
    /// Returns a block fitting `layout`. The contents are unspecified.
    ///
    /// # Safety
    ///
    /// `layout` must have a non-zero size.
    unsafe fn alloc(&mut self, layout: Layout) -> Result<NonNull<u8>, Error>;

    /// Releases a block previously returned by this allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this allocator and `layout` must be the layout it
    /// was requested with.
    unsafe fn dealloc(&mut self, ptr: NonNull<u8>, layout: Layout);

    /// Resizes a block to `new_size` bytes, keeping `layout`'s alignment.
    ///
    /// On failure the original block is untouched and still owned by the
    /// caller.
    ///
    /// # Safety
    ///
    /// Same requirements as `dealloc`, and `new_size` must be non-zero.
    unsafe fn realloc(
        &mut self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Result<NonNull<u8>, Error> {
        let new_layout = Layout::from_size_align_unchecked(new_size, layout.align());
        let new_ptr = self.alloc(new_layout)?;
        ptr::copy_nonoverlapping(
            ptr.as_ptr(),
            new_ptr.as_ptr(),
            cmp::min(layout.size(), new_size),
        );
        self.dealloc(ptr, layout);
        Ok(new_ptr)
    }

    /// Like `alloc`, but the block is filled with zero bytes.
    ///
    /// # Safety
    ///
    /// Same as `alloc`.
    unsafe fn alloc_zeroed(&mut self, layout: Layout) -> Result<NonNull<u8>, Error> {
        let ptr = self.alloc(layout)?;
        ptr::write_bytes(ptr.as_ptr(), 0, layout.size());
        Ok(ptr)
    }

    /// Allocates a block for `n` values of `T`.
    ///
    /// Fails for zero-sized requests and on arithmetic overflow.
    fn alloc_array<T>(&mut self, n: usize) -> Result<NonNull<T>, Error>
    where
        Self: Sized,
    {
        match Layout::array::<T>(n) {
            Ok(layout) if layout.size() > 0 => unsafe { self.alloc(layout).map(NonNull::cast) },
            _ => Err(Error::ArrayAllocationError {
                layout: Layout::new::<T>(),
                items: n,
            }),
        }
    }
}

unsafe impl<A: Alloc> Alloc for &mut A {
    unsafe fn alloc(&mut self, layout: Layout) -> Result<NonNull<u8>, Error> {
        A::alloc(self, layout)
    }

    unsafe fn dealloc(&mut self, ptr: NonNull<u8>, layout: Layout) {
        A::dealloc(self, ptr, layout)
    }

    unsafe fn realloc(
        &mut self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Result<NonNull<u8>, Error> {
        A::realloc(self, ptr, layout, new_size)
    }

    unsafe fn alloc_zeroed(&mut self, layout: Layout) -> Result<NonNull<u8>, Error> {
        A::alloc_zeroed(self, layout)
    }
}

/// Adapts any `std::alloc::GlobalAlloc` to [`Alloc`].
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalAlloc<A>(pub A);

use ::std::alloc::GlobalAlloc as StdGlobalAlloc;

unsafe impl<A: StdGlobalAlloc> Alloc for GlobalAlloc<A> {
    unsafe fn alloc(&mut self, layout: Layout) -> Result<NonNull<u8>, Error> {
        let ptr = StdGlobalAlloc::alloc(&self.0, layout);
        NonNull::new(ptr).context(AllocationError { layout })
    }

    unsafe fn dealloc(&mut self, ptr: NonNull<u8>, layout: Layout) {
        StdGlobalAlloc::dealloc(&self.0, ptr.as_ptr(), layout)
    }

    unsafe fn realloc(
        &mut self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Result<NonNull<u8>, Error> {
        let ptr = StdGlobalAlloc::realloc(&self.0, ptr.as_ptr(), layout, new_size);
        NonNull::new(ptr).context(ReallocationError { layout, new_size })
    }

    unsafe fn alloc_zeroed(&mut self, layout: Layout) -> Result<NonNull<u8>, Error> {
        let ptr = StdGlobalAlloc::alloc_zeroed(&self.0, layout);
        NonNull::new(ptr).context(AllocationError { layout })
    }
}

pub type System = GlobalAlloc<::std::alloc::System>;

/// The process-wide allocator, the same one `std::vec::Vec` uses.
#[derive(Debug, Default, Clone, Copy)]
pub struct Global;

unsafe impl Alloc for Global {
    unsafe fn alloc(&mut self, layout: Layout) -> Result<NonNull<u8>, Error> {
        let ptr = std::alloc::alloc(layout);
        NonNull::new(ptr).context(AllocationError { layout })
    }

    unsafe fn dealloc(&mut self, ptr: NonNull<u8>, layout: Layout) {
        std::alloc::dealloc(ptr.as_ptr(), layout)
    }

    unsafe fn realloc(
        &mut self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Result<NonNull<u8>, Error> {
        let ptr = std::alloc::realloc(ptr.as_ptr(), layout, new_size);
        NonNull::new(ptr).context(ReallocationError { layout, new_size })
    }

    unsafe fn alloc_zeroed(&mut self, layout: Layout) -> Result<NonNull<u8>, Error> {
        let ptr = std::alloc::alloc_zeroed(layout);
        NonNull::new(ptr).context(AllocationError { layout })
    }
}

/// An allocator that refuses every request.
///
/// Containers built on it can only hold what fits in storage handed over at
/// construction time; any growth attempt fails with an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOp;

unsafe impl Alloc for NoOp {
    unsafe fn alloc(&mut self, layout: Layout) -> Result<NonNull<u8>, Error> {
        Err(Error::AllocationError { layout })
    }

    unsafe fn dealloc(&mut self, _ptr: NonNull<u8>, _layout: Layout) {
        /* No op */
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::{cell::Cell, rc::Rc};

    /// Global allocator with a shared, adjustable cap on the size of a single
    /// request. Clones share the cap.
    #[derive(Debug, Clone)]
    pub(crate) struct Capped {
        limit: Rc<Cell<usize>>,
    }

    impl Capped {
        pub(crate) fn new(limit: usize) -> Self {
            Capped {
                limit: Rc::new(Cell::new(limit)),
            }
        }

        pub(crate) fn set_limit(&self, limit: usize) {
            self.limit.set(limit)
        }
    }

    unsafe impl Alloc for Capped {
        unsafe fn alloc(&mut self, layout: Layout) -> Result<NonNull<u8>, Error> {
            if layout.size() > self.limit.get() {
                return Err(Error::AllocationError { layout });
            }
            Global.alloc(layout)
        }

        unsafe fn dealloc(&mut self, ptr: NonNull<u8>, layout: Layout) {
            Global.dealloc(ptr, layout)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zeroed_block_is_zeroed() {
        let layout = Layout::array::<u64>(32).unwrap();
        unsafe {
            let ptr = Global.alloc_zeroed(layout).unwrap();
            let words = std::slice::from_raw_parts(ptr.cast::<u64>().as_ptr(), 32);
            assert!(words.iter().all(|&w| w == 0));
            Global.dealloc(ptr, layout);
        }
    }

    #[test]
    fn realloc_keeps_prefix() {
        let mut system = System::default();
        let layout = Layout::array::<u32>(4).unwrap();
        unsafe {
            let ptr = system.alloc(layout).unwrap().cast::<u32>();
            for i in 0..4 {
                ptr.as_ptr().add(i).write(i as u32 * 10);
            }
            let grown = system
                .realloc(ptr.cast(), layout, layout.size() * 4)
                .unwrap()
                .cast::<u32>();
            let prefix = std::slice::from_raw_parts(grown.as_ptr(), 4);
            assert_eq!(prefix, &[0, 10, 20, 30]);
            system.dealloc(
                grown.cast(),
                Layout::from_size_align_unchecked(layout.size() * 4, layout.align()),
            );
        }
    }

    #[test]
    fn noop_refuses() {
        assert!(NoOp.alloc_array::<u8>(1).is_err());
        assert!(NoOp.alloc_array::<()>(10).is_err());
    }

    #[test]
    fn capped_refuses_large_requests() {
        let mut capped = testing::Capped::new(16);
        let small = capped.alloc_array::<u8>(16).unwrap();
        unsafe { capped.dealloc(small.cast(), Layout::array::<u8>(16).unwrap()) };
        assert!(capped.alloc_array::<u8>(17).is_err());
        capped.set_limit(1024);
        let big = capped.alloc_array::<u8>(17).unwrap();
        unsafe { capped.dealloc(big.cast(), Layout::array::<u8>(17).unwrap()) };
    }
}
