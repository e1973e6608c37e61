//! Synchronization primitives, swapped for loom's checked versions when
//! building with `--cfg loom`.
pub(crate) use self::inner::*;

#[cfg(loom)]
mod inner {
    pub(crate) use loom::thread::yield_now;
    pub(crate) use loom::{alloc, cell::UnsafeCell};
    pub(crate) mod atomic {
        pub use loom::sync::atomic::*;
        pub use std::sync::atomic::Ordering;
    }

    /// Loom cannot model a spinning thread, so spinning becomes a yield.
    #[inline(always)]
    pub(crate) fn spin_loop() {
        loom::thread::yield_now();
    }
}

#[cfg(not(loom))]
mod inner {
    pub(crate) use std::hint::spin_loop;
    pub(crate) use std::sync::atomic;
    pub(crate) use std::thread::yield_now;

    #[derive(Debug)]
    pub(crate) struct UnsafeCell<T>(std::cell::UnsafeCell<T>);

    impl<T> UnsafeCell<T> {
        pub(crate) fn new(data: T) -> UnsafeCell<T> {
            UnsafeCell(std::cell::UnsafeCell::new(data))
        }

        #[inline(always)]
        #[allow(dead_code)]
        pub(crate) fn with<F, R>(&self, f: F) -> R
        where
            F: FnOnce(*const T) -> R,
        {
            f(self.0.get())
        }

        #[inline(always)]
        pub(crate) fn with_mut<F, R>(&self, f: F) -> R
        where
            F: FnOnce(*mut T) -> R,
        {
            f(self.0.get())
        }
    }

    pub(crate) mod alloc {
        /// Marks a heap allocation so that loom can report it if it leaks.
        ///
        /// Outside of loom this is a zero-sized wrapper.
        #[derive(Debug)]
        pub(crate) struct Track<T> {
            _value: T,
        }

        impl<T> Track<T> {
            #[inline(always)]
            pub(crate) fn new(value: T) -> Track<T> {
                Track { _value: value }
            }
        }
    }
}
