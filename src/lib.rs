//! A lock-free, multi-producer, multi-consumer stack.
//!
//! [`Stack`] is a last-in, first-out collection that any number of threads may
//! [`push`] to and [`pop`] from at once. Neither operation takes a lock or ever
//! waits for another thread: each is a compare-and-swap on the stack's `head`,
//! retried when another thread got there first. Popping an empty stack returns
//! `None` immediately.
//!
//! # Reclamation
//!
//! Unlinking a node is easy; freeing it is not. A thread that loaded `head`
//! just before another thread popped it still holds a pointer to that node and
//! is about to read its `next` link. The stack therefore counts how many
//! threads are inside [`pop`] at any moment. A popping thread that sees it is
//! alone frees its node, and any earlier leftovers, on the way out. Otherwise
//! the node goes onto a pending-deletion list, which is drained the next time a
//! pop finds itself alone.
//!
//! Under sustained overlapping pops the pending list can grow without bound;
//! it shrinks again as soon as contention lets up. [`Stack::pending`] reports
//! its size and [`Stack::try_reclaim`] runs a drain without popping.
//!
//! The counting scheme is narrow on purpose. It is not a general garbage
//! collector, and it frees a pop's own node based on a count observed slightly
//! before leaving; see the crate's `DESIGN.md` for the window this leaves open.
//!
//! # Examples
//!
//! ```
//! use counted_stack::Stack;
//! use std::{sync::Arc, thread};
//!
//! let stack = Arc::new(Stack::new());
//!
//! let producers: Vec<_> = (0..4)
//!     .map(|t| {
//!         let stack = stack.clone();
//!         thread::spawn(move || {
//!             for i in 0..100 {
//!                 stack.push(t * 100 + i);
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for producer in producers {
//!     producer.join().unwrap();
//! }
//!
//! let mut popped = Vec::new();
//! while let Some(value) = stack.pop() {
//!     popped.push(value);
//! }
//! popped.sort();
//! assert_eq!(popped, (0..400).collect::<Vec<_>>());
//! ```
//!
//! # Implementation notes
//!
//! Building with `RUSTFLAGS="--cfg loom"` swaps the atomics for [`loom`]'s
//! model-checked versions; the loom tests live behind the same flag. Adding
//! `--cfg stack_print` makes the tests print what the stack is doing. With the
//! `tracing` feature, reclamation decisions are emitted as `TRACE` events.
//!
//! [`push`]: Stack::push
//! [`pop`]: Stack::pop
//! [`loom`]: https://crates.io/crates/loom
#![warn(missing_debug_implementations, missing_docs)]

#[macro_use]
mod macros;

mod backoff;
pub(crate) mod cfg;
mod error;
mod iter;
mod node;
mod reclaim;
pub(crate) mod sync;

pub use self::{
    cfg::{Config, DebugConfig, DefaultConfig},
    error::PushError,
    iter::IntoIter,
};

use self::{
    backoff::Backoff,
    cfg::CfgPrivate,
    node::Node,
    reclaim::Reclaim,
    sync::atomic::{AtomicPtr, Ordering},
};
use std::{fmt, ptr, ptr::NonNull};

/// A lock-free concurrent stack.
///
/// See the [crate-level documentation](crate) for details.
///
/// # Examples
///
/// ```
/// use counted_stack::Stack;
///
/// let stack = Stack::new();
/// stack.push(1);
/// stack.push(2);
/// stack.push(3);
///
/// assert_eq!(stack.pop(), Some(3));
/// assert_eq!(stack.pop(), Some(2));
/// assert_eq!(stack.pop(), Some(1));
/// assert_eq!(stack.pop(), None);
/// ```
pub struct Stack<T, C: cfg::Config = DefaultConfig> {
    head: AtomicPtr<Node<T>>,
    reclaim: Reclaim<T, C>,
}

impl<T> Stack<T> {
    /// Returns a new, empty stack with the default configuration.
    pub fn new() -> Self {
        Self::new_with_config()
    }

    /// Returns a new, empty stack with the provided configuration parameters.
    ///
    /// # Panics
    ///
    /// If `C`'s parameters are inconsistent.
    pub fn new_with_config<C: Config>() -> Stack<T, C> {
        C::validate();
        Stack {
            head: AtomicPtr::new(ptr::null_mut()),
            reclaim: Reclaim::new(),
        }
    }
}

impl<T, C: Config> Stack<T, C> {
    /// Pushes `value` onto the top of the stack.
    ///
    /// # Panics
    ///
    /// Like [`Box::new`], this aborts via [`handle_alloc_error`] if the
    /// allocator cannot provide a node. Use [`try_push`](Self::try_push) to
    /// get the value back instead.
    ///
    /// [`handle_alloc_error`]: std::alloc::handle_alloc_error
    pub fn push(&self, value: T) {
        if self.try_push(value).is_err() {
            std::alloc::handle_alloc_error(Node::<T>::LAYOUT);
        }
    }

    /// Pushes `value` onto the top of the stack, returning it inside a
    /// [`PushError`] if no node could be allocated for it.
    ///
    /// # Examples
    ///
    /// ```
    /// let stack = counted_stack::Stack::new();
    /// stack.try_push("hello").expect("allocation failed");
    /// assert_eq!(stack.pop(), Some("hello"));
    /// ```
    pub fn try_push(&self, value: T) -> Result<(), PushError<T>> {
        let node = Node::alloc(value).map_err(PushError)?;
        self.reclaim.track_alloc();

        let mut backoff = Backoff::<C>::new();
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            // the node is not published yet, so nobody else can see this store.
            unsafe { node.as_ref() }.next.store(head, Ordering::Relaxed);
            match self.head.compare_exchange_weak(
                head,
                node.as_ptr(),
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    test_println!("-> pushed {:p}", node);
                    return Ok(());
                }
                Err(actual) => {
                    head = actual;
                    backoff.spin();
                }
            }
        }
    }

    /// Removes the value on top of the stack and returns it, or `None` if the
    /// stack was observed to be empty.
    ///
    /// This never waits for a concurrent [`push`](Self::push).
    pub fn pop(&self) -> Option<T> {
        let guard = self.reclaim.enter();

        let mut backoff = Backoff::<C>::new();
        // Every write to `head`, and this load, is `SeqCst` so that they sit in
        // one total order with the counter bumped by `enter`. A pop that
        // enters after another pop observed itself alone must then see that
        // pop's unlink.
        let mut head = self.head.load(Ordering::SeqCst);
        let detached = loop {
            let node = match NonNull::new(head) {
                Some(node) => node,
                None => break None,
            };
            // `node` may be unlinked by another pop at any moment, but it
            // stays allocated while this thread is counted by `guard`.
            let next = unsafe { node.as_ref() }.next.load(Ordering::Relaxed);
            match self.head.compare_exchange_weak(
                head,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break Some(node),
                Err(actual) => {
                    head = actual;
                    backoff.spin();
                }
            }
        };

        let value = detached.and_then(|node| unsafe {
            // we won the CAS, so nobody else can reach the payload.
            node.as_ref().take()
        });
        debug_assert_eq!(
            detached.is_some(),
            value.is_some(),
            "a linked node must still hold its value"
        );
        test_println!("-> popped {:?}", detached);

        unsafe {
            // `detached` was unlinked by this thread and is not touched again.
            guard.retire(detached);
        }
        value
    }

    /// Returns `true` if the stack was empty when observed.
    ///
    /// Other threads may push or pop at any time, so the answer may be stale by
    /// the time it is returned.
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }

    /// Returns how many popped nodes are waiting to be freed.
    ///
    /// Nodes land here when they are popped while other pops are in progress.
    /// The count is exact whenever no pop is running, and an overestimate
    /// otherwise.
    ///
    /// # Examples
    ///
    /// ```
    /// let stack = counted_stack::Stack::new();
    /// stack.push(1);
    /// assert_eq!(stack.pop(), Some(1));
    ///
    /// // an uncontended pop frees its node right away.
    /// assert_eq!(stack.pending(), 0);
    /// ```
    pub fn pending(&self) -> usize {
        self.reclaim.pending()
    }

    /// Runs one reclamation pass without popping anything.
    ///
    /// If no pop is in progress, every node waiting on the pending-deletion
    /// list is freed. Otherwise this does nothing; whichever pop finishes last
    /// will see to it. This is exactly the bookkeeping a `pop` on an empty
    /// stack performs.
    pub fn try_reclaim(&self) {
        drop(self.reclaim.enter());
    }
}

#[cfg(test)]
impl<T, C: Config> Stack<T, C> {
    /// Nodes allocated by this stack and not yet freed.
    pub(crate) fn live_nodes(&self) -> usize {
        self.reclaim.live()
    }
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Config> Drop for Stack<T, C> {
    fn drop(&mut self) {
        let head = self.head.swap(ptr::null_mut(), Ordering::Acquire);
        // `&mut self` means no pop is in flight, so the chain is ours alone.
        let freed = unsafe { self.reclaim.free_chain(head) };
        test_println!("dropped {} linked nodes", freed);
    }
}

impl<T, C: Config> Extend<T> for Stack<T, C> {
    /// Pushes every item in iteration order, leaving the last one on top.
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl<T> std::iter::FromIterator<T> for Stack<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut stack = Self::new();
        stack.extend(iter);
        stack
    }
}

impl<T, C: Config> IntoIterator for Stack<T, C> {
    type Item = T;
    type IntoIter = IntoIter<T, C>;

    /// Pops every value off the stack, top first.
    fn into_iter(self) -> IntoIter<T, C> {
        IntoIter { stack: self }
    }
}

impl<T, C: Config> fmt::Debug for Stack<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("active", &self.reclaim.active())
            .field("pending", &self.reclaim.pending())
            .field("config", &C::debug())
            .finish()
    }
}

unsafe impl<T: Send, C: Config> Send for Stack<T, C> {}
unsafe impl<T: Send, C: Config> Sync for Stack<T, C> {}
