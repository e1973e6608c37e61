//! Deferred reclamation of unlinked nodes.
//!
//! A node unlinked from the stack by one `pop` may still be in the hands of
//! another `pop` that loaded it from `head` just before the unlink. Freeing it
//! right away would leave that thread reading freed memory. Instead, this
//! module counts the threads currently inside `pop` and parks unlinked nodes on
//! a pending-deletion chain until a moment when the count says nobody else can
//! be looking at them.
//!
//! This is deliberately not a general-purpose scheme: it only knows about
//! `pop`, and while pops keep overlapping the pending chain keeps growing. The
//! whole of it sits behind [`Reclaim::enter`] and [`Guard::retire`], so it can
//! be replaced by hazard pointers or epochs without touching the stack itself.
use crate::{
    backoff::Backoff,
    cfg::Config,
    node::Node,
    sync::atomic::{AtomicPtr, AtomicUsize, Ordering},
};
use std::{fmt, marker::PhantomData, ptr, ptr::NonNull};

pub(crate) struct Reclaim<T, C> {
    /// The number of threads currently inside `pop`.
    active: AtomicUsize,
    /// Unlinked nodes that are not yet known to be safe to free.
    pending: AtomicPtr<Node<T>>,
    /// An upper bound on the length of `pending`.
    ///
    /// Incremented before nodes are chained and decremented after they are
    /// freed, so it never undercounts.
    deferred: AtomicUsize,
    /// Nodes allocated by the owning stack and not yet freed.
    #[cfg(test)]
    live: AtomicUsize,
    _cfg: PhantomData<fn(C)>,
}

/// Proof that the current thread is counted as being inside `pop`.
///
/// Dropping a guard without [retiring](Guard::retire) a node still runs a
/// reclamation pass.
#[must_use]
pub(crate) struct Guard<'a, T, C: Config> {
    reclaim: &'a Reclaim<T, C>,
    retired: bool,
}

impl<T, C: Config> Reclaim<T, C> {
    pub(crate) fn new() -> Self {
        Self {
            active: AtomicUsize::new(0),
            pending: AtomicPtr::new(ptr::null_mut()),
            deferred: AtomicUsize::new(0),
            #[cfg(test)]
            live: AtomicUsize::new(0),
            _cfg: PhantomData,
        }
    }

    /// Announces that the current thread may be about to dereference nodes
    /// reachable from `head`.
    pub(crate) fn enter(&self) -> Guard<'_, T, C> {
        self.active.fetch_add(1, Ordering::SeqCst);
        Guard {
            reclaim: self,
            retired: false,
        }
    }

    /// Returns how many unlinked nodes are waiting to be freed.
    pub(crate) fn pending(&self) -> usize {
        self.deferred.load(Ordering::Acquire)
    }

    /// Returns how many threads are currently inside `pop`.
    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Runs the reclamation step for a pop that is about to return.
    ///
    /// # Safety
    ///
    /// `detached`, if any, must have been unlinked from `head` by the calling
    /// thread, which must not touch it afterwards.
    unsafe fn try_reclaim(&self, detached: Option<NonNull<Node<T>>>) {
        if self.active.load(Ordering::SeqCst) != 1 {
            // Someone else is mid-pop and may hold `detached`.
            if let Some(node) = detached {
                self.deferred.fetch_add(1, Ordering::AcqRel);
                self.chain(node, node);
                trace_event!("deferred node {:p}", node);
            }
            self.active.fetch_sub(1, Ordering::SeqCst);
            return;
        }

        let batch = self.pending.swap(ptr::null_mut(), Ordering::SeqCst);
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Nobody entered `pop` since the swap, so nobody can have seen
            // anything on the batch.
            let freed = self.free_chain(batch);
            if freed > 0 {
                self.deferred.fetch_sub(freed, Ordering::AcqRel);
                trace_event!("drained {} pending nodes", freed);
            }
        } else if let Some(first) = NonNull::new(batch) {
            trace_event!("pop entered during drain; re-chaining pending nodes");
            self.chain(first, Node::last(first));
        }

        // FIXME: this trusts the `active == 1` load at the top rather than
        // the result of the decrement, so a pop that enters in between is not
        // accounted for. Reworking this means replacing the counter with a
        // proper hazard-pointer or epoch scheme; see DESIGN.md.
        if let Some(node) = detached {
            self.free(node);
        }
    }

    /// Prepends the chain `first..=last` to the pending list.
    ///
    /// # Safety
    ///
    /// The caller must own every node from `first` to `last`.
    unsafe fn chain(&self, first: NonNull<Node<T>>, last: NonNull<Node<T>>) {
        let mut backoff = Backoff::<C>::new();
        let mut head = self.pending.load(Ordering::Relaxed);
        loop {
            last.as_ref().next.store(head, Ordering::Relaxed);
            match self.pending.compare_exchange_weak(
                head,
                first.as_ptr(),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => {
                    head = actual;
                    backoff.spin();
                }
            }
        }
    }
}

impl<T, C> Reclaim<T, C> {
    #[cfg(test)]
    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    #[inline]
    pub(crate) fn track_alloc(&self) {
        #[cfg(test)]
        self.live.fetch_add(1, Ordering::SeqCst);
    }

    /// Frees a single node.
    ///
    /// # Safety
    ///
    /// See [`Node::free`].
    unsafe fn free(&self, node: NonNull<Node<T>>) {
        Node::free(node);
        #[cfg(test)]
        self.live.fetch_sub(1, Ordering::SeqCst);
    }

    /// Frees every node of the chain starting at `head`, returning how many
    /// were freed.
    ///
    /// # Safety
    ///
    /// The caller must own the whole chain and no other thread may still be
    /// reading any node of it.
    pub(crate) unsafe fn free_chain(&self, mut head: *mut Node<T>) -> usize {
        let mut freed = 0;
        while let Some(node) = NonNull::new(head) {
            head = node.as_ref().next.load(Ordering::Relaxed);
            self.free(node);
            freed += 1;
        }
        freed
    }
}

impl<T, C> Drop for Reclaim<T, C> {
    fn drop(&mut self) {
        let pending = self.pending.swap(ptr::null_mut(), Ordering::Relaxed);
        let freed = unsafe { self.free_chain(pending) };
        test_println!("dropped {} pending nodes", freed);
    }
}

impl<T, C> fmt::Debug for Reclaim<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reclaim")
            .field("active", &self.active.load(Ordering::Relaxed))
            .field("pending", &self.deferred.load(Ordering::Relaxed))
            .finish()
    }
}

// === impl Guard ===

impl<T, C: Config> Guard<'_, T, C> {
    /// Leaves `pop`, handing over the node it unlinked (if any).
    ///
    /// # Safety
    ///
    /// `detached` must have been unlinked from `head` by this thread, and this
    /// thread must not touch it again.
    pub(crate) unsafe fn retire(mut self, detached: Option<NonNull<Node<T>>>) {
        self.retired = true;
        self.reclaim.try_reclaim(detached);
    }

    /// Leaves `pop` without a reclamation pass, as if another pop had been
    /// counted when this one looked.
    #[cfg(test)]
    pub(crate) fn leave_without_reclaim(mut self) {
        self.retired = true;
        self.reclaim.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<T, C: Config> Drop for Guard<'_, T, C> {
    fn drop(&mut self) {
        if !self.retired {
            unsafe { self.reclaim.try_reclaim(None) }
        }
    }
}
