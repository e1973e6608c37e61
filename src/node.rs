use crate::sync::{
    alloc::Track,
    atomic::{AtomicPtr, Ordering},
    UnsafeCell,
};
use std::{alloc::Layout, ptr, ptr::NonNull};

/// A single element of the stack.
///
/// A node is owned by exactly one of: the live chain hanging off the stack's
/// `head`, the thread that unlinked it, or the pending-deletion chain. `next`
/// points to the following node of whichever chain currently owns this one.
pub(crate) struct Node<T> {
    /// The payload. Moved out by the single pop that unlinks the node, so a
    /// node may be freed long after its value was handed out.
    value: UnsafeCell<Option<T>>,
    /// A thread that lost the race for this node may still load `next` while
    /// the winner relinks it into the pending chain, so this is atomic even
    /// though only the owner ever stores to it.
    pub(crate) next: AtomicPtr<Node<T>>,
    _track: Track<()>,
}

impl<T> Node<T> {
    pub(crate) const LAYOUT: Layout = Layout::new::<Node<T>>();

    /// Allocates a new, unlinked node holding `value`.
    ///
    /// If the allocator refuses, the value is handed back.
    pub(crate) fn alloc(value: T) -> Result<NonNull<Node<T>>, T> {
        // `Node` always holds a pointer, so the layout is never zero-sized.
        let ptr = unsafe { std::alloc::alloc(Self::LAYOUT) } as *mut Node<T>;
        let ptr = match NonNull::new(ptr) {
            Some(ptr) => ptr,
            None => return Err(value),
        };
        unsafe {
            ptr.as_ptr().write(Node {
                value: UnsafeCell::new(Some(value)),
                next: AtomicPtr::new(ptr::null_mut()),
                _track: Track::new(()),
            });
        }
        Ok(ptr)
    }

    /// Moves the payload out, leaving the slot empty.
    ///
    /// # Safety
    ///
    /// The caller must own the node exclusively, i.e. it must have unlinked it
    /// from the live chain itself.
    pub(crate) unsafe fn take(&self) -> Option<T> {
        self.value.with_mut(|value| (*value).take())
    }

    /// Frees a node, dropping its payload if it still has one.
    ///
    /// # Safety
    ///
    /// `node` must have come from [`Node::alloc`], must not be reachable from
    /// any chain, and no other thread may still be reading it.
    pub(crate) unsafe fn free(node: NonNull<Node<T>>) {
        // `alloc` used the global allocator with `Node`'s own layout, which is
        // exactly what `Box` expects.
        drop(Box::from_raw(node.as_ptr()));
    }

    /// Returns the last node of the chain starting at `first`.
    ///
    /// # Safety
    ///
    /// The caller must own every node of the chain.
    pub(crate) unsafe fn last(first: NonNull<Node<T>>) -> NonNull<Node<T>> {
        let mut last = first;
        while let Some(next) = NonNull::new(last.as_ref().next.load(Ordering::Relaxed)) {
            last = next;
        }
        last
    }
}
