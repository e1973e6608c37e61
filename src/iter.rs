use crate::{
    cfg::{self, Config},
    Stack,
};
use std::{fmt, iter::FusedIterator};

/// An owning iterator over the values of a [`Stack`], from the top down.
///
/// Returned by [`Stack`]'s [`IntoIterator`] implementation.
///
/// # Examples
///
/// ```
/// let stack: counted_stack::Stack<_> = (1..=3).collect();
/// let values: Vec<_> = stack.into_iter().collect();
/// assert_eq!(values, vec![3, 2, 1]);
/// ```
pub struct IntoIter<T, C: Config = cfg::DefaultConfig> {
    pub(super) stack: Stack<T, C>,
}

impl<T, C: Config> Iterator for IntoIter<T, C> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        // This iterator owns the stack, so every pop runs alone and frees its
        // node on the spot.
        self.stack.pop()
    }
}

impl<T, C: Config> FusedIterator for IntoIter<T, C> {}

impl<T, C: Config> fmt::Debug for IntoIter<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntoIter").field("stack", &self.stack).finish()
    }
}
