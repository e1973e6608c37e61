use std::{error::Error, fmt};

/// Error returned by [`Stack::try_push`] when a node for the value could not
/// be allocated.
///
/// The value that could not be pushed is handed back and may be recovered with
/// [`into_inner`](PushError::into_inner).
///
/// [`Stack::try_push`]: crate::Stack::try_push
#[derive(PartialEq, Eq)]
pub struct PushError<T>(pub(crate) T);

impl<T> PushError<T> {
    /// Returns the value that could not be pushed.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PushError(..)")
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to allocate a stack node")
    }
}

impl<T> Error for PushError<T> {}
