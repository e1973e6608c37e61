use crate::cfg::Config;
use crate::sync;
use std::{fmt, marker::PhantomData};

/// Exponential backoff for compare-and-swap retry loops.
///
/// Each call to [`spin`](Backoff::spin) waits a little longer than the last,
/// first by spinning and then, past `C::SPIN_LIMIT`, by yielding. It never
/// parks the thread.
pub(crate) struct Backoff<C> {
    step: u32,
    _cfg: PhantomData<fn(C)>,
}

impl<C: Config> Backoff<C> {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            step: 0,
            _cfg: PhantomData,
        }
    }

    /// Backs off after a lost race.
    #[inline]
    pub(crate) fn spin(&mut self) {
        if self.step <= C::SPIN_LIMIT {
            for _ in 0..1usize << self.step {
                sync::spin_loop();
            }
        } else {
            sync::yield_now();
        }

        if self.step <= C::YIELD_LIMIT {
            self.step += 1;
        }
    }
}

impl<C> fmt::Debug for Backoff<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backoff").field("step", &self.step).finish()
    }
}
