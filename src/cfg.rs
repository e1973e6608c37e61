use std::fmt;

/// Configuration parameters which can be overridden to tune the behavior of a
/// [`Stack`].
///
/// The only tunables are the limits of the backoff applied between failed
/// compare-and-swap attempts. Retrying is the normal way a lock-free stack makes
/// progress under contention; these knobs only decide how long a losing thread
/// waits before trying again. No setting makes any operation block.
///
/// # Examples
///
/// ```
/// use counted_stack::{Config, Stack};
///
/// struct Impatient;
///
/// impl Config for Impatient {
///     const SPIN_LIMIT: u32 = 2;
///     const YIELD_LIMIT: u32 = 4;
/// }
///
/// let stack = Stack::new_with_config::<Impatient>();
/// stack.push("hello");
/// assert_eq!(stack.pop(), Some("hello"));
/// ```
///
/// [`Stack`]: crate::Stack
pub trait Config: Sized {
    /// The number of backoff steps that busy-spin before a retrying thread
    /// starts yielding its time slice instead.
    ///
    /// Step `n` spins `2^n` times.
    const SPIN_LIMIT: u32 = 6;

    /// The backoff step after which waiting stops growing.
    ///
    /// This must be at least [`SPIN_LIMIT`](Config::SPIN_LIMIT).
    const YIELD_LIMIT: u32 = 10;

    /// Returns a [`Debug`](fmt::Debug) view of this configuration.
    fn debug() -> DebugConfig<Self> {
        DebugConfig { _cfg: std::marker::PhantomData }
    }
}

pub(crate) trait CfgPrivate: Config {
    fn validate() {
        assert!(
            Self::SPIN_LIMIT <= Self::YIELD_LIMIT,
            "backoff cannot start yielding after it has stopped growing (spin limit {} > yield limit {})",
            Self::SPIN_LIMIT,
            Self::YIELD_LIMIT,
        );
        assert!(
            Self::SPIN_LIMIT < usize::BITS,
            "spin limit {} would overflow the spin count",
            Self::SPIN_LIMIT,
        );
    }
}

impl<C: Config> CfgPrivate for C {}

/// Default configuration parameters.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultConfig {
    _p: (),
}

impl Config for DefaultConfig {}

/// A [`Debug`](fmt::Debug) view of a [`Config`] type's parameters.
pub struct DebugConfig<C: Config> {
    _cfg: std::marker::PhantomData<fn(C)>,
}

impl<C: Config> fmt::Debug for DebugConfig<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(std::any::type_name::<C>())
            .field("spin_limit", &C::SPIN_LIMIT)
            .field("yield_limit", &C::YIELD_LIMIT)
            .finish()
    }
}
