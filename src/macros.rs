macro_rules! test_println {
    ($($arg:tt)*) => {
        if cfg!(test) && cfg!(stack_print) {
            if std::thread::panicking() {
                // the thread name is not worth a second panic
                println!("[PANIC {:>17}:{:<3}] {}", file!(), line!(), format_args!($($arg)*))
            } else {
                println!("[{:?} {:>17}:{:<3}] {}", std::thread::current().id(), file!(), line!(), format_args!($($arg)*))
            }
        }
    }
}

/// Reports a reclamation decision.
///
/// With the `tracing` feature enabled this is a `TRACE`-level event under the
/// `counted_stack::reclaim` target; it always feeds `test_println!` as well.
macro_rules! trace_event {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        tracing::trace!(target: "counted_stack::reclaim", $($arg)*);
        test_println!($($arg)*);
    }
}
