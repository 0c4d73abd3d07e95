cfg_if::cfg_if! {
    if #[cfg(any(debug_assertions, feature = "checked"))] {
        /// Assert an internal invariant of a lock implementation.
        ///
        /// A failure means the lock itself is broken, not that it was misused,
        /// so it is never reported as a [`ValueLockError`].
        ///
        /// [`ValueLockError`]: crate::raw::ValueLockError
        macro_rules! invariant {
            ($($arg:tt)*) => { assert!($($arg)*) };
        }
    } else {
        macro_rules! invariant {
            ($cond:expr $(, $($arg:tt)*)?) => {
                ()
            };
        }
    }
}
