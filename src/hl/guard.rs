//! RAII guards for value locks.
use core::{fmt, mem};

use crate::{
    raw::{RawValueLock, ValueLockError},
    utils::panicking::suppress_if_unwinding,
};


// `ValueLockGuard`
// ----------------------------------------------------------------------------

/// Holds the lock for one value until dropped.
///
/// Dropping the guard releases the value. If that fails while the thread is
/// already panicking, the failure is logged and ignored; otherwise the drop
/// panics. Use [`Self::release`] to handle the failure yourself.
///
/// # Example
///
/// ```rust
/// use valuelock::{hl::ValueLockGuard, raw::ValueLock};
///
/// let lock = ValueLock::<u32, 4>::with_sentinel(0);
/// {
///     let guard = ValueLockGuard::new(&lock, 42).unwrap();
///     assert_eq!(*guard.value(), 42);
///
///     // A second lock on `42` would block now
///     assert!(ValueLockGuard::try_new(&lock, 42).unwrap().is_none());
/// }
/// assert!(ValueLockGuard::try_new(&lock, 42).unwrap().is_some());
/// ```
#[must_use = "if unused the value will immediately be unlocked"]
pub struct ValueLockGuard<'a, L: RawValueLock + ?Sized> {
    lock: &'a L,
    /// `None` once released.
    value: Option<L::Value>,
}

impl<'a, L: RawValueLock + ?Sized> ValueLockGuard<'a, L> {
    /// Acquire the lock for `value`, blocking the current thread until it can
    /// do so.
    pub fn new(lock: &'a L, value: L::Value) -> Result<Self, ValueLockError> {
        lock.lock(&value)?;
        Ok(Self {
            lock,
            value: Some(value),
        })
    }

    /// Attempt to acquire the lock for `value` without blocking.
    pub fn try_new(lock: &'a L, value: L::Value) -> Result<Option<Self>, ValueLockError> {
        if lock.try_lock(&value)? {
            Ok(Some(Self {
                lock,
                value: Some(value),
            }))
        } else {
            Ok(None)
        }
    }

    /// Take over the lock for `value`, which the current thread already
    /// holds.
    ///
    /// # Safety
    ///
    /// The current thread must hold the lock for `value` and must not release
    /// it by any other means.
    pub unsafe fn adopt(lock: &'a L, value: L::Value) -> Self {
        Self {
            lock,
            value: Some(value),
        }
    }

    /// Get the locked value.
    #[inline]
    pub fn value(&self) -> &L::Value {
        match &self.value {
            Some(value) => value,
            None => unreachable!(),
        }
    }

    /// Get the lock this guard belongs to.
    #[inline]
    pub fn lock(&self) -> &'a L {
        self.lock
    }

    /// Release the value, reporting any failure to the caller.
    pub fn release(mut self) -> Result<(), ValueLockError> {
        self.unlock(false)
    }

    /// Escalate to holding the whole lock.
    ///
    /// The returned guard is set to keep this guard's value when it's
    /// released. See [`RawValueLock::lock_all_holding`] for the caveats.
    pub fn escalate(mut self) -> Result<ValueLockAllGuard<'a, L>, ValueLockError> {
        let Some(value) = self.value.take() else {
            unreachable!()
        };

        // Safety: We hold the lock for `value`, and the caller can't be
        // holding any other value through this lock without violating
        // the one-value-per-thread rule
        match unsafe { self.lock.lock_all_holding(&value) } {
            Ok(()) => Ok(ValueLockAllGuard {
                lock: self.lock,
                keep: Some(value),
                held: true,
            }),
            Err(e) => {
                // Still holding `value`; `self` will release it
                self.value = Some(value);
                Err(e)
            }
        }
    }

    /// Release the value unless it has already been released. Failures are
    /// suppressed if `unwinding` is set.
    fn unlock(&mut self, unwinding: bool) -> Result<(), ValueLockError> {
        let Some(value) = self.value.take() else {
            return Ok(());
        };

        // Safety: We hold the lock for `value`
        let result = unsafe { self.lock.unlock(&value) };
        suppress_if_unwinding(result, unwinding, "releasing a value lock")
    }
}

impl<L: RawValueLock + ?Sized> Drop for ValueLockGuard<'_, L> {
    fn drop(&mut self) {
        let unwinding = std::thread::panicking();
        if let Err(e) = self.unlock(unwinding) {
            panic!("failed to release a value lock: {}", e);
        }
    }
}

impl<L: RawValueLock + ?Sized> fmt::Debug for ValueLockGuard<'_, L>
where
    L::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueLockGuard")
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

// `ValueLockAllGuard`
// ----------------------------------------------------------------------------

/// Holds the whole lock until dropped.
///
/// The guard carries a *keep* value, which can be changed at any point before
/// it's released. On release, every value is unlocked except the keep value,
/// which stays locked by the current thread. [`Self::downgrade`] hands it over
/// to a new [`ValueLockGuard`]; dropping the guard leaves the keep value
/// locked with no guard, to be released by [`RawValueLock::unlock`].
///
/// # Example
///
/// ```rust
/// use valuelock::{hl::ValueLockAllGuard, raw::DynamicValueLock};
///
/// let lock = DynamicValueLock::<u32>::new();
///
/// let mut all = ValueLockAllGuard::new(&lock);
/// // ... work on every value ...
/// all.set_keep(Some(7));
///
/// let seven = all.downgrade().unwrap().unwrap();
/// assert_eq!(*seven.value(), 7);
/// assert_eq!(lock.slots_in_use(), 1);
/// ```
#[must_use = "if unused the whole lock will immediately be unlocked"]
pub struct ValueLockAllGuard<'a, L: RawValueLock + ?Sized> {
    lock: &'a L,
    keep: Option<L::Value>,
    /// `false` once released.
    held: bool,
}

impl<'a, L: RawValueLock + ?Sized> ValueLockAllGuard<'a, L> {
    /// Acquire the whole lock, blocking the current thread until it can do so.
    pub fn new(lock: &'a L) -> Self {
        lock.lock_all();
        Self {
            lock,
            keep: None,
            held: true,
        }
    }

    /// Get the value to keep locked on release.
    #[inline]
    pub fn keep(&self) -> Option<&L::Value> {
        self.keep.as_ref()
    }

    /// Set the value to keep locked on release. `None` releases everything.
    #[inline]
    pub fn set_keep(&mut self, keep: Option<L::Value>) {
        self.keep = keep;
    }

    /// Replace the keep value, returning the old one.
    #[inline]
    pub fn replace_keep(&mut self, keep: Option<L::Value>) -> Option<L::Value> {
        mem::replace(&mut self.keep, keep)
    }

    /// Get the lock this guard belongs to.
    #[inline]
    pub fn lock(&self) -> &'a L {
        self.lock
    }

    /// Release the whole lock, returning a guard for the keep value if there
    /// is one.
    pub fn downgrade(mut self) -> Result<Option<ValueLockGuard<'a, L>>, ValueLockError> {
        self.unlock(false)?;
        let lock = self.lock;
        Ok(self.keep.take().map(|value| ValueLockGuard {
            lock,
            value: Some(value),
        }))
    }

    /// Release the whole lock, leaving the keep value (if any) locked by the
    /// current thread.
    pub fn release(mut self) -> Result<Option<L::Value>, ValueLockError> {
        self.unlock(false)?;
        Ok(self.keep.take())
    }

    fn unlock(&mut self, unwinding: bool) -> Result<(), ValueLockError> {
        if !mem::replace(&mut self.held, false) {
            return Ok(());
        }

        // Safety: We hold the whole lock
        let result = unsafe {
            match &self.keep {
                Some(keep) => self.lock.unlock_all_keeping(keep),
                None => {
                    self.lock.unlock_all();
                    Ok(())
                }
            }
        };

        if result.is_err() {
            // `SlotsExhausted` has released everything, and `SentinelValue`
            // has released nothing. Either way, the keep value isn't held
            // now.
            if result == Err(ValueLockError::SentinelValue) {
                // Safety: We still hold the whole lock
                unsafe { self.lock.unlock_all() };
            }
            self.keep = None;
        }

        suppress_if_unwinding(result, unwinding, "releasing a whole value lock")
    }
}

impl<L: RawValueLock + ?Sized> Drop for ValueLockAllGuard<'_, L> {
    fn drop(&mut self) {
        let unwinding = std::thread::panicking();
        if let Err(e) = self.unlock(unwinding) {
            panic!("failed to release a whole value lock: {}", e);
        }
    }
}

impl<L: RawValueLock + ?Sized> fmt::Debug for ValueLockAllGuard<'_, L>
where
    L::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueLockAllGuard")
            .field("keep", &self.keep)
            .field("held", &self.held)
            .finish_non_exhaustive()
    }
}
