//! The single-mutex baseline.
use core::{fmt, marker::PhantomData};
use lock_api::RawMutex;

use super::{RawValueLock, Value, ValueLockError};

/// A value lock that serializes everything with one mutex, no matter the
/// value.
///
/// It provides no per-value concurrency and never reports a
/// [`ValueLockError`]. Since holding any value already means holding the
/// whole lock, [`lock_all_holding`] and [`unlock_all_keeping`] do nothing.
///
/// [`lock_all_holding`]: RawValueLock::lock_all_holding
/// [`unlock_all_keeping`]: RawValueLock::unlock_all_keeping
pub struct FakeValueLock<V, R = parking_lot::RawMutex> {
    mutex: R,
    _phantom: PhantomData<fn(&V)>,
}

impl<V: Value, R: RawMutex> FakeValueLock<V, R> {
    #[inline]
    pub const fn new() -> Self {
        Self {
            mutex: R::INIT,
            _phantom: PhantomData,
        }
    }
}

impl<V: Value, R: RawMutex> Default for FakeValueLock<V, R> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<V: Value, R: RawMutex> RawValueLock for FakeValueLock<V, R> {
    type Value = V;

    #[inline]
    fn lock(&self, _value: &V) -> Result<(), ValueLockError> {
        self.mutex.lock();
        Ok(())
    }

    #[inline]
    fn try_lock(&self, _value: &V) -> Result<bool, ValueLockError> {
        Ok(self.mutex.try_lock())
    }

    #[inline]
    unsafe fn unlock(&self, _value: &V) -> Result<(), ValueLockError> {
        // Safety: The caller holds the lock
        unsafe { self.mutex.unlock() };
        Ok(())
    }

    #[inline]
    fn lock_all(&self) {
        self.mutex.lock();
    }

    #[inline]
    unsafe fn lock_all_holding(&self, _held: &V) -> Result<(), ValueLockError> {
        Ok(())
    }

    #[inline]
    unsafe fn unlock_all(&self) {
        // Safety: The caller holds the lock
        unsafe { self.mutex.unlock() };
    }

    #[inline]
    unsafe fn unlock_all_keeping(&self, _keep: &V) -> Result<(), ValueLockError> {
        Ok(())
    }
}

impl<V, R: RawMutex> fmt::Debug for FakeValueLock<V, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeValueLock")
            .field("locked", &self.mutex.is_locked())
            .finish()
    }
}
