//! The fixed-capacity implementation.
use core::fmt;
use lock_api::{Mutex, RawMutex};

use crate::{
    core::fixed::FixedSlots,
    utils::panicking::{for_each_or_undo, undo_on_unwind},
};

use super::{RawValueLock, Value, ValueLockError};

/// A value lock that multiplexes values over a fixed array of `N` slots.
///
/// Each slot pairs a raw mutex of type `R` with the value currently bound to
/// it. A reserved *sentinel* value marks unbound slots and can't be locked.
///
/// At most `N` distinct values can be locked (or waited for) at the same time.
/// Exceeding that fails with [`ValueLockError::SlotsExhausted`]; choose `N` to
/// be at least the number of threads that may use the lock concurrently.
///
/// # Example
///
/// ```rust
/// use valuelock::raw::{RawValueLock, ValueLock};
///
/// let lock = ValueLock::<u32, 4>::with_sentinel(u32::MAX);
///
/// lock.lock(&1).unwrap();
/// assert!(lock.try_lock(&2).unwrap());
/// assert!(!lock.try_lock(&1).unwrap());
///
/// unsafe {
///     lock.unlock(&1).unwrap();
///     lock.unlock(&2).unwrap();
/// }
/// ```
pub struct ValueLock<V, const N: usize, R = parking_lot::RawMutex> {
    slots: Mutex<R, FixedSlots<V, N>>,
    mutexes: [R; N],
    sentinel: V,
}

impl<V: Value, const N: usize, R: RawMutex> ValueLock<V, N, R> {
    /// The number of slots.
    pub const SLOTS: usize = N;

    /// Construct a `ValueLock` with `V::default()` as the sentinel value.
    pub fn new() -> Self
    where
        V: Default,
    {
        Self::with_sentinel(V::default())
    }

    /// Construct a `ValueLock` with the specified sentinel value.
    pub fn with_sentinel(sentinel: V) -> Self {
        Self {
            slots: Mutex::new(FixedSlots::new(sentinel.clone())),
            mutexes: std::array::from_fn(|_| R::INIT),
            sentinel,
        }
    }

    /// Get the number of slots.
    #[inline]
    pub const fn slots_count() -> usize {
        N
    }

    /// Get the sentinel value.
    #[inline]
    pub fn sentinel(&self) -> &V {
        &self.sentinel
    }

    /// Get the number of slots currently bound to a value.
    pub fn slots_in_use(&self) -> usize {
        self.slots.lock().len_bound()
    }
}

impl<V: Value + Default, const N: usize, R: RawMutex> Default for ValueLock<V, N, R> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<V: Value, const N: usize, R: RawMutex> RawValueLock for ValueLock<V, N, R> {
    type Value = V;

    fn lock(&self, value: &V) -> Result<(), ValueLockError> {
        let index = self.slots.lock().acquire(value)?;

        // Block outside the bookkeeping section
        undo_on_unwind(
            || self.mutexes[index].lock(),
            || self.slots.lock().release(index),
        );
        Ok(())
    }

    fn try_lock(&self, value: &V) -> Result<bool, ValueLockError> {
        let mut slots = self.slots.lock();
        let index = slots.acquire(value)?;
        let locked = undo_on_unwind(
            || self.mutexes[index].try_lock(),
            || slots.release(index),
        );
        if locked {
            Ok(true)
        } else {
            // Revert as if we had never been here
            slots.release(index);
            Ok(false)
        }
    }

    unsafe fn unlock(&self, value: &V) -> Result<(), ValueLockError> {
        let mut slots = self.slots.lock();
        let index = slots.locate(value)?;
        slots.release(index);

        // Safety: The caller holds the lock for `value`
        unsafe { self.mutexes[index].unlock() };
        Ok(())
    }

    fn lock_all(&self) {
        for_each_or_undo(
            &self.mutexes,
            |mutex| mutex.lock(),
            // Safety: We've just locked it
            |mutex| unsafe { mutex.unlock() },
        );
    }

    unsafe fn lock_all_holding(&self, held: &V) -> Result<(), ValueLockError> {
        let index = {
            let slots = self.slots.lock();
            let index = slots.locate(held)?;

            // Keep our reference to the binding, but let go of the mutex so
            // that the slots can be locked in order
            // Safety: The caller holds the lock for `held`
            unsafe { self.mutexes[index].unlock() };
            index
        };

        // If this panics, nothing is held, including `held`
        undo_on_unwind(|| self.lock_all(), || self.slots.lock().release(index));

        // We hold every slot now, so nobody else can be escalating
        self.slots.lock().set_escalated(index);
        Ok(())
    }

    unsafe fn unlock_all(&self) {
        let mut slots = self.slots.lock();
        slots.release_escalated();
        for mutex in self.mutexes.iter() {
            // Safety: The caller holds the whole lock
            unsafe { mutex.unlock() };
        }
    }

    unsafe fn unlock_all_keeping(&self, keep: &V) -> Result<(), ValueLockError> {
        let mut slots = self.slots.lock();
        let kept = match slots.keep(keep) {
            // Nothing has changed; the caller still holds the whole lock
            Err(ValueLockError::SentinelValue) => return Err(ValueLockError::SentinelValue),
            result => result,
        };

        for (index, mutex) in self.mutexes.iter().enumerate() {
            if kept != Ok(index) {
                // Safety: The caller holds the whole lock
                unsafe { mutex.unlock() };
            }
        }

        kept.map(drop)
    }
}

impl<V: fmt::Debug, const N: usize, R: RawMutex> fmt::Debug for ValueLock<V, N, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueLock")
            .field("slots", &self.slots)
            .field("sentinel", &self.sentinel)
            .finish_non_exhaustive()
    }
}
