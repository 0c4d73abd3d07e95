//! The unbounded implementation.
use core::fmt;
use lock_api::RawMutex;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

use crate::{core::dynamic::DynamicSlots, utils::panicking::undo_on_unwind};

use super::{RawValueLock, Value, ValueLockError};

/// A value lock with no fixed capacity.
///
/// A slot is created when a value that isn't bound yet is locked, and
/// destroyed when the value's last holder (or waiter) releases it. Since the
/// slot list changes under our feet, the whole-lock isn't implemented by
/// locking every slot. Instead [`lock_all`] raises a flag that holds back new
/// per-value locks and waits for the existing ones to drain, so that a
/// whole-lock epoch never overlaps a per-value one.
///
/// [`lock_all`]: RawValueLock::lock_all
///
/// # Example
///
/// ```rust
/// use valuelock::raw::{DynamicValueLock, RawValueLock};
///
/// let lock = DynamicValueLock::<String>::new();
///
/// lock.lock(&"apple".to_owned()).unwrap();
/// assert_eq!(lock.slots_in_use(), 1);
///
/// unsafe { lock.unlock(&"apple".to_owned()).unwrap() };
/// assert_eq!(lock.slots_in_use(), 0);
/// ```
pub struct DynamicValueLock<V, R = parking_lot::RawMutex> {
    state: Mutex<State<V, R>>,
    /// Signaled when `State::global` is cleared or `State::slots` becomes
    /// empty.
    epoch_changed: Condvar,
}

struct State<V, R> {
    slots: DynamicSlots<V, Arc<R>>,
    /// A whole-lock is pending or active.
    global: bool,
}

impl<V: Value, R: RawMutex> DynamicValueLock<V, R> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                slots: DynamicSlots::default(),
                global: false,
            }),
            epoch_changed: Condvar::new(),
        }
    }

    /// Get the number of values currently locked or waited for.
    pub fn slots_in_use(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// Drop a reference to `value`'s slot and return the slot.
    fn release(&self, value: &V) -> Result<Arc<R>, ValueLockError> {
        let mut state = self.state.lock();
        let index = state
            .slots
            .find(value)
            .ok_or(ValueLockError::NotLocked)?;
        let slot = Arc::clone(state.slots.slot(index));
        state.slots.release(index);

        if state.global && state.slots.is_empty() {
            // The pending whole-lock can proceed
            self.epoch_changed.notify_all();
        }

        Ok(slot)
    }

    fn end_global(&self, mut state: parking_lot::MutexGuard<'_, State<V, R>>) {
        invariant!(
            state.global,
            "released a whole-lock that isn't active, the value lock is broken"
        );
        state.global = false;
        self.epoch_changed.notify_all();
    }
}

impl<V: Value, R: RawMutex> Default for DynamicValueLock<V, R> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<V: Value, R: RawMutex> RawValueLock for DynamicValueLock<V, R> {
    type Value = V;

    fn lock(&self, value: &V) -> Result<(), ValueLockError> {
        let slot = {
            let mut state = self.state.lock();
            while state.global {
                self.epoch_changed.wait(&mut state);
            }
            let index = state.slots.acquire(value, || Arc::new(R::INIT));
            Arc::clone(state.slots.slot(index))
        };

        // Block outside the bookkeeping section. `slot` can't be removed from
        // the list before we release our reference.
        undo_on_unwind(
            || slot.lock(),
            || {
                let _ = self.release(value);
            },
        );
        Ok(())
    }

    fn try_lock(&self, value: &V) -> Result<bool, ValueLockError> {
        let mut state = self.state.lock();
        if state.global {
            return Ok(false);
        }

        let index = state.slots.acquire(value, || Arc::new(R::INIT));
        let slot = Arc::clone(state.slots.slot(index));
        let locked = undo_on_unwind(
            || slot.try_lock(),
            || {
                state.slots.release(index);
            },
        );
        if locked {
            Ok(true)
        } else {
            state.slots.release(index);
            Ok(false)
        }
    }

    unsafe fn unlock(&self, value: &V) -> Result<(), ValueLockError> {
        let slot = self.release(value)?;

        // Safety: The caller holds the lock for `value`
        unsafe { slot.unlock() };
        Ok(())
    }

    fn lock_all(&self) {
        let mut state = self.state.lock();

        // Wait for the other whole-lock, if any, to complete
        while state.global {
            self.epoch_changed.wait(&mut state);
        }

        // Hold back new per-value locks and wait for the existing ones to
        // drain
        state.global = true;
        while !state.slots.is_empty() {
            self.epoch_changed.wait(&mut state);
        }
    }

    unsafe fn lock_all_holding(&self, held: &V) -> Result<(), ValueLockError> {
        // Safety: Upheld by the caller
        unsafe { self.unlock(held)? };
        self.lock_all();
        Ok(())
    }

    unsafe fn unlock_all(&self) {
        let state = self.state.lock();
        invariant!(
            state.slots.is_empty(),
            "a value was locked during a whole-lock, the value lock is broken"
        );
        self.end_global(state);
    }

    unsafe fn unlock_all_keeping(&self, keep: &V) -> Result<(), ValueLockError> {
        let slot = Arc::new(R::INIT);
        slot.lock(); // uncontended

        let mut state = self.state.lock();
        invariant!(
            state.slots.is_empty(),
            "a value was locked during a whole-lock, the value lock is broken"
        );
        state.slots.insert(keep.clone(), slot);
        self.end_global(state);
        Ok(())
    }
}

impl<V: Value, R> fmt::Debug for DynamicValueLock<V, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("DynamicValueLock");
        match self.state.try_lock() {
            Some(state) => {
                d.field("slots_in_use", &state.slots.len())
                    .field("global", &state.global);
            }
            None => {
                struct LockedPlaceholder;
                impl fmt::Debug for LockedPlaceholder {
                    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        f.write_str("<locked>")
                    }
                }
                d.field("state", &LockedPlaceholder);
            }
        }
        d.finish_non_exhaustive()
    }
}
