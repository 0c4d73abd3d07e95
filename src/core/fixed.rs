//! An index-addressed arena of `N` bindings, with a sentinel value marking
//! unbound slots.
use crate::raw::{Value, ValueLockError};

use super::{find_unique, Binding};


/// The bookkeeping of [`ValueLock`](crate::raw::ValueLock).
///
/// A slot is free iff it's bound to the sentinel value (and then it has no
/// references).
#[derive(Debug)]
pub struct FixedSlots<V, const N: usize> {
    sentinel: V,
    bindings: [Binding<V>; N],
    /// The slot whose reference was carried into the current whole-lock by
    /// [`RawValueLock::lock_all_holding`].
    ///
    /// [`RawValueLock::lock_all_holding`]: crate::raw::RawValueLock::lock_all_holding
    escalated: Option<usize>,
}

impl<V: Value, const N: usize> FixedSlots<V, N> {
    pub fn new(sentinel: V) -> Self {
        Self {
            bindings: std::array::from_fn(|_| Binding::new(sentinel.clone())),
            sentinel,
            escalated: None,
        }
    }

    #[cfg(test)]
    pub fn binding(&self, index: usize) -> &Binding<V> {
        &self.bindings[index]
    }

    #[inline]
    fn is_free(&self, index: usize) -> bool {
        self.bindings[index].value == self.sentinel
    }

    /// Get the number of slots bound to a value.
    pub fn len_bound(&self) -> usize {
        (0..N).filter(|&i| !self.is_free(i)).count()
    }

    #[inline]
    fn check_not_sentinel(&self, value: &V) -> Result<(), ValueLockError> {
        if *value == self.sentinel {
            Err(ValueLockError::SentinelValue)
        } else {
            Ok(())
        }
    }

    fn find(&self, value: &V) -> Option<usize> {
        find_unique(0..N, |&i| self.bindings[i].value == *value)
    }

    /// Get the slot bound to `value`.
    pub fn locate(&self, value: &V) -> Result<usize, ValueLockError> {
        self.check_not_sentinel(value)?;
        let index = self.find(value).ok_or(ValueLockError::NotLocked)?;
        invariant!(
            self.bindings[index].refs > 0,
            "value found in a slot with no references, the value lock is broken"
        );
        Ok(index)
    }

    /// Take a reference to the slot bound to `value`, binding a free slot if
    /// there's none yet.
    pub fn acquire(&mut self, value: &V) -> Result<usize, ValueLockError> {
        self.check_not_sentinel(value)?;

        let index = match self.find(value) {
            Some(index) => index,
            None => self.bind_free(value)?,
        };

        self.bindings[index].retain();
        Ok(index)
    }

    fn bind_free(&mut self, value: &V) -> Result<usize, ValueLockError> {
        let Some(index) = (0..N).find(|&i| self.is_free(i)) else {
            log::debug!("all {} value lock slots are busy", N);
            return Err(ValueLockError::SlotsExhausted);
        };
        invariant!(
            self.bindings[index].refs == 0,
            "free slot has references, the value lock is broken"
        );
        self.bindings[index].value = value.clone();
        Ok(index)
    }

    /// Drop a reference to the slot at `index`, unbinding it if it was the
    /// last one.
    pub fn release(&mut self, index: usize) {
        if self.bindings[index].release() {
            self.bindings[index].value = self.sentinel.clone();
        }
    }

    /// Remember that the caller's reference to the slot at `index` is carried
    /// into the whole-lock.
    pub fn set_escalated(&mut self, index: usize) {
        invariant!(
            self.escalated.is_none(),
            "two whole-locks are active, the value lock is broken"
        );
        self.escalated = Some(index);
    }

    /// Release the reference carried into the whole-lock, if any.
    pub fn release_escalated(&mut self) {
        if let Some(index) = self.escalated.take() {
            self.release(index);
        }
    }

    /// Choose the slot for `value` to stay locked in when the whole-lock is
    /// released, and make sure the caller has a reference to it.
    ///
    /// On `Err(SentinelValue)` nothing changes. On `Err(SlotsExhausted)` the
    /// reference carried into the whole-lock, if any, has been released.
    pub fn keep(&mut self, value: &V) -> Result<usize, ValueLockError> {
        self.check_not_sentinel(value)?;

        let escalated = self.escalated.take();
        let found = self.find(value);

        match (found, escalated) {
            // The caller's reference survives the downgrade
            (Some(index), Some(escalated)) if index == escalated => return Ok(index),
            _ => {}
        }

        // Release the old reference first; it might free a slot for `value`
        if let Some(index) = escalated {
            self.release(index);
        }

        let index = match found {
            Some(index) => index,
            None => self.bind_free(value)?,
        };
        self.bindings[index].retain();
        Ok(index)
    }
}
