//! Raw value locks.
//!
//!  - [`ValueLock`] multiplexes keys over a fixed array of `N` slots. It never
//!    allocates, but locking more than `N` distinct values at the same time
//!    fails with [`ValueLockError::SlotsExhausted`].
//!
//!  - [`DynamicValueLock`] grows a slot list on demand and shrinks it when a
//!    value's last holder leaves. Escalating to a whole-lock waits until every
//!    per-value holder is gone.
//!
//!  - [`FakeValueLock`] backs every operation with a single mutex. It's useful
//!    as a baseline for benchmarks and as a reference for correctness.
//!
//! # Notes
//!
//!  - The methods of [`RawValueLock`] that release a slot mutex are `unsafe`
//!    because releasing a mutex the current thread does not hold breaks the
//!    contract of [`lock_api::RawMutex`]. The guards in [`crate::hl`] wrap them
//!    in a safe interface.
//!
//!  - A thread may hold at most one value at a time. Locking a second value
//!    can deadlock against [`RawValueLock::lock_all`]; escalate with
//!    [`RawValueLock::lock_all_holding`] instead.
//!
pub mod dynamic;
pub mod fake;
pub mod fixed;

pub use self::{dynamic::DynamicValueLock, fake::FakeValueLock, fixed::ValueLock};


/// The capability required of lock keys: equality comparison and copying.
pub trait Value: Eq + Clone {}

impl<T: Eq + Clone> Value for T {}

/// Indicates a misuse of a value lock that bookkeeping was able to detect.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
pub enum ValueLockError {
    /// The value matches the sentinel value reserved for marking unbound
    /// slots.
    #[error("invalid parameter: value matches the sentinel value")]
    SentinelValue,
    /// The value is not currently locked by anyone.
    #[error("invalid parameter: value has not yet been locked")]
    NotLocked,
    /// Either more than `N` distinct values are locked at the same time, or a
    /// thread holding a value locked another one instead of escalating with
    /// [`RawValueLock::lock_all_holding`].
    #[error("all value lock slots are busy")]
    SlotsExhausted,
}

/// A lock that provides mutual exclusion per value of type `Self::Value`, and
/// a whole-lock that excludes every value at once.
///
/// # Safety
///
/// Implementations must guarantee that
///
///  - two threads never hold the same value at the same time, and
///  - no thread holds a value while another thread holds the whole lock.
pub unsafe trait RawValueLock {
    /// The key type.
    type Value: Value;

    /// Acquire the lock for `value`, blocking the current thread until it
    /// can do so.
    ///
    /// If acquiring panics, the bookkeeping for `value` is rolled back before
    /// the panic propagates.
    fn lock(&self, value: &Self::Value) -> Result<(), ValueLockError>;

    /// Attempt to acquire the lock for `value` without blocking. Returns
    /// `Ok(false)` if it's held elsewhere.
    fn try_lock(&self, value: &Self::Value) -> Result<bool, ValueLockError>;

    /// Release the lock for `value`.
    ///
    /// # Safety
    ///
    /// The current thread must hold the lock for `value`, acquired by
    /// [`Self::lock`], a successful [`Self::try_lock`], or
    /// [`Self::unlock_all_keeping`].
    unsafe fn unlock(&self, value: &Self::Value) -> Result<(), ValueLockError>;

    /// Acquire the whole lock, blocking the current thread until no other
    /// thread holds any value or the whole lock.
    ///
    /// If acquiring panics halfway through, everything acquired so far is
    /// released before the panic propagates.
    fn lock_all(&self);

    /// Escalate from holding `held` to holding the whole lock.
    ///
    /// The lock for `held` is released before the whole lock is acquired, so
    /// another thread waiting for `held` may get it in between.
    ///
    /// If acquiring panics, the lock for `held` is not restored: the current
    /// thread holds nothing when the panic propagates.
    ///
    /// # Safety
    ///
    /// The current thread must hold the lock for `held` and no other value.
    unsafe fn lock_all_holding(&self, held: &Self::Value) -> Result<(), ValueLockError>;

    /// Release the whole lock.
    ///
    /// # Safety
    ///
    /// The current thread must hold the whole lock.
    unsafe fn unlock_all(&self);

    /// Release the whole lock except for `keep`, which stays locked by the
    /// current thread and must be released by [`Self::unlock`] later.
    ///
    /// # Safety
    ///
    /// The current thread must hold the whole lock.
    unsafe fn unlock_all_keeping(&self, keep: &Self::Value) -> Result<(), ValueLockError>;
}
