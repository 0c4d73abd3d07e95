//! High-level, RAII-style interfaces to value locks.
pub mod guard;

pub use self::guard::{ValueLockAllGuard, ValueLockGuard};
