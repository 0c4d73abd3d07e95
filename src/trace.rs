//! Recording and validating traces of value lock usage.
//!
//! A trace is the sequence of lock events observed by the threads sharing a
//! value lock, in the order they happened. To get a faithful order, record
//! acquisitions right after they complete and releases right before they
//! start, so that every event is recorded while the lock it concerns is held.
//!
//! [`validate`] decides whether a trace is consistent with the guarantees of a
//! value lock.
//!
//! # Example
//!
//! ```rust
//! use valuelock::trace::{validate, Event, EventKind::*};
//!
//! let trace = [
//!     Event::new(Lock, 1, 'a'),
//!     Event::new(Lock, 2, 'b'),
//!     Event::new(Unlock, 1, 'a'),
//!     Event::new(Unlock, 2, 'b'),
//! ];
//! assert!(validate(&trace).is_ok());
//!
//! let trace = [Event::new(Lock, 1, 'a'), Event::new(Lock, 2, 'a')];
//! assert!(validate(&trace).is_err());
//! ```
use core::fmt;
use parking_lot::Mutex;

use crate::raw::Value;


/// The identifier of a thread in a trace.
pub type ThreadId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A value was locked.
    Lock,
    /// A value is about to be unlocked.
    Unlock,
    /// The whole lock was acquired. The event's value is the value the thread
    /// escalated from, or an arbitrary tag otherwise.
    LockAll,
    /// The whole lock is about to be released. The value must match the
    /// `LockAll`.
    UnlockAll,
    /// The whole lock is about to be released except for the event's value.
    /// The value must match the `LockAll`.
    UnlockAllKeep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<V> {
    pub kind: EventKind,
    pub thread: ThreadId,
    pub value: V,
}

impl<V> Event<V> {
    #[inline]
    pub const fn new(kind: EventKind, thread: ThreadId, value: V) -> Self {
        Self {
            kind,
            thread,
            value,
        }
    }
}

/// Collects events from multiple threads.
#[derive(Debug)]
pub struct Recorder<V> {
    events: Mutex<Vec<Event<V>>>,
}

impl<V> Default for Recorder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Recorder<V> {
    pub const fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn record(&self, kind: EventKind, thread: ThreadId, value: V) {
        self.events.lock().push(Event::new(kind, thread, value));
    }

    /// Get the number of events recorded so far.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_events(self) -> Vec<Event<V>> {
        self.events.into_inner()
    }
}

/// Why a trace is inconsistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Reason {
    #[error("the value is held by another thread")]
    HeldElsewhere,
    #[error("the thread already holds the value")]
    Reentrant,
    #[error("the whole lock is held")]
    WholeLockHeld,
    #[error("the thread does not hold the value")]
    NotHeld,
    #[error("values are held by other threads, or the thread holds a value it's not escalating from")]
    ValuesHeld,
    #[error("the thread does not hold the whole lock for this value")]
    WholeLockNotHeld,
    #[error("locks are still held at the end of the trace")]
    Unbalanced,
}

/// Indicates that a trace could not have been produced by a correct value
/// lock.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event #{index} is inconsistent: {reason}")]
pub struct Inconsistency {
    /// The index of the offending event, or the length of the trace if the
    /// trace ended in an unbalanced state.
    pub index: usize,
    pub reason: Reason,
}

/// The state of a value lock as implied by a trace prefix.
struct Model<'a, V> {
    /// Per-value holders
    held: Vec<(ThreadId, &'a V)>,
    /// The whole-lock holder and its `LockAll` value
    whole: Option<(ThreadId, &'a V)>,
}

impl<'a, V: Value> Model<'a, V> {
    fn apply(&mut self, event: &'a Event<V>) -> Result<(), Reason> {
        let Event {
            kind,
            thread,
            ref value,
        } = *event;
        let me = (thread, value);

        match kind {
            EventKind::Lock => {
                if self.whole.is_some() {
                    return Err(Reason::WholeLockHeld);
                }
                match self.held.iter().find(|&&(_, v)| v == value) {
                    Some(&(t, _)) if t == thread => Err(Reason::Reentrant),
                    Some(_) => Err(Reason::HeldElsewhere),
                    None => {
                        self.held.push(me);
                        Ok(())
                    }
                }
            }
            EventKind::Unlock => {
                if self.whole.is_some() {
                    return Err(Reason::WholeLockHeld);
                }
                let i = self
                    .held
                    .iter()
                    .position(|&(t, v)| t == thread && v == value)
                    .ok_or(Reason::NotHeld)?;
                self.held.swap_remove(i);
                Ok(())
            }
            EventKind::LockAll => {
                if self.whole.is_some() {
                    return Err(Reason::WholeLockHeld);
                }
                // Only an escalation from `value` may be in progress
                if self.held.iter().any(|&(t, v)| t != thread || v != value) {
                    return Err(Reason::ValuesHeld);
                }
                self.held.clear();
                self.whole = Some(me);
                Ok(())
            }
            EventKind::UnlockAll | EventKind::UnlockAllKeep => {
                match self.whole {
                    Some((t, v)) if t == thread && v == value => {}
                    _ => return Err(Reason::WholeLockNotHeld),
                }
                self.whole = None;
                if kind == EventKind::UnlockAllKeep {
                    self.held.push(me);
                }
                Ok(())
            }
        }
    }
}

/// Check that `events` is consistent with the guarantees of a value lock:
///
///  - At most one thread holds a value at any point, and a thread never locks
///    a value it already holds.
///  - No value is locked or unlocked while the whole lock is held.
///  - The whole lock is acquired only when no other thread holds a value. The
///    acquiring thread may hold the value it escalates from.
///  - The whole lock is released by the thread that acquired it, with the
///    same value.
///  - Nothing is held at the end of the trace.
pub fn validate<V: Value>(events: &[Event<V>]) -> Result<(), Inconsistency> {
    let mut model = Model {
        held: Vec::new(),
        whole: None,
    };

    for (index, event) in events.iter().enumerate() {
        model
            .apply(event)
            .map_err(|reason| Inconsistency { index, reason })?;
    }

    if model.whole.is_some() || !model.held.is_empty() {
        return Err(Inconsistency {
            index: events.len(),
            reason: Reason::Unbalanced,
        });
    }

    Ok(())
}

impl<V: fmt::Debug> fmt::Display for Event<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.kind {
            EventKind::Lock => "LOCK",
            EventKind::Unlock => "UNLOCK",
            EventKind::LockAll => "LOCK_ALL",
            EventKind::UnlockAll => "UNLOCK_ALL",
            EventKind::UnlockAllKeep => "UNLOCK_ALL_KEEP",
        };
        write!(f, "{}({}, {:?})", name, self.thread, self.value)
    }
}
