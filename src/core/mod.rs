//! Slot bookkeeping shared by the value locks.
//!
//! The types here only track which value is bound to which slot and how many
//! threads are holding or waiting for it. They own no mutexes; the callers in
//! [`crate::raw`] pair every slot index with a raw mutex and guard the
//! bookkeeping with a short-held mutex of their own.
pub mod dynamic;
pub mod fixed;


/// Whether internal invariants are validated. When they aren't, lookups stop
/// at the first match instead of scanning for duplicates.
pub(crate) const CHECKED: bool = cfg!(any(debug_assertions, feature = "checked"));

/// A value bound to a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding<V> {
    pub value: V,
    /// The number of threads holding or about to hold `value`.
    pub refs: usize,
}

impl<V> Binding<V> {
    #[inline]
    pub fn new(value: V) -> Self {
        Self { value, refs: 0 }
    }

    #[inline]
    pub fn retain(&mut self) {
        self.refs += 1;
    }

    /// Drop a reference. Returns `true` if it was the last one.
    #[inline]
    pub fn release(&mut self) -> bool {
        invariant!(
            self.refs > 0,
            "released a binding with no references, the value lock is broken"
        );
        self.refs = self.refs.saturating_sub(1);
        self.refs == 0
    }
}

/// Find the only element of `iter` that satisfies `pred`.
///
/// In checked builds, a second match is an invariant violation.
fn find_unique<T>(iter: impl Iterator<Item = T>, mut pred: impl FnMut(&T) -> bool) -> Option<T> {
    let mut found = None;
    for x in iter {
        if !pred(&x) {
            continue;
        }
        invariant!(
            found.is_none(),
            "value found in two slots, the value lock is broken"
        );
        found = Some(x);
        if !CHECKED {
            break;
        }
    }
    found
}
