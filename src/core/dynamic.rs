//! A growable list of bindings, each paired with a slot handle.
use crate::raw::Value;

use super::{find_unique, Binding};

/// The bookkeeping of [`DynamicValueLock`](crate::raw::DynamicValueLock).
///
/// Every entry is bound and has at least one reference; an entry is removed
/// as soon as its last reference is released. Indices are only meaningful
/// until the next removal.
#[derive(Debug)]
pub struct DynamicSlots<V, S> {
    entries: Vec<(Binding<V>, S)>,
}

impl<V, S> Default for DynamicSlots<V, S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V: Value, S> DynamicSlots<V, S> {
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn slot(&self, index: usize) -> &S {
        &self.entries[index].1
    }

    #[cfg(test)]
    pub fn binding(&self, index: usize) -> &Binding<V> {
        &self.entries[index].0
    }

    pub fn find(&self, value: &V) -> Option<usize> {
        let index = find_unique(0..self.entries.len(), |&i| self.entries[i].0.value == *value)?;
        invariant!(
            self.entries[index].0.refs > 0,
            "value found in a slot with no references, the value lock is broken"
        );
        Some(index)
    }

    /// Take a reference to the entry for `value`, creating one with the slot
    /// returned by `new_slot` if there's none yet.
    pub fn acquire(&mut self, value: &V, new_slot: impl FnOnce() -> S) -> usize {
        let index = match self.find(value) {
            Some(index) => index,
            None => {
                self.entries.push((Binding::new(value.clone()), new_slot()));
                self.entries.len() - 1
            }
        };
        self.entries[index].0.retain();
        index
    }

    /// Add an entry for `value` with a single reference. There must be no
    /// entry for `value` yet.
    pub fn insert(&mut self, value: V, slot: S) {
        invariant!(
            self.find(&value).is_none(),
            "value found in two slots, the value lock is broken"
        );
        let mut binding = Binding::new(value);
        binding.retain();
        self.entries.push((binding, slot));
    }

    /// Drop a reference to the entry at `index`, removing and returning its
    /// slot if it was the last one.
    pub fn release(&mut self, index: usize) -> Option<S> {
        if self.entries[index].0.release() {
            Some(self.entries.swap_remove(index).1)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::collections::HashMap;

    #[quickcheck]
    fn qc_dynamic_slots(cmds: Vec<u8>) {
        let mut cmds = cmds.into_iter();

        // The slot handle records the value it was created for
        let mut subject = DynamicSlots::<u8, u8>::default();
        let mut reference: HashMap<u8, usize> = HashMap::new();

        while let Some(cmd) = cmds.next() {
            let Some(value) = cmds.next() else { break };
            let value = value % 8;
            if cmd % 2 == 0 {
                log::debug!("Acquiring {}", value);
                let index = subject.acquire(&value, || value);
                assert_eq!(*subject.slot(index), value);
                *reference.entry(value).or_default() += 1;
            } else {
                log::debug!("Releasing {}", value);
                match subject.find(&value) {
                    None => assert!(!reference.contains_key(&value)),
                    Some(index) => {
                        let count = reference.get_mut(&value).unwrap();
                        *count -= 1;
                        let removed = subject.release(index);
                        if *count == 0 {
                            reference.remove(&value);
                            assert_eq!(removed, Some(value));
                        } else {
                            assert_eq!(removed, None);
                        }
                    }
                }
            }

            assert_eq!(subject.len(), reference.len());
            for (value, &refs) in reference.iter() {
                let index = subject.find(value).unwrap();
                assert_eq!(subject.binding(index).refs, refs);
            }
        }
    }

    #[test]
    fn insert_then_release() {
        let mut slots = DynamicSlots::<u32, ()>::default();
        slots.insert(7, ());
        let index = slots.find(&7).unwrap();
        assert_eq!(slots.binding(index).refs, 1);
        assert_eq!(slots.release(index), Some(()));
        assert!(slots.is_empty());
    }
}
