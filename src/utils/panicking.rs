use core::mem;

/// Call `apply` on each element of `items` in order. If it fails (returns
/// `Err` or panics) for some element, call `undo` on every element `apply`
/// has already succeeded for, walking backward, and then propagate the
/// original failure.
///
/// `undo` is not called for the element whose `apply` failed.
pub fn try_for_each_or_undo<T, E>(
    items: &[T],
    mut apply: impl FnMut(&T) -> Result<(), E>,
    undo: impl FnMut(&T),
) -> Result<(), E> {
    struct Rollback<'a, T, Undo: FnMut(&T)> {
        items: &'a [T],
        done: usize,
        undo: Undo,
    }

    impl<T, Undo: FnMut(&T)> Drop for Rollback<'_, T, Undo> {
        #[inline]
        fn drop(&mut self) {
            for item in self.items[..self.done].iter().rev() {
                (self.undo)(item);
            }
        }
    }

    let mut rollback = Rollback {
        items,
        done: 0,
        undo,
    };

    for item in items {
        // If this returns early or unwinds, `rollback` walks back
        apply(item)?;
        rollback.done += 1;
    }

    mem::forget(rollback);
    Ok(())
}

/// The infallible variant of [`try_for_each_or_undo`]. Only a panic can
/// trigger the rollback.
#[inline]
pub fn for_each_or_undo<T>(items: &[T], mut apply: impl FnMut(&T), undo: impl FnMut(&T)) {
    let result = try_for_each_or_undo(
        items,
        |item| {
            apply(item);
            Ok::<(), core::convert::Infallible>(())
        },
        undo,
    );
    match result {
        Ok(()) => {}
        Err(never) => match never {},
    }
}

/// Call `f`. If it panics, call `undo` before the panic propagates.
pub fn undo_on_unwind<R>(f: impl FnOnce() -> R, undo: impl FnOnce()) -> R {
    struct Undo<F: FnOnce()>(Option<F>);

    impl<F: FnOnce()> Drop for Undo<F> {
        #[inline]
        fn drop(&mut self) {
            if let Some(undo) = self.0.take() {
                undo();
            }
        }
    }

    let undo = Undo(Some(undo));
    let output = f();
    mem::forget(undo);
    output
}

/// Settle the outcome of a release performed by a lock guard.
///
/// When `unwinding` is set, the thread is already panicking and raising
/// another panic would abort the process, so a failure is logged and
/// swallowed. Otherwise it's returned as is.
pub fn suppress_if_unwinding<E: core::fmt::Display>(
    result: Result<(), E>,
    unwinding: bool,
    what: &str,
) -> Result<(), E> {
    match result {
        Err(e) if unwinding => {
            log::error!("{} failed during unwinding, ignoring: {}", what, e);
            Ok(())
        }
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, panic};

    #[test]
    fn rollback_on_error() {
        let log = RefCell::new(Vec::new());
        let result = try_for_each_or_undo(
            &[1, 2, 3, 4],
            |&x| {
                if x == 3 {
                    return Err("three");
                }
                log.borrow_mut().push(x);
                Ok(())
            },
            |&x| log.borrow_mut().push(-x),
        );
        assert_eq!(result, Err("three"));
        assert_eq!(*log.borrow(), [1, 2, -2, -1]);
    }

    #[test]
    fn no_rollback_on_success() {
        let log = RefCell::new(Vec::new());
        for_each_or_undo(
            &[1, 2, 3],
            |&x| log.borrow_mut().push(x),
            |_| unreachable!(),
        );
        assert_eq!(*log.borrow(), [1, 2, 3]);
    }

    #[test]
    fn rollback_on_panic() {
        let undone = RefCell::new(Vec::new());
        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            for_each_or_undo(
                &[1, 2, 3],
                |&x| {
                    if x == 3 {
                        panic!("boom");
                    }
                },
                |&x| undone.borrow_mut().push(x),
            )
        }));
        assert!(result.is_err());
        assert_eq!(*undone.borrow(), [2, 1]);
    }

    #[test]
    fn undo_only_on_panic() {
        let undone = RefCell::new(0);
        assert_eq!(undo_on_unwind(|| 42, || *undone.borrow_mut() += 1), 42);
        assert_eq!(*undone.borrow(), 0);

        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            undo_on_unwind(|| panic!("boom"), || *undone.borrow_mut() += 1)
        }));
        assert!(result.is_err());
        assert_eq!(*undone.borrow(), 1);
    }

    #[test]
    fn suppress_only_while_unwinding() {
        assert_eq!(suppress_if_unwinding(Err("nope"), true, "test"), Ok(()));
        assert_eq!(suppress_if_unwinding(Err("nope"), false, "test"), Err("nope"));
        assert_eq!(suppress_if_unwinding::<&str>(Ok(()), false, "test"), Ok(()));
    }
}
