//! Write-once cell for `no_std`.
//!
//! [`OnceLock`] holds a value that is published exactly once and read
//! lock-free afterwards. Unlike a lazy cell it has no initializer: the first
//! [`set`](OnceLock::set) wins and later ones hand their value back, which
//! is how the HAL reports a second `init` as busy.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU8, Ordering};

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const READY: u8 = 2;

/// A cell that can be written once.
pub struct OnceLock<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: The value is written once before READY is published with Release,
// and only read after READY is observed with Acquire.
unsafe impl<T: Send + Sync> Sync for OnceLock<T> {}
unsafe impl<T: Send> Send for OnceLock<T> {}

impl<T> OnceLock<T> {
    /// Creates an empty cell.
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Stores `value` if the cell is empty.
    ///
    /// # Errors
    ///
    /// Returns `value` back if the cell was already set or is being set by
    /// another core.
    pub fn set(&self, value: T) -> Result<(), T> {
        if self
            .state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(value);
        }
        // SAFETY: We own the WRITING state; nobody reads before READY.
        unsafe { (*self.value.get()).write(value) };
        self.state.store(READY, Ordering::Release);
        Ok(())
    }

    /// Returns the value if it has been published.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == READY {
            // SAFETY: READY implies the value is initialized and never moves.
            Some(unsafe { (*self.value.get()).assume_init_ref() })
        } else {
            None
        }
    }

    /// Returns whether a value has been published.
    pub fn is_set(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }
}

impl<T> Default for OnceLock<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for OnceLock<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == READY {
            // SAFETY: READY implies initialized; we have exclusive access.
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn empty_until_set() {
        let cell = OnceLock::new();
        assert!(cell.get().is_none());
        assert!(cell.set(7).is_ok());
        assert_eq!(cell.get(), Some(&7));
    }

    #[test]
    fn second_set_returns_value() {
        let cell = OnceLock::new();
        cell.set(String::from("first")).unwrap();
        assert_eq!(cell.set(String::from("second")), Err(String::from("second")));
        assert_eq!(cell.get().map(String::as_str), Some("first"));
    }

    #[test]
    fn racing_setters_one_wins() {
        let cell = Arc::new(OnceLock::new());
        let wins = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cell = Arc::clone(&cell);
                let wins = Arc::clone(&wins);
                std::thread::spawn(move || {
                    if cell.set(i).is_ok() {
                        wins.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(wins.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(cell.is_set());
    }

    #[test]
    fn drops_stored_value() {
        let marker = Arc::new(());
        {
            let cell = OnceLock::new();
            cell.set(Arc::clone(&marker)).unwrap();
            assert_eq!(Arc::strong_count(&marker), 2);
        }
        assert_eq!(Arc::strong_count(&marker), 1);
    }
}
