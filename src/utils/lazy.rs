//! Fallible initialize-once cells.
//!
//! [`std::sync::OnceLock`] cannot run a fallible initializer on stable Rust. [`TryOnce`]
//! pairs it with a mutex so that exactly one initializer runs to completion: racing
//! callers wait for the first one, and a failed initialization leaves the cell empty so
//! the next caller retries and sees its own error.

use std::sync::{Mutex, OnceLock};

use crate::Result;

/// A cell that is written at most once by a fallible initializer.
///
/// The initializer must not access the same cell again, which would deadlock.
///
/// # Examples
///
/// ```rust
/// use optoscope::utils::TryOnce;
///
/// let cell: TryOnce<u32> = TryOnce::new();
/// assert!(cell.get_or_try_init(|| Err(optoscope::Error::NotInitialized)).is_err());
/// assert_eq!(*cell.get_or_try_init(|| Ok(7))?, 7);
/// assert_eq!(*cell.get_or_try_init(|| Ok(8))?, 7);
/// # Ok::<(), optoscope::Error>(())
/// ```
#[derive(Debug)]
pub struct TryOnce<T> {
    value: OnceLock<T>,
    init: Mutex<()>,
}

impl<T> TryOnce<T> {
    /// Creates an empty cell.
    #[must_use]
    pub const fn new() -> Self {
        TryOnce {
            value: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// Returns the value if the cell has been initialized.
    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    /// Returns the value, running `init` first if the cell is empty.
    ///
    /// # Errors
    ///
    /// Returns the initializer's error, or [`crate::Error::LockError`] if a previous
    /// initializer panicked.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.value.get() {
            return Ok(value);
        }

        let _guard = lock!(self.init);
        if let Some(value) = self.value.get() {
            return Ok(value);
        }

        let value = init()?;
        Ok(self.value.get_or_init(|| value))
    }
}

impl<T> Default for TryOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
    };

    use super::*;

    #[test]
    fn failed_init_is_retried() {
        let cell: TryOnce<String> = TryOnce::new();
        assert!(cell
            .get_or_try_init(|| Err(crate::Error::Error("first".into())))
            .is_err());
        assert!(cell.get().is_none());
        assert_eq!(cell.get_or_try_init(|| Ok("second".into())).unwrap(), "second");
        assert_eq!(cell.get().map(String::as_str), Some("second"));
    }

    #[test]
    fn racing_initializers_run_once() {
        let cell = Arc::new(TryOnce::<usize>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cell = Arc::clone(&cell);
                let runs = Arc::clone(&runs);
                thread::spawn(move || {
                    *cell
                        .get_or_try_init(|| {
                            runs.fetch_add(1, Ordering::SeqCst);
                            Ok(i)
                        })
                        .unwrap()
                })
            })
            .collect();

        let seen: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(seen.windows(2).all(|pair| pair[0] == pair[1]));
    }
}
