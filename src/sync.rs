//! Guarded shared state
//!
//! `Guarded<T>` wraps a value in a mutex and only exposes it through
//! closures, so every read and every write is serialized and a guard can
//! never escape the call. Both accessors block the calling thread until
//! the lock is free; closures must not re-enter the same `Guarded`.

use parking_lot::Mutex;
use std::fmt;

pub struct Guarded<T> {
    value: Mutex<T>,
}

impl<T> Guarded<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    /// Read access under the lock
    pub fn get<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.lock())
    }

    /// Write access under the lock
    pub fn mutate<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.value.lock())
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Clone> Guarded<T> {
    pub fn snapshot(&self) -> T {
        self.get(T::clone)
    }
}

impl<T: Default> Default for Guarded<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Guarded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.get(|value| f.debug_tuple("Guarded").field(value).finish())
    }
}
