//! Poison-tolerant lock helpers.
//!
//! Every critical section in this crate leaves the guarded state consistent
//! before calling out, so a poisoned lock is safe to reuse.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
