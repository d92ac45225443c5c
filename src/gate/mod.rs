//! Core gate protocol: token lifecycle, redirect guard, session grants, and
//! the flow controller that ties them to the external shortener hop.

pub mod flow;
pub mod guard;
pub mod session;
pub mod store;
pub mod token;

use std::sync::{Mutex, MutexGuard, PoisonError};

// Recover the guard on poisoning; every store write is a single-step update.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
