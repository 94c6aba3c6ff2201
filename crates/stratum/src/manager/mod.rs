//! Model listeners that keep the drawing arranged
//!
//! [`SwimlaneManager`] keeps sibling lanes the same size and
//! [`LayoutManager`] re-runs the layouts of every container a transaction
//! touched. Both do their work inside the committing transaction.

mod layout;
mod swimlane;

pub use layout::{LayoutCellsEvent, LayoutManager};
pub use swimlane::SwimlaneManager;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock shared manager state, ignoring poisoning from a panicked subscriber
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
