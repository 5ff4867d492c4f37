//! Per-thread re-entrancy marker.
//!
//! While a thread is inside the engine (deciding, loading permits, writing
//! a log line), every intercepted call it makes must pass straight through.

use std::cell::Cell;

thread_local! {
    static INSIDE: Cell<bool> = const { Cell::new(false) };
}

/// RAII marker for "this thread is inside the engine".
#[derive(Debug)]
pub struct Reentry(());

impl Reentry {
    /// Marks the thread, or returns `None` if it is already inside (or its
    /// thread-local storage is being torn down).
    pub fn enter() -> Option<Self> {
        INSIDE
            .try_with(|inside| (!inside.replace(true)).then_some(Self(())))
            .ok()
            .flatten()
    }

}

impl Drop for Reentry {
    fn drop(&mut self) {
        let _ = INSIDE.try_with(|inside| inside.set(false));
    }
}
