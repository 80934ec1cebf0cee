//! Out-of-memory reporting.
//!
//! OOM reporting runs without the heap lock held and is re-entrant:
//! constructing the OOM error can itself allocate (on a VM with
//! managed exception objects), so a thread already in the middle of
//! throwing one must not recurse into the normal path.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::error::Error;
use crate::threads::{ThreadId, ThreadSuspension};

/// Tracks, per thread, whether that thread is currently in the middle
/// of constructing an OOM error.
#[derive(Default)]
pub struct OomThrower {
    throwing: Mutex<HashSet<ThreadId>>,
}

impl OomThrower {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports an allocation failure of `requested` bytes on the
    /// calling thread. Returns `None` if the thread is not attached
    /// (no one to receive the exception); otherwise
    /// returns the error to hand back to the caller.
    ///
    /// A thread that is already throwing an OOM (recursive allocation
    /// during error construction) gets the same stackless variant
    /// back without re-entering the throwing state.
    pub fn throw(&self, threads: &dyn ThreadSuspension, requested: usize) -> Option<Error> {
        let thread = threads.current();
        if !threads.is_on_thread_list(thread) {
            return None;
        }

        let mut guard = self.throwing.lock();
        if guard.contains(&thread) {
            // Recursive: use the pre-built stackless singleton rather
            // than constructing a fresh (detail-bearing) error, which
            // would allocate again.
            return Some(Error::OutOfMemory { requested: 0 });
        }
        guard.insert(thread);
        drop(guard);

        let err = Error::OutOfMemory { requested };
        self.throwing.lock().remove(&thread);
        Some(err)
    }
}
