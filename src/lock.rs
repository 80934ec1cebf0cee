//! The heap lock guarding all `GcHeap` state mutation.
//!
//! Attempts a non-blocking acquire first, and only if that fails,
//! transitions the calling thread's status to "waiting on VM" before
//! blocking. This is what lets the collector treat any heap-lock waiter
//! as already suspended.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::threads::{ThreadStatus, ThreadSuspension};

/// The mutex guarding all mutation of `GcHeap` state.
pub struct HeapLock {
    mutex: Mutex<()>,
    threads: Arc<dyn ThreadSuspension>,
}

impl HeapLock {
    #[must_use]
    pub fn new(threads: Arc<dyn ThreadSuspension>) -> Self {
        Self {
            mutex: Mutex::new(()),
            threads,
        }
    }

    /// Acquires the lock, declaring "waiting-on-VM" first if the fast
    /// non-blocking path fails.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        if let Some(guard) = self.mutex.try_lock() {
            return guard;
        }
        let thread = self.threads.current();
        let old_status = self.threads.change_status(thread, ThreadStatus::WaitingOnVm);
        let guard = self.mutex.lock();
        self.threads.change_status(thread, old_status);
        guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockThreads;
    use std::sync::Arc;

    #[test]
    fn uncontended_lock_never_changes_status() {
        let threads = Arc::new(MockThreads::new());
        let lock = HeapLock::new(threads.clone());
        let _guard = lock.lock();
        assert_eq!(threads.status_change_count(), 0);
    }

    #[test_log::test]
    fn contended_lock_declares_waiting_on_vm() {
        let threads = Arc::new(MockThreads::new());
        let lock = Arc::new(HeapLock::new(threads.clone()));

        let first = lock.lock();
        let lock2 = lock.clone();
        let handle = std::thread::spawn(move || {
            let _guard = lock2.lock();
        });

        // Give the spawned thread a moment to hit the contended path.
        std::thread::sleep(std::time::Duration::from_millis(50));
        drop(first);
        handle.join().unwrap();

        assert!(threads.status_change_count() >= 1);
    }
}
