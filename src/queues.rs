//! The durable finalizer/reference queues.
//!
//! Grounded on an insertion-ordered, append-one/pop-one growable table
//! pattern; `VecDeque` gives us that directly.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::object::ManagedObject;

/// Which durable queue a worker dequeued from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOp {
    /// Popped from `referenceOperations`: enqueue this reference object
    /// onto its referent's `ReferenceQueue`.
    Enqueue,
    /// Popped from `pendingFinalization`: run this object's finalizer.
    Finalize,
}

/// A result of a dequeue attempt handed to the heap-worker thread.
#[derive(Debug, Clone, Copy)]
pub struct WorkerItem {
    pub object: ManagedObject,
    pub op: WorkerOp,
}

/// The three durable, insertion-ordered queues, guarded by a single
/// lock — the heap-worker list lock, which is always acquired *inside*
/// the heap lock.
#[derive(Default)]
pub struct WorkerQueues {
    inner: Mutex<WorkerQueuesInner>,
}

#[derive(Default)]
struct WorkerQueuesInner {
    finalizable: VecDeque<ManagedObject>,
    pending_finalization: VecDeque<ManagedObject>,
    reference_operations: VecDeque<ManagedObject>,
}

impl WorkerQueues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a newly allocated finalizable object.
    pub fn push_finalizable(&self, object: ManagedObject) {
        self.inner.lock().finalizable.push_back(object);
    }

    /// Moves every currently-finalizable object that the sweep
    /// determined is unreachable into pending finalization; finalizable
    /// objects move to pending finalization only during sweep.
    /// `is_unreachable` is expected to consult the tracer's mark bitmap.
    pub fn move_unreachable_to_pending(&self, mut is_unreachable: impl FnMut(ManagedObject) -> bool) {
        let mut guard = self.inner.lock();
        let mut remaining = VecDeque::with_capacity(guard.finalizable.len());
        while let Some(obj) = guard.finalizable.pop_front() {
            if is_unreachable(obj) {
                guard.pending_finalization.push_back(obj);
            } else {
                remaining.push_back(obj);
            }
        }
        guard.finalizable = remaining;
    }

    /// Appends a reference object awaiting enqueue.
    pub fn push_reference_operation(&self, object: ManagedObject) {
        self.inner.lock().reference_operations.push_back(object);
    }

    /// Dequeues the next item for the heap-worker thread: reference
    /// operations take priority over pending finalization. Returns
    /// `None` if both queues are empty.
    pub fn pop_for_worker(&self) -> Option<WorkerItem> {
        let mut guard = self.inner.lock();
        if let Some(object) = guard.reference_operations.pop_front() {
            return Some(WorkerItem {
                object,
                op: WorkerOp::Enqueue,
            });
        }
        guard
            .pending_finalization
            .pop_front()
            .map(|object| WorkerItem {
                object,
                op: WorkerOp::Finalize,
            })
    }

    #[must_use]
    pub fn finalizable_len(&self) -> usize {
        self.inner.lock().finalizable.len()
    }

    #[must_use]
    pub fn pending_finalization_len(&self) -> usize {
        self.inner.lock().pending_finalization.len()
    }

    #[must_use]
    pub fn reference_operations_len(&self) -> usize {
        self.inner.lock().reference_operations.len()
    }

    /// Releases all three queues.
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        guard.finalizable.clear();
        guard.pending_finalization.clear();
        guard.reference_operations.clear();
    }
}
