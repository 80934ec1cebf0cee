//! Heap-worker queue access and the tracked-allocation table shared
//! between the allocating mutator and the heap-worker thread.
//!
//! The tracked-allocation table roots an object against the next
//! collection without making it part of any durable queue: a mutator
//! uses it to keep a just-allocated object alive until it can publish
//! a reference into the root set, and the worker uses it to keep an
//! object alive for the duration of its finalizer or reference
//! enqueue.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;

use crate::object::ManagedObject;
use crate::queues::{WorkerItem, WorkerQueues};
use crate::threads::ThreadId;

/// Per-thread set of objects that must survive any collection that
/// runs before the owning thread can publish or release them.
///
/// Modeled as counts rather than a `HashSet` because the same object
/// can legitimately be tracked for more than one reason at once (e.g.
/// freshly allocated by a thread that is also the heap worker).
#[derive(Default)]
pub struct TrackedAllocs {
    inner: Mutex<HashMap<ThreadId, HashMap<ManagedObject, u32>>>,
}

impl TrackedAllocs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, thread: ThreadId, object: ManagedObject) {
        *self
            .inner
            .lock()
            .entry(thread)
            .or_default()
            .entry(object)
            .or_insert(0) += 1;
    }

    /// Releases one tracking reference. A no-op if the object was not
    /// tracked for this thread (defensive: a double-release must not
    /// panic, since the caller cannot always tell who tracked what).
    pub fn release(&self, thread: ThreadId, object: ManagedObject) {
        let mut guard = self.inner.lock();
        if let Some(table) = guard.get_mut(&thread) {
            if let Some(count) = table.get_mut(&object) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    table.remove(&object);
                }
            }
            if table.is_empty() {
                guard.remove(&thread);
            }
        }
    }

    #[must_use]
    pub fn is_tracked(&self, object: ManagedObject) -> bool {
        self.inner
            .lock()
            .values()
            .any(|table| table.contains_key(&object))
    }
}

/// The heap-worker's view of whatever finalizer/reference operation it
/// is currently in the middle of, consulted by the GC-entry watchdog to
/// detect a wedged worker.
#[derive(Default)]
pub struct WorkerActivity {
    current: Mutex<Option<ActiveItem>>,
}

struct ActiveItem {
    item: WorkerItem,
    started_at: Instant,
}

impl WorkerActivity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn begin(&self, item: WorkerItem) {
        *self.current.lock() = Some(ActiveItem {
            item,
            started_at: Instant::now(),
        });
    }

    fn end(&self) {
        *self.current.lock() = None;
    }

    /// How long the worker has been stuck on its current item, if any.
    /// A watchdog hook compares this against a timeout to decide
    /// whether the worker thread is wedged.
    #[must_use]
    pub fn current_duration(&self) -> Option<std::time::Duration> {
        self.current
            .lock()
            .as_ref()
            .map(|active| active.started_at.elapsed())
    }
}

/// Dequeues the next item for the heap-worker thread, reference
/// operations ahead of pending finalization, and roots its object in
/// the tracked-allocation table so the next collection cannot reclaim
/// it mid-finalization.
pub fn get_next_heap_worker_object(
    queues: &WorkerQueues,
    tracked: &TrackedAllocs,
    activity: &WorkerActivity,
    worker_thread: ThreadId,
) -> Option<WorkerItem> {
    let item = queues.pop_for_worker()?;
    tracked.track(worker_thread, item.object);
    activity.begin(item);
    Some(item)
}

/// Releases the tracking reference taken by [`get_next_heap_worker_object`]
/// once the worker has finished with `item`.
pub fn release_tracked_alloc(
    tracked: &TrackedAllocs,
    activity: &WorkerActivity,
    worker_thread: ThreadId,
    item: WorkerItem,
) {
    tracked.release(worker_thread, item.object);
    activity.end();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_object_survives_duplicate_tracking_until_both_released() {
        let tracked = TrackedAllocs::new();
        let object = ManagedObject::from_addr(0x1000);
        let thread = ThreadId(1);

        tracked.track(thread, object);
        tracked.track(thread, object);
        assert!(tracked.is_tracked(object));

        tracked.release(thread, object);
        assert!(tracked.is_tracked(object));

        tracked.release(thread, object);
        assert!(!tracked.is_tracked(object));
    }

    #[test]
    fn worker_pops_reference_before_finalization_and_tracks_it() {
        let queues = WorkerQueues::new();
        let tracked = TrackedAllocs::new();
        let activity = WorkerActivity::new();
        let worker = ThreadId(99);

        let object = ManagedObject::from_addr(0x2000);
        queues.push_reference_operation(object);

        let item = get_next_heap_worker_object(&queues, &tracked, &activity, worker).unwrap();
        assert_eq!(item.object, object);
        assert!(tracked.is_tracked(object));
        assert!(activity.current_duration().is_some());

        release_tracked_alloc(&tracked, &activity, worker, item);
        assert!(!tracked.is_tracked(object));
        assert!(activity.current_duration().is_none());
    }
}
