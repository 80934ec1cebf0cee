//! The allocation ladder: the multi-attempt `allocate` path that must
//! preserve correctness across a concurrently running collection
//! before it reports exhaustion.

use crate::collector::{self, GcReason};
use crate::error::{Error, Result};
use crate::lifecycle::GcHeap;
use crate::object::ManagedObject;

/// Flags an allocation request may carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocFlags {
    /// The object's class declares a non-trivial finalizer; append it
    /// to the `finalizable` queue on success.
    pub finalizable: bool,
    /// Skip publishing the object into the calling thread's
    /// tracked-allocation table. Used by callers (e.g. the heap worker
    /// itself) that already root the object some other way.
    pub dont_track: bool,
}

impl AllocFlags {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            finalizable: false,
            dont_track: false,
        }
    }

    #[must_use]
    pub const fn finalizable() -> Self {
        Self {
            finalizable: true,
            dont_track: false,
        }
    }
}

/// Runs the allocation ladder under the heap lock, then performs the
/// post-allocation bookkeeping (queueing, counters, tracked-alloc
/// publication, OOM reporting).
pub(crate) fn allocate(heap: &GcHeap, size: usize, flags: AllocFlags) -> Result<ManagedObject> {
    let thread = heap.threads.current();
    let mut guard = Some(heap.heap_lock.lock());

    let suppressed = heap
        .config
        .gc_suppression_policy
        .suppress_gc_for_current_thread(heap.threads.as_ref());

    let result = run_ladder(heap, size, suppressed, &mut guard);

    match result {
        Some(object) => {
            if flags.finalizable {
                heap.queues.push_finalizable(object);
            }
            heap.stats.record_alloc(thread, size);
            drop(guard);
            if !flags.dont_track {
                heap.tracked.track(thread, object);
            }
            Ok(object)
        }
        None => {
            heap.stats.record_failed_alloc(thread, size);
            drop(guard);
            match heap.oom.throw(heap.threads.as_ref(), size) {
                Some(err) => Err(err),
                None => Err(Error::OutOfMemory { requested: size }),
            }
        }
    }
}

/// Steps 1-7 of the ladder. `guard` is held on entry; it may be
/// released and reacquired internally (step 3's wait, and inside any
/// `collect()` call for a concurrent cycle — not reachable here since
/// this ladder only ever drives [`GcReason::ForMalloc`] collections,
/// which are always stop-the-world, but the signature still threads
/// the guard through for symmetry with `collector::collect`).
fn run_ladder<'a>(
    heap: &'a GcHeap,
    size: usize,
    suppressed: bool,
    guard: &mut Option<parking_lot::MutexGuard<'a, ()>>,
) -> Option<ManagedObject> {
    // Step 1: size guard. A request at or above the growth limit skips
    // straight to the soft-reference collection step; it can never be
    // satisfied by the fast path or a bounded grow.
    if size >= heap.config.growth_limit {
        return soft_ref_collect_then_grow(heap, size, suppressed, guard);
    }

    // Step 2: fast path.
    if let Some(object) = heap.heap_source.alloc(size) {
        return Some(object);
    }

    // Step 3: if a concurrent cycle is running, wait for it rather
    // than racing a foreground collection against it.
    if heap.gc_running.load(std::sync::atomic::Ordering::Acquire) {
        let mut g = guard.take().expect("heap lock held in allocation ladder");
        collector::wait_for_concurrent_gc_to_complete(heap, &mut g);
        *guard = Some(g);
        if let Some(object) = heap.heap_source.alloc(size) {
            return Some(object);
        }
    }

    // Step 4: foreground partial collection, skipped for a thread the
    // suppression policy carves out (e.g. a debugger thread).
    if !suppressed {
        collector::collect(heap, guard, false, GcReason::ForMalloc);
        if let Some(object) = heap.heap_source.alloc(size) {
            return Some(object);
        }
    }

    // Step 5: grow.
    if let Some(object) = heap.heap_source.alloc_and_grow(size) {
        return Some(object);
    }

    if suppressed {
        // A suppressed thread may only grow or fail; it never triggers
        // the soft-reference collection in step 6 either.
        return None;
    }

    soft_ref_collect_then_grow(heap, size, suppressed, guard)
}

/// Steps 6-7: clear soft references, then retry allocate-and-grow.
fn soft_ref_collect_then_grow<'a>(
    heap: &'a GcHeap,
    size: usize,
    suppressed: bool,
    guard: &mut Option<parking_lot::MutexGuard<'a, ()>>,
) -> Option<ManagedObject> {
    if suppressed {
        return None;
    }
    collector::collect(heap, guard, true, GcReason::ForMalloc);
    heap.heap_source.alloc_and_grow(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card_table::CardTable;
    use crate::config::HeapConfig;
    use crate::heap_source::HeapSource;
    use crate::mock::{MockCardTable, MockHeapSource, MockThreads, MockTracer};
    use crate::tracer::Tracer;
    use std::sync::Arc;

    fn test_heap(config: HeapConfig) -> (Arc<GcHeap>, Arc<MockHeapSource>, Arc<MockTracer>) {
        let heap_source = Arc::new(MockHeapSource::new());
        let tracer = Arc::new(MockTracer::new());
        let threads = Arc::new(MockThreads::new());
        let card_table = Arc::new(MockCardTable::new());
        let heap = GcHeap::start(
            heap_source.clone() as Arc<dyn HeapSource>,
            tracer.clone() as Arc<dyn Tracer>,
            threads as Arc<dyn crate::threads::ThreadSuspension>,
            card_table as Arc<dyn CardTable>,
            config,
        )
        .unwrap();
        (heap, heap_source, tracer)
    }

    /// A small allocation that succeeds on the fast path never
    /// touches the collector.
    #[test]
    fn small_allocation_no_gc() {
        let (heap, heap_source, _tracer) = test_heap(HeapConfig::new(1 << 16, 1 << 20, 0));
        heap_source.push_alloc_response(Some(ManagedObject::from_addr(0x1000)));

        let object = heap.allocate(32, AllocFlags::none()).unwrap();
        assert_eq!(object, ManagedObject::from_addr(0x1000));
        assert_eq!(heap_source.alloc_call_count(), 1);
        assert_eq!(heap.collect_call_count(), 0);
    }

    /// Scenario 2: fast path fails, foreground GC runs, retry succeeds.
    #[test]
    fn fast_path_fail_then_foreground_gc_succeeds() {
        let (heap, heap_source, _tracer) = test_heap(HeapConfig::new(1 << 16, 1 << 20, 0));
        heap_source.push_alloc_response(None);
        heap_source.push_alloc_response(Some(ManagedObject::from_addr(0x2000)));

        let object = heap.allocate(64, AllocFlags::none()).unwrap();
        assert_eq!(object, ManagedObject::from_addr(0x2000));
        assert_eq!(heap.collect_call_count(), 1);
    }

    /// Scenario 4: every rung fails until the terminal soft-ref step.
    #[test]
    fn full_ladder_exhaustion_throws_oom() {
        let (heap, heap_source, _tracer) = test_heap(HeapConfig::new(1 << 16, 1 << 20, 0));
        for _ in 0..2 {
            heap_source.push_alloc_response(None);
        }
        for _ in 0..2 {
            heap_source.push_alloc_and_grow_response(None);
        }

        let err = heap.allocate(128, AllocFlags::none()).unwrap_err();
        assert!(matches!(err, Error::OutOfMemory { .. }));
        assert_eq!(heap.collect_call_count(), 2);
        assert_eq!(heap_source.alloc_call_count(), 2);
        assert_eq!(heap_source.alloc_and_grow_call_count(), 2);
    }

    /// Scenario 5: a finalizable allocation lands in the durable queue.
    #[test]
    fn finalizable_allocation_is_enqueued() {
        let (heap, heap_source, _tracer) = test_heap(HeapConfig::new(1 << 16, 1 << 20, 0));
        heap_source.push_alloc_response(Some(ManagedObject::from_addr(0x3000)));

        let object = heap.allocate(48, AllocFlags::finalizable()).unwrap();
        assert_eq!(heap.finalizable_queue_len(), 1);
        assert_eq!(object, ManagedObject::from_addr(0x3000));
    }

    /// A request at or above `growth_limit` skips straight to the
    /// soft-reference collection step.
    #[test]
    fn oversized_request_skips_to_soft_ref_collection() {
        let (heap, heap_source, _tracer) = test_heap(HeapConfig::new(1 << 16, 1 << 20, 1 << 10));
        heap_source.push_alloc_and_grow_response(Some(ManagedObject::from_addr(0x4000)));

        let object = heap.allocate(1 << 10, AllocFlags::none()).unwrap();
        assert_eq!(object, ManagedObject::from_addr(0x4000));
        assert_eq!(heap.collect_call_count(), 1);
        assert_eq!(heap_source.alloc_call_count(), 0);
    }
}
