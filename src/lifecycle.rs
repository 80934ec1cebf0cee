//! `GcHeap`: the process-wide handle tying every collaborator and
//! internal module together.
//!
//! There is deliberately no hidden global singleton: a host VM calls
//! [`GcHeap::start`] once with its own collaborators and configuration
//! and threads the returned handle through every subsequent call,
//! avoiding any hidden global initialization.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::allocator::{self, AllocFlags};
use crate::card_table::CardTable;
use crate::config::HeapConfig;
use crate::error::{Error, Result};
use crate::heap_source::HeapSource;
use crate::lock::HeapLock;
use crate::object::ManagedObject;
use crate::oom::OomThrower;
use crate::queues::WorkerQueues;
use crate::safepoint::SuspensionCoordinator;
use crate::stats::AllocProfile;
use crate::threads::{ThreadId, ThreadSuspension};
use crate::tracer::Tracer;
use crate::worker::{self, TrackedAllocs, WorkerActivity};

/// Which lifecycle stage the heap is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Started,
    Shutdown,
}

/// The process-wide managed-heap handle. Constructed once via
/// [`GcHeap::start`] and shared (typically via `Arc`) between every
/// mutator thread and the heap-worker thread.
pub struct GcHeap {
    pub(crate) heap_source: Arc<dyn HeapSource>,
    pub(crate) tracer: Arc<dyn Tracer>,
    pub(crate) threads: Arc<dyn ThreadSuspension>,
    pub(crate) card_table: Arc<dyn CardTable>,
    pub(crate) config: HeapConfig,

    pub(crate) heap_lock: HeapLock,
    pub(crate) gc_running: AtomicBool,
    pub(crate) gc_complete: Condvar,
    pub(crate) heap_worker_mutex: Mutex<()>,

    pub(crate) queues: WorkerQueues,
    pub(crate) tracked: TrackedAllocs,
    pub(crate) worker_activity: WorkerActivity,

    pub(crate) stats: AllocProfile,
    pub(crate) oom: OomThrower,
    pub(crate) safepoint: SuspensionCoordinator,

    pub(crate) collect_count: AtomicUsize,
    stage: Mutex<Stage>,
}

impl GcHeap {
    /// Starts the heap: initializes the card table against
    /// `config.maximum_size`, and sets up every internal module.
    ///
    /// The heap source itself is not constructed here — it is an
    /// external collaborator already brought up by its
    /// own `start(startingSize, maximumSize, growthLimit)` and handed
    /// in as `heap_source`. Returns a startup failure if the card
    /// table refuses to start.
    pub fn start(
        heap_source: Arc<dyn HeapSource>,
        tracer: Arc<dyn Tracer>,
        threads: Arc<dyn ThreadSuspension>,
        card_table: Arc<dyn CardTable>,
        config: HeapConfig,
    ) -> Result<Arc<Self>> {
        if !card_table.start(config.maximum_size) {
            return Err(Error::StartupFailed("card table failed to start".into()));
        }

        let alloc_prof_enabled = config.alloc_prof_enabled;
        let heap = Arc::new(Self {
            heap_lock: HeapLock::new(threads.clone()),
            gc_running: AtomicBool::new(false),
            gc_complete: Condvar::new(),
            heap_worker_mutex: Mutex::new(()),
            queues: WorkerQueues::new(),
            tracked: TrackedAllocs::new(),
            worker_activity: WorkerActivity::new(),
            stats: AllocProfile::new(alloc_prof_enabled),
            oom: OomThrower::new(),
            safepoint: SuspensionCoordinator::new(threads.clone()),
            collect_count: AtomicUsize::new(0),
            stage: Mutex::new(Stage::Started),
            heap_source,
            tracer,
            threads,
            card_table,
            config,
        });
        Ok(heap)
    }

    /// Post-`fork()` reinitialization.
    pub fn post_fork(&self) {
        self.heap_source.post_fork();
    }

    /// Tears down the heap: releases all three durable queues, the
    /// card table, and the heap source. Any stray pointer into the
    /// (now unmapped) heap is invalid afterward.
    pub fn shutdown(&self) {
        *self.stage.lock() = Stage::Shutdown;
        self.queues.clear();
        self.card_table.shutdown();
        self.heap_source.shutdown();
    }

    /// Stops internal collector threads owned by the heap source
    /// owned by the heap source.
    pub fn thread_shutdown(&self) {
        self.heap_source.thread_shutdown();
    }

    /// Allocates `size` bytes with the given `flags`. Returns a
    /// zero-initialized, 8-byte-aligned address on
    /// success, or an [`Error::OutOfMemory`] once the full ladder is
    /// exhausted.
    pub fn allocate(&self, size: usize, flags: AllocFlags) -> Result<ManagedObject> {
        allocator::allocate(self, size, flags)
    }

    /// Runs one collection cycle directly (used for
    /// [`crate::collector::GcReason::Explicit`]/`Concurrent` cycles;
    /// the allocation ladder drives `ForMalloc` cycles itself).
    pub fn collect(&self, clear_soft_refs: bool, reason: crate::collector::GcReason) {
        let mut guard = Some(self.heap_lock.lock());
        crate::collector::collect(self, &mut guard, clear_soft_refs, reason);
    }

    /// True iff `object` is non-null, 8-byte aligned, and present in
    /// the heap source's live bitmap. Safe to call
    /// without the heap lock.
    #[must_use]
    pub fn is_valid_object(&self, object: ManagedObject) -> bool {
        object.is_aligned() && self.heap_source.is_live(object)
    }

    /// Dequeues the next item for the heap-worker thread.
    pub fn next_heap_worker_object(&self, worker_thread: ThreadId) -> Option<crate::queues::WorkerItem> {
        worker::get_next_heap_worker_object(
            &self.queues,
            &self.tracked,
            &self.worker_activity,
            worker_thread,
        )
    }

    /// Releases the tracking reference taken by
    /// [`Self::next_heap_worker_object`] once the worker has finished.
    pub fn release_tracked_alloc(&self, worker_thread: ThreadId, item: crate::queues::WorkerItem) {
        worker::release_tracked_alloc(&self.tracked, &self.worker_activity, worker_thread, item);
    }

    /// Number of completed or in-progress `collect()` invocations that
    /// actually ran (recursive/dropped requests do not count).
    #[must_use]
    pub fn collect_call_count(&self) -> usize {
        self.collect_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn finalizable_queue_len(&self) -> usize {
        self.queues.finalizable_len()
    }

    #[must_use]
    pub fn pending_finalization_len(&self) -> usize {
        self.queues.pending_finalization_len()
    }

    #[must_use]
    pub fn is_gc_running(&self) -> bool {
        self.gc_running.load(Ordering::Acquire)
    }

    /// Exposes the raw `gc_running` flag so integration tests can force
    /// it without driving an actual cycle, to exercise the recursive-
    /// collection drop path from outside the crate.
    #[doc(hidden)]
    #[must_use]
    pub fn gc_running_for_test(&self) -> &AtomicBool {
        &self.gc_running
    }
}
