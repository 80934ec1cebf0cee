//! The collector driver: orchestrates one GC cycle through phases P0
//! (entry) to P10 (exit), and [`wait_for_concurrent_gc_to_complete`].
//!
//! The concurrent path takes the heap lock as `&mut
//! Option<HeapLockGuard>` so it can drop it (P2, P8) and reacquire it
//! (P4, P9) without the caller losing track of whether it is
//! currently held — the same "guarded scope with two exceptions"
//! discipline the heap lock requires. The stop-the-world path never
//! releases the heap lock and runs its whole pause, sweep included,
//! through [`SuspensionCoordinator::with_all_suspended`].

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use parking_lot::MutexGuard;

use crate::heap_source::HeapSourceStat;
use crate::lifecycle::GcHeap;
use crate::stats::{format_freed_bytes, percent_free};
use crate::threads::ThreadStatus;
use crate::tracer::{GcMode, ReferenceLists};

/// Why a cycle was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcReason {
    /// Triggered from the allocation ladder.
    ForMalloc,
    /// A background concurrent cycle.
    Concurrent,
    /// Requested directly by the hosted program.
    Explicit,
}

impl GcReason {
    fn mode(self) -> GcMode {
        match self {
            GcReason::ForMalloc => GcMode::Partial,
            GcReason::Concurrent | GcReason::Explicit => GcMode::Full,
        }
    }

    fn label(self) -> &'static str {
        match self {
            GcReason::ForMalloc => "for-malloc",
            GcReason::Concurrent => "concurrent",
            GcReason::Explicit => "explicit",
        }
    }
}

type HeapLockGuard<'a> = MutexGuard<'a, ()>;

/// Runs one collection cycle to completion. `guard` must hold the
/// heap lock on entry; it is left holding the heap lock on return
/// (even though it is released and reacquired in the middle, for a
/// [`GcReason::Concurrent`] cycle).
///
/// A call made while another cycle is already running is a dropped,
/// logged no-op.
#[tracing::instrument(skip(heap, guard), fields(reason = ?reason, clear_soft_refs))]
pub fn collect<'a>(
    heap: &'a GcHeap,
    guard: &mut Option<HeapLockGuard<'a>>,
    clear_soft_refs: bool,
    reason: GcReason,
) {
    assert!(guard.is_some(), "collect() requires the heap lock held");

    if heap.gc_running.swap(true, Ordering::AcqRel) {
        tracing::warn!("collection requested while one is already running; dropping");
        return;
    }

    // Phase P0: entry.
    let worker_guard = heap.heap_worker_mutex.lock();
    heap.collect_count.fetch_add(1, Ordering::Relaxed);
    heap.stats.record_gc(Some(heap.threads.current()));

    if !(heap.config.heap_worker_watchdog)() {
        tracing::error!("heap worker thread unresponsive at GC entry; aborting");
        std::process::abort();
    }

    let concurrent = reason == GcReason::Concurrent;
    let mode = reason.mode();

    let saved_priority = (!concurrent).then(|| heap.safepoint.elevate_priority());

    if heap.config.pre_verify {
        heap.card_table.verify();
    }

    let mut pauses = Vec::with_capacity(2);
    let mut references = ReferenceLists::default();

    if concurrent {
        let pause_start = Instant::now();
        heap.threads.suspend_all("gc-mark");

        // Phase P1: root mark.
        if !heap.tracer.begin_mark_step(mode) {
            tracing::error!("tracer failed to begin mark step");
            std::process::abort();
        }
        heap.tracer.mark_root_set();

        // Phase P2: release the heap lock and resume mutators for the
        // concurrent trace window. First pause ends here.
        heap.card_table.clear();
        heap.threads.resume_all("gc-mark");
        pauses.push(pause_start.elapsed());

        let released = guard.take().expect("heap lock held entering collect");
        drop(released);

        heap.tracer.scan_marked_objects(&mut references);

        // Phase P4: final mark. Second pause begins here.
        *guard = Some(heap.heap_lock.lock());
        let final_mark_start = Instant::now();
        heap.threads.suspend_all("gc-finalmark");

        heap.tracer.re_mark_root_set();
        if heap.config.verify_card_table {
            heap.card_table.verify();
        }
        heap.tracer.re_scan_marked_objects(&mut references);

        finish_cycle(heap, &mut references, clear_soft_refs);
        heap.threads.resume_all("gc-sweep");
        pauses.push(final_mark_start.elapsed());
        // Note: the pause above covers final-mark through bitmap swap;
        // the sweep itself (below) runs concurrently with mutators.
        sweep_and_exit(heap, guard, mode, &pauses, reason, worker_guard);
    } else {
        // Phases P1/P3/P9: root mark, trace and sweep all run inside
        // the single stop-the-world pause; mutators are resumed only
        // once the sweep has finished, at the very end of the cycle
        // (P10), not before it.
        let (sweep_result, pause) = heap.safepoint.with_all_suspended("gc-mark", || {
            if !heap.tracer.begin_mark_step(mode) {
                tracing::error!("tracer failed to begin mark step");
                std::process::abort();
            }
            heap.tracer.mark_root_set();
            heap.tracer.scan_marked_objects(&mut references);
            finish_cycle(heap, &mut references, clear_soft_refs);
            let result = heap.tracer.sweep_unmarked_objects(mode, false);
            heap.tracer.finish_mark_step();
            result
        });
        pauses.push(pause.duration);

        if let Some(saved) = saved_priority {
            heap.safepoint.restore_priority(saved);
        }

        let (objects_freed, bytes_freed) = sweep_result;
        finish_exit(heap, objects_freed, bytes_freed, &pauses, reason, worker_guard);
    }
}

/// Phases P5-P7: reference processing, system-weak sweep, bitmap
/// swap. Shared between the concurrent and stop-the-world paths; the
/// caller is responsible for releasing/resuming threads around it as
/// appropriate to its path.
fn finish_cycle(heap: &GcHeap, references: &mut ReferenceLists, clear_soft_refs: bool) {
    let to_enqueue = heap.tracer.process_references(references, clear_soft_refs);
    for object in to_enqueue {
        heap.queues.push_reference_operation(object);
    }
    heap.queues.move_unreachable_to_pending(|object| {
        let unreachable = !heap.tracer.is_marked(object);
        if unreachable {
            // Resurrect for one cycle: force the mark bit so sweep
            // does not reclaim it before the finalizer runs.
            heap.tracer.retain_for_finalization(object);
        }
        unreachable
    });
    heap.tracer.sweep_system_weaks();
    heap.heap_source.swap_bitmaps();
}

/// Phases P8-P10 for a concurrent cycle: the heap lock has already
/// been released by the caller before this runs, the sweep itself
/// proceeds while mutators continue running, and this function
/// reacquires the heap lock once it finishes.
fn sweep_and_exit<'a>(
    heap: &'a GcHeap,
    guard: &mut Option<HeapLockGuard<'a>>,
    mode: GcMode,
    pauses: &[Duration],
    reason: GcReason,
    worker_guard: MutexGuard<'a, ()>,
) {
    let released = guard.take().expect("heap lock held before concurrent sweep");
    drop(released);

    let (objects_freed, bytes_freed) = heap.tracer.sweep_unmarked_objects(mode, true);
    heap.tracer.finish_mark_step();

    *guard = Some(heap.heap_lock.lock());

    heap.heap_source.grow_for_utilization();
    heap.heap_source.schedule_trim(heap.config.trim_delay_secs);

    heap.gc_running.store(false, Ordering::Release);
    drop(worker_guard);
    heap.gc_complete.notify_all();

    if heap.config.post_verify {
        heap.card_table.verify();
    }

    log_cycle_complete(heap, reason, objects_freed, bytes_freed, pauses);
}

/// Phase P10 for a stop-the-world cycle: the sweep already ran inside
/// the single pause, and mutators are already resumed by the time
/// this is called, so there is no heap-lock or thread-suspension
/// bookkeeping left to do here.
fn finish_exit(
    heap: &GcHeap,
    objects_freed: usize,
    bytes_freed: usize,
    pauses: &[Duration],
    reason: GcReason,
    worker_guard: MutexGuard<'_, ()>,
) {
    heap.heap_source.grow_for_utilization();
    heap.heap_source.schedule_trim(heap.config.trim_delay_secs);

    heap.gc_running.store(false, Ordering::Release);
    drop(worker_guard);

    if heap.config.post_verify {
        heap.card_table.verify();
    }

    log_cycle_complete(heap, reason, objects_freed, bytes_freed, pauses);
}

fn log_cycle_complete(
    heap: &GcHeap,
    reason: GcReason,
    objects_freed: usize,
    bytes_freed: usize,
    pauses: &[Duration],
) {
    let allocated = heap.heap_source.value(HeapSourceStat::BytesAllocated);
    let footprint = heap.heap_source.value(HeapSourceStat::Footprint);
    tracing::info!(
        reason = reason.label(),
        objects_freed,
        bytes_freed = %format_freed_bytes(bytes_freed),
        percent_free = %format!("{:.0}%", percent_free(allocated, footprint)),
        allocated_kb = allocated / 1024,
        footprint_kb = footprint / 1024,
        pauses_ms = ?pauses.iter().map(Duration::as_millis).collect::<Vec<_>>(),
        "gc cycle complete"
    );
}

/// Blocks the calling thread (with the heap lock held) until the
/// currently running concurrent cycle completes, transitioning to
/// "waiting-on-VM" around each wait so the collector can still count
/// this thread as suspended.
pub fn wait_for_concurrent_gc_to_complete<'a>(heap: &'a GcHeap, guard: &mut HeapLockGuard<'a>) {
    let thread = heap.threads.current();
    while heap.gc_running.load(Ordering::Acquire) {
        let old_status = heap.threads.change_status(thread, ThreadStatus::WaitingOnVm);
        heap.gc_complete.wait(guard);
        heap.threads.change_status(thread, old_status);
    }
}
