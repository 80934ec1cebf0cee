//! Test doubles for the four external collaborators, kept in-crate
//! rather than behind `cfg(test)` so both the unit tests
//! beside each module and `tests/end_to_end.rs` can drive the same
//! doubles without duplicating them.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;

use parking_lot::Mutex;

use crate::card_table::CardTable;
use crate::config::PriorityClass;
use crate::heap_source::{HeapSource, HeapSourceStat};
use crate::object::ManagedObject;
use crate::threads::{ThreadId, ThreadStatus, ThreadSuspension};
use crate::tracer::{GcMode, ReferenceLists, Tracer};

/// A heap source whose `alloc`/`alloc_and_grow` responses are scripted
/// in advance, one `VecDeque` entry consumed per call. Once a queue is
/// exhausted, calls return `None` ("out of space") until more
/// responses are pushed.
#[derive(Default)]
pub struct MockHeapSource {
    alloc_script: Mutex<VecDeque<Option<ManagedObject>>>,
    alloc_and_grow_script: Mutex<VecDeque<Option<ManagedObject>>>,
    alloc_calls: AtomicUsize,
    alloc_and_grow_calls: AtomicUsize,
    swap_bitmaps_calls: AtomicUsize,
    grow_for_utilization_calls: AtomicUsize,
    schedule_trim_calls: AtomicUsize,
    live: Mutex<HashSet<ManagedObject>>,
    chunk_sizes: Mutex<HashMap<ManagedObject, usize>>,
    ideal_footprint: AtomicUsize,
    bytes_allocated: AtomicUsize,
    footprint: AtomicUsize,
}

impl MockHeapSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one `alloc(size)` response, fast-path only (no growth).
    pub fn push_alloc_response(&self, response: Option<ManagedObject>) {
        self.alloc_script.lock().push_back(response);
    }

    /// Queues one `alloc_and_grow(size)` response.
    pub fn push_alloc_and_grow_response(&self, response: Option<ManagedObject>) {
        self.alloc_and_grow_script.lock().push_back(response);
    }

    /// Marks `object` as present in the live bitmap, e.g. to simulate
    /// an allocation succeeding without going through the script.
    pub fn mark_live(&self, object: ManagedObject, size: usize) {
        self.live.lock().insert(object);
        self.chunk_sizes.lock().insert(object, size);
    }

    pub fn unmark_live(&self, object: ManagedObject) {
        self.live.lock().remove(&object);
    }

    pub fn set_stat(&self, stat: HeapSourceStat, value: usize) {
        match stat {
            HeapSourceStat::BytesAllocated => self.bytes_allocated.store(value, Ordering::Relaxed),
            HeapSourceStat::Footprint => self.footprint.store(value, Ordering::Relaxed),
        }
    }

    #[must_use]
    pub fn alloc_call_count(&self) -> usize {
        self.alloc_calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn alloc_and_grow_call_count(&self) -> usize {
        self.alloc_and_grow_calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn swap_bitmaps_call_count(&self) -> usize {
        self.swap_bitmaps_calls.load(Ordering::Relaxed)
    }
}

impl HeapSource for MockHeapSource {
    fn alloc(&self, size: usize) -> Option<ManagedObject> {
        self.alloc_calls.fetch_add(1, Ordering::Relaxed);
        let scripted = self.alloc_script.lock().pop_front().flatten();
        if let Some(object) = scripted {
            self.mark_live(object, size);
        }
        scripted
    }

    fn alloc_and_grow(&self, size: usize) -> Option<ManagedObject> {
        self.alloc_and_grow_calls.fetch_add(1, Ordering::Relaxed);
        let scripted = self.alloc_and_grow_script.lock().pop_front().flatten();
        if let Some(object) = scripted {
            self.mark_live(object, size);
        }
        scripted
    }

    fn contains(&self, object: ManagedObject) -> bool {
        self.live.lock().contains(&object) || self.chunk_sizes.lock().contains_key(&object)
    }

    fn chunk_size(&self, object: ManagedObject) -> usize {
        self.chunk_sizes.lock().get(&object).copied().unwrap_or(0)
    }

    fn is_live(&self, object: ManagedObject) -> bool {
        self.live.lock().contains(&object)
    }

    fn swap_bitmaps(&self) {
        self.swap_bitmaps_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn ideal_footprint(&self) -> usize {
        self.ideal_footprint.load(Ordering::Relaxed)
    }

    fn grow_for_utilization(&self) {
        self.grow_for_utilization_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn value(&self, stat: HeapSourceStat) -> usize {
        match stat {
            HeapSourceStat::BytesAllocated => self.bytes_allocated.load(Ordering::Relaxed),
            HeapSourceStat::Footprint => self.footprint.load(Ordering::Relaxed),
        }
    }

    fn schedule_trim(&self, _delay_secs: u64) {
        self.schedule_trim_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn shutdown(&self) {}

    fn thread_shutdown(&self) {}

    fn post_fork(&self) {}
}

/// A tracer whose `sweep_unmarked_objects` result and `is_marked` set
/// are controlled by the test; every phase call is counted so tests
/// can assert on the expected call sequence.
#[derive(Default)]
pub struct MockTracer {
    begin_mark_step_calls: AtomicUsize,
    mark_root_set_calls: AtomicUsize,
    re_mark_root_set_calls: AtomicUsize,
    scan_marked_objects_calls: AtomicUsize,
    re_scan_marked_objects_calls: AtomicUsize,
    process_references_calls: AtomicUsize,
    sweep_system_weaks_calls: AtomicUsize,
    finish_mark_step_calls: AtomicUsize,
    marked: Mutex<HashSet<ManagedObject>>,
    sweep_result: Mutex<(usize, usize)>,
    begin_mark_step_result: std::sync::atomic::AtomicBool,
    reference_enqueue_script: Mutex<Vec<ManagedObject>>,
}

impl MockTracer {
    #[must_use]
    pub fn new() -> Self {
        let tracer = Self::default();
        tracer
            .begin_mark_step_result
            .store(true, Ordering::Relaxed);
        tracer
    }

    pub fn mark_reachable(&self, object: ManagedObject) {
        self.marked.lock().insert(object);
    }

    pub fn unmark(&self, object: ManagedObject) {
        self.marked.lock().remove(&object);
    }

    pub fn set_sweep_result(&self, objects_freed: usize, bytes_freed: usize) {
        *self.sweep_result.lock() = (objects_freed, bytes_freed);
    }

    /// Scripts the reference objects `process_references` reports for
    /// enqueue on its next call.
    pub fn set_reference_enqueue(&self, objects: Vec<ManagedObject>) {
        *self.reference_enqueue_script.lock() = objects;
    }

    #[must_use]
    pub fn scan_marked_objects_call_count(&self) -> usize {
        self.scan_marked_objects_calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn process_references_call_count(&self) -> usize {
        self.process_references_calls.load(Ordering::Relaxed)
    }
}

impl Tracer for MockTracer {
    fn begin_mark_step(&self, _mode: GcMode) -> bool {
        self.begin_mark_step_calls.fetch_add(1, Ordering::Relaxed);
        self.begin_mark_step_result.load(Ordering::Relaxed)
    }

    fn mark_root_set(&self) {
        self.mark_root_set_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn re_mark_root_set(&self) {
        self.re_mark_root_set_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn scan_marked_objects(&self, _references: &mut ReferenceLists) {
        self.scan_marked_objects_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn re_scan_marked_objects(&self, _references: &mut ReferenceLists) {
        self.re_scan_marked_objects_calls
            .fetch_add(1, Ordering::Relaxed);
    }

    fn process_references(
        &self,
        _references: &mut ReferenceLists,
        _clear_soft: bool,
    ) -> Vec<ManagedObject> {
        self.process_references_calls.fetch_add(1, Ordering::Relaxed);
        std::mem::take(&mut *self.reference_enqueue_script.lock())
    }

    fn sweep_system_weaks(&self) {
        self.sweep_system_weaks_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn is_marked(&self, object: ManagedObject) -> bool {
        self.marked.lock().contains(&object)
    }

    fn retain_for_finalization(&self, object: ManagedObject) {
        self.marked.lock().insert(object);
    }

    fn sweep_unmarked_objects(&self, _mode: GcMode, _concurrent: bool) -> (usize, usize) {
        *self.sweep_result.lock()
    }

    fn finish_mark_step(&self) {
        self.finish_mark_step_calls.fetch_add(1, Ordering::Relaxed);
    }
}

/// A thread subsystem double with exactly one simulated thread
/// identity per process (sufficient for end-to-end scenarios that
/// each drive a single mutator plus the collector on the same
/// logical actor set).
pub struct MockThreads {
    status: Mutex<ThreadStatus>,
    status_changes: AtomicUsize,
    suspend_all_calls: AtomicUsize,
    resume_all_calls: AtomicUsize,
    priority: StdMutex<PriorityClass>,
    on_thread_list: std::sync::atomic::AtomicBool,
    deny_priority_changes: std::sync::atomic::AtomicBool,
}

impl Default for MockThreads {
    fn default() -> Self {
        Self {
            status: Mutex::new(ThreadStatus::Running),
            status_changes: AtomicUsize::new(0),
            suspend_all_calls: AtomicUsize::new(0),
            resume_all_calls: AtomicUsize::new(0),
            priority: StdMutex::new(PriorityClass::Normal),
            on_thread_list: std::sync::atomic::AtomicBool::new(true),
            deny_priority_changes: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

impl MockThreads {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_on_thread_list(&self, value: bool) {
        self.on_thread_list.store(value, Ordering::Relaxed);
    }

    pub fn deny_priority_changes(&self, deny: bool) {
        self.deny_priority_changes.store(deny, Ordering::Relaxed);
    }

    #[must_use]
    pub fn status_change_count(&self) -> usize {
        self.status_changes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn suspend_all_calls(&self) -> usize {
        self.suspend_all_calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn resume_all_calls(&self) -> usize {
        self.resume_all_calls.load(Ordering::Relaxed)
    }
}

impl ThreadSuspension for MockThreads {
    fn current(&self) -> ThreadId {
        ThreadId(1)
    }

    fn change_status(&self, _thread: ThreadId, status: ThreadStatus) -> ThreadStatus {
        self.status_changes.fetch_add(1, Ordering::Relaxed);
        std::mem::replace(&mut *self.status.lock(), status)
    }

    fn suspend_all(&self, _reason: &str) {
        self.suspend_all_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn resume_all(&self, _reason: &str) {
        self.resume_all_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn is_on_thread_list(&self, _thread: ThreadId) -> bool {
        self.on_thread_list.load(Ordering::Relaxed)
    }

    fn sys_thread_id(&self, thread: ThreadId) -> u64 {
        thread.0
    }

    fn priority_class(&self) -> Result<PriorityClass, String> {
        Ok(*self.priority.lock().unwrap())
    }

    fn set_priority_class(&self, class: PriorityClass) -> Result<(), String> {
        if self.deny_priority_changes.load(Ordering::Relaxed) {
            return Err("denied by test".to_string());
        }
        *self.priority.lock().unwrap() = class;
        Ok(())
    }
}

/// A card table double; only counts calls, since no trait consumer in
/// this crate inspects card contents directly.
#[derive(Default)]
pub struct MockCardTable {
    start_calls: AtomicUsize,
    clear_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    start_result: std::sync::atomic::AtomicBool,
}

impl MockCardTable {
    #[must_use]
    pub fn new() -> Self {
        let table = Self::default();
        table.start_result.store(true, Ordering::Relaxed);
        table
    }

    pub fn set_start_result(&self, result: bool) {
        self.start_result.store(result, Ordering::Relaxed);
    }

    #[must_use]
    pub fn clear_call_count(&self) -> usize {
        self.clear_calls.load(Ordering::Relaxed)
    }
}

impl CardTable for MockCardTable {
    fn start(&self, _max_size: usize) -> bool {
        self.start_calls.fetch_add(1, Ordering::Relaxed);
        self.start_result.load(Ordering::Relaxed)
    }

    fn shutdown(&self) {}

    fn clear(&self) {
        self.clear_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn verify(&self) {
        self.verify_calls.fetch_add(1, Ordering::Relaxed);
    }
}
