//! Allocation-profiling counters and the byte-count log formatter used
//! in the per-cycle summary line.
//!
//! Mirrors a process total and a per-thread shadow updated together
//! under the heap lock. The counters are `CachePadded` to avoid false
//! sharing between the process total and whichever thread-local table
//! a host keeps alongside it, the same concern `statistics.rs`'s
//! counters exist to track.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

use crate::threads::ThreadId;

#[derive(Default)]
struct Counters {
    alloc_count: CachePadded<AtomicU64>,
    alloc_size: CachePadded<AtomicU64>,
    failed_alloc_count: CachePadded<AtomicU64>,
    failed_alloc_size: CachePadded<AtomicU64>,
    gc_count: CachePadded<AtomicU64>,
}

impl Counters {
    fn record_alloc(&self, size: usize) {
        self.alloc_count.fetch_add(1, Ordering::Relaxed);
        self.alloc_size.fetch_add(size as u64, Ordering::Relaxed);
    }

    fn record_failed_alloc(&self, size: usize) {
        self.failed_alloc_count.fetch_add(1, Ordering::Relaxed);
        self.failed_alloc_size.fetch_add(size as u64, Ordering::Relaxed);
    }

    fn record_gc(&self) {
        self.gc_count.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            alloc_count: self.alloc_count.load(Ordering::Relaxed),
            alloc_size: self.alloc_size.load(Ordering::Relaxed),
            failed_alloc_count: self.failed_alloc_count.load(Ordering::Relaxed),
            failed_alloc_size: self.failed_alloc_size.load(Ordering::Relaxed),
            gc_count: self.gc_count.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time read of one set of counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub alloc_count: u64,
    pub alloc_size: u64,
    pub failed_alloc_count: u64,
    pub failed_alloc_size: u64,
    pub gc_count: u64,
}

/// Process-wide and per-thread allocation counters, updated under the
/// heap lock. Enabled only when
/// [`HeapConfig::alloc_prof_enabled`](crate::config::HeapConfig::alloc_prof_enabled)
/// is set; when disabled, updates are skipped entirely, mirroring how
/// every update site gates on the profiling flag rather than
/// maintaining the counters unconditionally.
pub struct AllocProfile {
    enabled: bool,
    process: Counters,
    per_thread: parking_lot::Mutex<HashMap<ThreadId, Counters>>,
}

impl AllocProfile {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            process: Counters::default(),
            per_thread: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_alloc(&self, thread: ThreadId, size: usize) {
        if !self.enabled {
            return;
        }
        self.process.record_alloc(size);
        self.per_thread
            .lock()
            .entry(thread)
            .or_default()
            .record_alloc(size);
    }

    pub fn record_failed_alloc(&self, thread: ThreadId, size: usize) {
        if !self.enabled {
            return;
        }
        self.process.record_failed_alloc(size);
        self.per_thread
            .lock()
            .entry(thread)
            .or_default()
            .record_failed_alloc(size);
    }

    pub fn record_gc(&self, thread: Option<ThreadId>) {
        if !self.enabled {
            return;
        }
        self.process.record_gc();
        if let Some(thread) = thread {
            self.per_thread.lock().entry(thread).or_default().record_gc();
        }
    }

    #[must_use]
    pub fn process_snapshot(&self) -> CounterSnapshot {
        self.process.snapshot()
    }

    #[must_use]
    pub fn thread_snapshot(&self, thread: ThreadId) -> CounterSnapshot {
        self.per_thread
            .lock()
            .get(&thread)
            .map(Counters::snapshot)
            .unwrap_or_default()
    }
}

/// Formats a byte count for the per-cycle summary line: `<1K` for
/// anything under 1024 bytes, otherwise rounded up to the nearest whole
/// KB with a floor of 1.
#[must_use]
pub fn format_freed_bytes(bytes: usize) -> String {
    if bytes == 0 {
        return "0K".to_string();
    }
    if bytes < 1024 {
        return "<1K".to_string();
    }
    format!("{}K", (bytes / 1024).max(1))
}

/// `percent_free = 100 - 100 * allocated / footprint`. Returns `0.0` if
/// `footprint` is `0` to avoid a division by zero on a not-yet-started
/// heap.
#[must_use]
pub fn percent_free(allocated: usize, footprint: usize) -> f64 {
    if footprint == 0 {
        return 0.0;
    }
    100.0 - 100.0 * (allocated as f64) / (footprint as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_profile_does_not_count() {
        let profile = AllocProfile::new(false);
        profile.record_alloc(ThreadId(1), 64);
        assert_eq!(profile.process_snapshot(), CounterSnapshot::default());
    }

    #[test]
    fn enabled_profile_tracks_process_and_thread() {
        let profile = AllocProfile::new(true);
        profile.record_alloc(ThreadId(1), 64);
        profile.record_alloc(ThreadId(1), 32);
        profile.record_alloc(ThreadId(2), 16);

        let process = profile.process_snapshot();
        assert_eq!(process.alloc_count, 3);
        assert_eq!(process.alloc_size, 112);

        let t1 = profile.thread_snapshot(ThreadId(1));
        assert_eq!(t1.alloc_count, 2);
        assert_eq!(t1.alloc_size, 96);
    }

    #[test]
    fn format_freed_bytes_rounds_up_and_floors_at_one_kb() {
        assert_eq!(format_freed_bytes(0), "0K");
        assert_eq!(format_freed_bytes(512), "<1K");
        assert_eq!(format_freed_bytes(1023), "<1K");
        assert_eq!(format_freed_bytes(1024), "1K");
        assert_eq!(format_freed_bytes(1025), "1K");
        assert_eq!(format_freed_bytes(2048), "2K");
    }

    #[test]
    fn percent_free_matches_formula() {
        assert_eq!(percent_free(50, 100), 50.0);
        assert_eq!(percent_free(0, 100), 100.0);
        assert_eq!(percent_free(0, 0), 0.0);
    }
}
