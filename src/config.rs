//! Startup configuration.
//!
//! The core takes its configuration as an explicit input struct rather
//! than reading hidden global/env state, matching `AllocationConfig`'s
//! convention.

use crate::threads::ThreadSuspension;

/// The two OS scheduling classes the collector elevates between. A host
/// embedding this crate maps these onto whatever priority/scheduling
/// primitive its platform offers (`setpriority`/`sched_policy` on Linux,
/// thread priority classes on Windows, ...). Priority is read and set
/// through [`ThreadSuspension`], since it is part of the thread
/// subsystem's surface rather than a separate collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityClass {
    /// Below-normal scheduling priority.
    Background,
    /// Normal or better scheduling priority.
    Normal,
}

/// Hook consulted before a foreground collection is triggered on the
/// calling thread's behalf, e.g. to carve out a debugger thread whose
/// allocations must never pause the world. Returns `true` if the
/// calling thread must not trigger a foreground collection; the ladder
/// then only grows or fails for that thread. Default policy never
/// suppresses GC.
pub trait GcSuppressionPolicy: Send + Sync {
    fn suppress_gc_for_current_thread(&self, threads: &dyn ThreadSuspension) -> bool;
}

/// Never suppresses GC for any thread. The debugger-thread carve-out,
/// where one exists, is left to the embedder to supply.
#[derive(Debug, Default)]
pub struct NeverSuppress;

impl GcSuppressionPolicy for NeverSuppress {
    fn suppress_gc_for_current_thread(&self, _threads: &dyn ThreadSuspension) -> bool {
        false
    }
}

/// Startup configuration for [`GcHeap::start`](crate::GcHeap::start).
pub struct HeapConfig {
    /// Initial heap-source footprint, in bytes.
    pub starting_size: usize,
    /// Hard upper bound the heap source may never exceed.
    pub maximum_size: usize,
    /// Soft bound the allocation ladder grows up to before resorting to
    /// a soft-reference-clearing collection. Zero means "default to
    /// `maximum_size`".
    pub growth_limit: usize,
    /// Verify roots and the live bitmap before each cycle.
    pub pre_verify: bool,
    /// Verify roots and the live bitmap after each cycle.
    pub post_verify: bool,
    /// Verify the card-table invariant during final mark.
    pub verify_card_table: bool,
    /// Whether per-process/per-thread allocation counters are maintained.
    pub alloc_prof_enabled: bool,
    /// Delay, in seconds, before a deferred page trim runs after a cycle.
    pub trim_delay_secs: u64,
    /// GC-suppression policy for special threads (e.g. a debugger
    /// thread), consulted before a foreground collection is triggered.
    pub gc_suppression_policy: std::sync::Arc<dyn GcSuppressionPolicy>,
    /// Watchdog consulted at GC entry to detect a wedged heap-worker
    /// thread. Returning `false` aborts the process. Defaults to
    /// always-responsive.
    pub heap_worker_watchdog: std::sync::Arc<dyn Fn() -> bool + Send + Sync>,
}

impl HeapConfig {
    /// Builds a config, defaulting `growth_limit` to `maximum_size` when
    /// given as zero.
    #[must_use]
    pub fn new(starting_size: usize, maximum_size: usize, growth_limit: usize) -> Self {
        let growth_limit = if growth_limit == 0 {
            maximum_size
        } else {
            growth_limit
        };
        Self {
            starting_size,
            maximum_size,
            growth_limit,
            pre_verify: false,
            post_verify: false,
            verify_card_table: false,
            alloc_prof_enabled: false,
            trim_delay_secs: 5,
            gc_suppression_policy: std::sync::Arc::new(NeverSuppress),
            heap_worker_watchdog: std::sync::Arc::new(|| true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_growth_limit_defaults_to_maximum_size() {
        let config = HeapConfig::new(1024, 1 << 20, 0);
        assert_eq!(config.growth_limit, 1 << 20);
    }

    #[test]
    fn nonzero_growth_limit_is_kept() {
        let config = HeapConfig::new(1024, 1 << 20, 1 << 18);
        assert_eq!(config.growth_limit, 1 << 18);
    }
}
