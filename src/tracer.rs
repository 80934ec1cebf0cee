//! The mark-sweep tracer, an external collaborator this crate drives
//! through a small interface without ever touching its bitmaps or
//! object-scan logic directly.

use crate::object::ManagedObject;

/// Which root-marking discipline a cycle uses: a malloc-triggered
/// collection scans a partial root set, everything else scans fully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcMode {
    Partial,
    Full,
}

/// Reference lists discovered while scanning, handed to
/// `Tracer::process_references` and partitioned there by reachability.
#[derive(Debug, Default, Clone)]
pub struct ReferenceLists {
    pub soft: Vec<ManagedObject>,
    pub weak: Vec<ManagedObject>,
    pub phantom: Vec<ManagedObject>,
}

/// Contract for the mark-sweep tracer that this crate treats as an
/// opaque collaborator.
pub trait Tracer: Send + Sync {
    /// Sets up marking context for `mode`. `false` means the tracer
    /// could not start; the caller treats this as fatal.
    fn begin_mark_step(&self, mode: GcMode) -> bool;

    /// Marks every strongly reachable root.
    fn mark_root_set(&self);

    /// Conservatively re-marks the root set during final mark, since no
    /// write barrier intercepts root stores.
    fn re_mark_root_set(&self);

    /// Recursively marks from the already-marked set. Populates the
    /// three reference lists discovered along the way.
    fn scan_marked_objects(&self, references: &mut ReferenceLists);

    /// Recursively marks gray objects reachable from roots or from
    /// dirty-card objects.
    fn re_scan_marked_objects(&self, references: &mut ReferenceLists);

    /// Resolves soft/weak/phantom reachability post-trace. `clear_soft`
    /// forces every soft reference to clear regardless of recency.
    ///
    /// Returns the reference objects the core must hand to the
    /// heap-worker thread for enqueue onto their `ReferenceQueue`:
    /// every soft reference just cleared, and every phantom reference
    /// whose referent did not survive marking (phantom referents are
    /// never cleared, only enqueued).
    fn process_references(
        &self,
        references: &mut ReferenceLists,
        clear_soft: bool,
    ) -> Vec<ManagedObject>;

    /// Sweeps weak interned-string tables and other system-weak caches
    /// before the bitmap swap.
    fn sweep_system_weaks(&self);

    /// True iff `object`'s bit is set in the scratch mark bitmap built
    /// by this cycle's scan. Not part of the tracer's core scan/sweep
    /// sequence, but needed so the core can tell which finalizable
    /// objects survived marking and resurrect the unreachable ones for
    /// one more cycle before handing them to pending finalization.
    fn is_marked(&self, object: ManagedObject) -> bool;

    /// Forces `object`'s mark bit on even though it was not reached
    /// from a root, so the upcoming sweep does not reclaim it. Used
    /// exactly once per object: the cycle it is moved into pending
    /// finalization, so it survives to run its finalizer.
    fn retain_for_finalization(&self, object: ManagedObject);

    /// Frees every object whose bit is set in the old-live-but-not-mark
    /// bitmap. Returns `(objects_freed, bytes_freed)`.
    fn sweep_unmarked_objects(&self, mode: GcMode, concurrent: bool) -> (usize, usize);

    /// Releases mark-step scratch state.
    fn finish_mark_step(&self);
}
