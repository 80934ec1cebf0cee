//! The page-managed allocator ("heap source"), an external collaborator.
//! This crate never implements one — no free lists, no page mapping,
//! no footprint growth policy — it only names the contract the
//! allocation ladder and collector driver need.

use crate::object::ManagedObject;

/// A statistic key `HeapSource::value` can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapSourceStat {
    BytesAllocated,
    Footprint,
}

/// Contract for the low-level allocator sitting below this crate. All
/// methods that can allocate never zero memory themselves in this
/// contract's terms — zero-initialization is guaranteed as an
/// allocator property, so a real implementation zeroes before
/// returning.
pub trait HeapSource: Send + Sync {
    /// Fast-path allocation; never grows the footprint. `None` means
    /// try a different rung of the ladder.
    fn alloc(&self, size: usize) -> Option<ManagedObject>;

    /// Allocation that may raise the footprint, bounded by
    /// `growth_limit` from the config the heap source was started with.
    fn alloc_and_grow(&self, size: usize) -> Option<ManagedObject>;

    /// True iff `addr` falls within memory managed by this heap source
    /// (used by `is_valid_object`).
    fn contains(&self, object: ManagedObject) -> bool;

    /// Size, in bytes, of the allocation at `object`.
    fn chunk_size(&self, object: ManagedObject) -> usize;

    /// True iff `object`'s bit is set in the live bitmap.
    fn is_live(&self, object: ManagedObject) -> bool;

    /// Swaps the "mark" bitmap into the "live" role.
    fn swap_bitmaps(&self);

    /// Target footprint given current utilization (allocated bytes
    /// over footprint); consulted by `grow_for_utilization`.
    fn ideal_footprint(&self) -> usize;

    /// Grows the footprint toward a utilization target.
    fn grow_for_utilization(&self);

    /// Reads one of the named statistics.
    fn value(&self, stat: HeapSourceStat) -> usize;

    /// Schedules (superseding any prior schedule) a trim of unused
    /// pages `delay_secs` from now; superseded by the next cycle's call.
    fn schedule_trim(&self, delay_secs: u64);

    /// Tears down the heap source; afterward the managed heap is
    /// unmapped.
    fn shutdown(&self);

    /// Stops any internal threads the heap source owns.
    fn thread_shutdown(&self);

    /// Post-`fork()` reinitialization.
    fn post_fork(&self);
}
