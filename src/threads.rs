//! The thread subsystem, an external collaborator.
//!
//! This crate never spawns or schedules mutator threads; it only needs
//! a narrow capability surface from whatever thread subsystem the host
//! VM already has, named here as the `ThreadSuspension` trait.

use crate::config::PriorityClass;

/// Status a mutator thread can be in, consulted by the collector to
/// decide whether a thread counts as already suspended for the
/// purposes of a collection pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    /// Thread is free-running and may touch the managed heap.
    Running,
    /// Thread is blocked waiting on a VM-internal lock (e.g. the heap
    /// lock) and may be treated as suspended by the collector.
    WaitingOnVm,
    /// Thread has been suspended by `suspend_all`.
    Suspended,
}

/// An opaque per-thread identity handed back by [`ThreadSuspension::current`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(pub u64);

/// The slice of a thread subsystem the collector front-end needs
/// needed from a host VM's thread subsystem.
pub trait ThreadSuspension: Send + Sync {
    /// Identity of the calling thread.
    fn current(&self) -> ThreadId;

    /// Atomically sets `thread`'s status, returning the previous one.
    /// Used by [`crate::lock::HeapLock`] to mark a thread
    /// "waiting-on-VM" before it blocks.
    fn change_status(&self, thread: ThreadId, status: ThreadStatus) -> ThreadStatus;

    /// Brings every mutator thread to a safepoint and parks it there.
    /// Must not return until all threads (other than the caller) are
    /// parked.
    fn suspend_all(&self, reason: &str);

    /// Releases every mutator thread parked by a matching `suspend_all`.
    fn resume_all(&self, reason: &str);

    /// True iff `thread` is a live, registered mutator (used to decide
    /// whether there is anyone to hand an OOM to).
    fn is_on_thread_list(&self, thread: ThreadId) -> bool;

    /// Native/OS thread id, used only for scheduling-policy syscalls.
    fn sys_thread_id(&self, thread: ThreadId) -> u64;

    /// Reads the current thread's OS scheduling class.
    fn priority_class(&self) -> Result<PriorityClass, String>;

    /// Attempts to set the current thread's OS scheduling class.
    fn set_priority_class(&self, class: PriorityClass) -> Result<(), String>;
}
