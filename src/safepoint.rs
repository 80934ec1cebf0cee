//! The suspension coordinator: suspends and resumes mutator threads
//! around a collection pause and elevates the collector thread's own
//! scheduling priority while it runs.
//!
//! Wraps the thread subsystem's `suspend_all`/`resume_all` with the
//! priority elevation and pause-timing bookkeeping the collector driver
//! needs. The actual park/unpark protocol belongs to the thread
//! subsystem; this module only orchestrates it, the way
//! `safepoint::GlobalSafepoint` orchestrates `Barrier::arm`/`disarm`
//! around its own thread list instead of reimplementing parking.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::PriorityClass;
use crate::threads::ThreadSuspension;

/// A saved priority to restore once a non-concurrent cycle ends.
#[derive(Debug, Clone, Copy)]
pub struct SavedPriority(Option<PriorityClass>);

/// One measured pause window: wall-clock time all mutators spent suspended.
#[derive(Debug, Clone, Copy)]
pub struct PauseWindow {
    pub duration: Duration,
}

/// Coordinates suspending and resuming mutators around a GC pause,
/// plus the collector thread's own priority elevation.
pub struct SuspensionCoordinator {
    threads: Arc<dyn ThreadSuspension>,
}

impl SuspensionCoordinator {
    #[must_use]
    pub fn new(threads: Arc<dyn ThreadSuspension>) -> Self {
        Self { threads }
    }

    /// Suspends every mutator thread and measures how long the pause
    /// window lasted while `f` runs with all threads stopped. `reason`
    /// is passed through to the thread subsystem for its own logging.
    pub fn with_all_suspended<R>(&self, reason: &str, f: impl FnOnce() -> R) -> (R, PauseWindow) {
        let start = Instant::now();
        self.threads.suspend_all(reason);
        let result = f();
        self.threads.resume_all(reason);
        (
            result,
            PauseWindow {
                duration: start.elapsed(),
            },
        )
    }

    /// Elevates the calling (collector) thread's scheduling priority if
    /// it is below `Normal`. Only called for non-concurrent cycles.
    /// Returns the prior class if elevation actually happened, so the
    /// driver can restore it later; returns `SavedPriority(None)` if
    /// already at or above normal, or if the OS denied the request
    /// (logged, not fatal).
    #[must_use]
    pub fn elevate_priority(&self) -> SavedPriority {
        let current = match self.threads.priority_class() {
            Ok(class) => class,
            Err(err) => {
                tracing::info!(error = %err, "getpriority(self) failed");
                return SavedPriority(None);
            }
        };
        if current != PriorityClass::Background {
            return SavedPriority(None);
        }
        match self.threads.set_priority_class(PriorityClass::Normal) {
            Ok(()) => {
                tracing::debug!(from = ?current, to = ?PriorityClass::Normal, "elevating priority");
                SavedPriority(Some(current))
            }
            Err(err) => {
                tracing::info!(error = %err, "unable to elevate priority");
                SavedPriority(None)
            }
        }
    }

    /// Restores a priority saved by [`elevate_priority`](Self::elevate_priority),
    /// a no-op if nothing was actually elevated.
    pub fn restore_priority(&self, saved: SavedPriority) {
        let Some(prior) = saved.0 else {
            return;
        };
        if let Err(err) = self.threads.set_priority_class(prior) {
            tracing::warn!(error = %err, "unable to reset priority");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockThreads;

    #[test]
    fn suspend_and_resume_are_called_once_each() {
        let threads = Arc::new(MockThreads::new());
        let coordinator = SuspensionCoordinator::new(threads.clone());
        let (value, _pause) = coordinator.with_all_suspended("test", || 42);
        assert_eq!(value, 42);
        assert_eq!(threads.suspend_all_calls(), 1);
        assert_eq!(threads.resume_all_calls(), 1);
    }

    #[test_log::test]
    fn elevate_then_restore_round_trips_priority() {
        let threads = Arc::new(MockThreads::new());
        threads.set_priority_class(PriorityClass::Background).unwrap();
        let coordinator = SuspensionCoordinator::new(threads.clone());

        let saved = coordinator.elevate_priority();
        assert_eq!(threads.priority_class().unwrap(), PriorityClass::Normal);

        coordinator.restore_priority(saved);
        assert_eq!(threads.priority_class().unwrap(), PriorityClass::Background);
    }

    #[test]
    fn already_normal_priority_is_not_touched() {
        let threads = Arc::new(MockThreads::new());
        let coordinator = SuspensionCoordinator::new(threads.clone());
        let saved = coordinator.elevate_priority();
        // SavedPriority(None) => restore is a no-op; verified indirectly
        // by priority staying Normal.
        coordinator.restore_priority(saved);
        assert_eq!(threads.priority_class().unwrap(), PriorityClass::Normal);
    }
}
