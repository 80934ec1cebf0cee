//! Crate-wide error type.
//!
//! Grounded on `ristretto_jit::error` — a flat `thiserror` enum with
//! `#[from]` conversions at the boundaries where an external
//! collaborator reports failure, and structured variants everywhere
//! else. Unlike `ristretto_jit`, most of this crate's failure modes are
//! handled inline (fatal abort, log-and-continue) rather than bubbled
//! up as `Result`; `Error` exists for the paths treated as recoverable
//! at the API boundary.

/// Result alias defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors surfaced across the `GcHeap` API boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `HeapSource` or `CardTable` initialization failed during
    /// `GcHeap::start`.
    #[error("heap startup failed: {0}")]
    StartupFailed(String),

    /// The allocation ladder was exhausted. Callers receive this instead
    /// of a null pointer; the OOM-throwing state machine in `oom.rs`
    /// still runs before this is returned.
    #[error("out of memory allocating {requested} bytes")]
    OutOfMemory { requested: usize },
}
