//! The card table (write-barrier storage), an external collaborator.
//! Consumed here only as an opaque dirty-page log:
//! this crate clears it between phases P1 and P2 and asks it to verify
//! its own invariant during final mark, and nothing more.

/// Contract for the card table, generalized to a trait since the
/// concrete mmap-backed storage is out of scope here.
pub trait CardTable: Send + Sync {
    /// Allocates card-table storage sized for a heap of at most `max_size`.
    /// `false` means startup failed.
    fn start(&self, max_size: usize) -> bool;

    /// Tears down card-table storage.
    fn shutdown(&self);

    /// Clears every card (between end-of-roots and resuming threads
    /// in a concurrent cycle).
    fn clear(&self);

    /// Verifies the card-table invariant: every gray object lives on a
    /// dirty page, except reference objects and weak interned strings
    /// during final mark. Only called when `verify_card_table` is
    /// enabled in the config.
    fn verify(&self);
}
