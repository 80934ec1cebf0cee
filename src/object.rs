//! The managed object address type.
//!
//! A managed object is an opaque, 8-byte-aligned address owned by the
//! external heap source. This crate never dereferences one; it only
//! carries it around queues and hands it to the [`HeapSource`] and
//! [`Tracer`] collaborators.
//!
//! [`HeapSource`]: crate::heap_source::HeapSource
//! [`Tracer`]: crate::tracer::Tracer

use std::fmt;

/// Required alignment for every managed allocation.
pub const OBJECT_ALIGNMENT: usize = 8;

/// An opaque handle to a heap-resident object.
///
/// `ManagedObject` is `Copy` and carries no drop glue: ownership of the
/// underlying storage belongs to the heap source, never to this type.
/// Two handles with the same address compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManagedObject(usize);

impl ManagedObject {
    /// Wraps a raw address. Does not check validity; use
    /// [`GcHeap::is_valid_object`](crate::GcHeap::is_valid_object) to
    /// confirm the address names a live object before trusting it.
    #[must_use]
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }

    /// True iff non-null and 8-byte aligned. Does not consult any
    /// heap-source bitmap; combine with liveness to get full validity.
    #[must_use]
    pub const fn is_aligned(self) -> bool {
        self.0 != 0 && self.0 % OBJECT_ALIGNMENT == 0
    }
}

impl fmt::Debug for ManagedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ManagedObject({:#x})", self.0)
    }
}

/// Rounds `size` up to the next multiple of `align` (`align` must be a
/// power of two).
#[must_use]
pub const fn round_up(size: usize, align: usize) -> usize {
    (size + (align - 1)) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_nonzero_address_is_aligned() {
        assert!(ManagedObject::from_addr(0x1000).is_aligned());
    }

    #[test]
    fn null_is_never_aligned() {
        assert!(!ManagedObject::from_addr(0).is_aligned());
    }

    #[test]
    fn unaligned_address_is_rejected() {
        assert!(!ManagedObject::from_addr(0x1001).is_aligned());
    }

    #[test]
    fn round_up_rounds_to_next_multiple() {
        assert_eq!(round_up(1, 8), 8);
        assert_eq!(round_up(8, 8), 8);
        assert_eq!(round_up(9, 8), 16);
    }
}
