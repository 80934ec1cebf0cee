//! Managed heap and garbage-collector front-end for a managed-runtime
//! implementation.
//!
//! This crate is the coordination layer sitting above a page-managed
//! allocator (the "heap source") and a mark-sweep tracer. It services
//! allocation requests from mutator threads, drives stop-the-world and
//! concurrent collection cycles, coordinates thread suspension around
//! tracing phases, tracks finalizable and reference-type objects for a
//! background worker, and surfaces out-of-memory failures predictably.
//!
//! It does not implement a heap source, a tracer, a card table, or a
//! thread subsystem: those are external collaborators, named here only
//! by the trait in [`heap_source`], [`tracer`], [`card_table`], and
//! [`threads`] respectively. A host VM supplies concrete
//! implementations and wires them together with [`GcHeap::start`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use vm_heap::{AllocFlags, Config, GcHeap};
//!
//! # fn wire_up() -> vm_heap::Result<()> {
//! # let heap_source: Arc<dyn vm_heap::heap_source::HeapSource> = unimplemented!();
//! # let tracer: Arc<dyn vm_heap::tracer::Tracer> = unimplemented!();
//! # let threads: Arc<dyn vm_heap::threads::ThreadSuspension> = unimplemented!();
//! # let card_table: Arc<dyn vm_heap::card_table::CardTable> = unimplemented!();
//! let heap = GcHeap::start(heap_source, tracer, threads, card_table, Config::new(1 << 20, 1 << 28, 0))?;
//! let object = heap.allocate(64, AllocFlags::none())?;
//! assert!(heap.is_valid_object(object));
//! # Ok(())
//! # }
//! ```

pub mod allocator;
pub mod card_table;
pub mod collector;
pub mod config;
pub mod error;
pub mod heap_source;
pub mod lifecycle;
pub mod lock;
pub mod object;
pub mod oom;
pub mod queues;
pub mod safepoint;
pub mod stats;
pub mod threads;
pub mod tracer;
pub mod worker;

pub mod mock;

pub use allocator::AllocFlags;
pub use collector::GcReason;
pub use config::HeapConfig as Config;
pub use error::{Error, Result};
pub use lifecycle::GcHeap;
pub use object::ManagedObject;
