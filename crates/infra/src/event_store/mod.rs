//! Append-only event store boundary.
//!
//! Streams are tenant-scoped, one per aggregate instance. The abstraction
//! makes no storage assumptions; the in-memory implementation backs tests and
//! the single-process deployment.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
