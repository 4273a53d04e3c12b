//! Domain event contracts and distribution mechanics.
//!
//! Events are facts: immutable, versioned, append-only. This crate defines
//! the `Event` trait domain modules implement, the `EventEnvelope` wrapper
//! persisted/published per event, and a minimal pub/sub bus abstraction with
//! an in-memory implementation for dev and tests.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::InMemoryEventBus;
pub use tenant::TenantScoped;
