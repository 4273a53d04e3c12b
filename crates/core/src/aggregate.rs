//! Traits for event-sourced aggregates.

use crate::error::{DomainError, DomainResult};

/// Identity and revision of an aggregate.
pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Number of events applied so far (the stream revision).
    fn version(&self) -> u64;
}

/// Pure decision/evolution interface.
///
/// `handle` decides: given current state and a command, either a batch of
/// events or a [`DomainError`]-shaped refusal. `apply` evolves: fold one
/// event into state. Neither may do IO; cross-aggregate rules (stock
/// availability, FIFO ordering, over-allocation) are checked by workflow
/// services before the command ever reaches the aggregate.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Decide. Must not mutate state.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Evolve. Must be deterministic and bump `version()` by one per event.
    fn apply(&mut self, event: &Self::Event);
}

/// Optimistic concurrency expectation carried by a dispatch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip the check (idempotent commands, rebuilds).
    Any,
    /// Require the stream to be at exactly this revision.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}
