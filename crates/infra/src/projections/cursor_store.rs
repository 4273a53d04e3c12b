//! Per-stream cursors shared by all projections.
//!
//! Each projection keeps one cursor per (tenant, aggregate) stream. The
//! cursor makes apply idempotent under at-least-once delivery: replays at or
//! below the cursor are skipped, gaps are rejected.

use std::collections::HashMap;
use std::sync::RwLock;

use plasticflow_core::{AggregateId, TenantId};

use super::ProjectionError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Default)]
pub struct StreamCursors {
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `apply` if `seq` is the next position for the stream, holding the
    /// cursor lock across check, apply, and commit.
    ///
    /// - `seq <= cursor` is a duplicate: skipped, `apply` never runs.
    /// - The first event of a stream may land at any positive sequence (the
    ///   store starts at 1); after that only `cursor + 1` is accepted.
    /// - The cursor only advances when `apply` succeeds.
    pub fn advance<F>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        seq: u64,
        apply: F,
    ) -> Result<(), ProjectionError>
    where
        F: FnOnce() -> Result<(), ProjectionError>,
    {
        let mut cursors = self
            .cursors
            .write()
            .map_err(|_| ProjectionError::LockPoisoned("stream cursors".to_string()))?;

        let key = CursorKey {
            tenant_id,
            aggregate_id,
        };
        let last = *cursors.get(&key).unwrap_or(&0);

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        apply()?;
        cursors.insert(key, seq);
        Ok(())
    }

    /// Forget every cursor (projection rebuild). Clearing is safe even after
    /// a panic poisoned the lock, so the poison is discarded here.
    pub fn reset(&self) {
        let mut cursors = self
            .cursors
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        cursors.clear();
    }
}
