use std::collections::HashMap;
use std::sync::RwLock;

use plasticflow_core::{AggregateId, ExpectedVersion, TenantId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

/// In-memory event store, suitable for tests and single-process deployments.
///
/// Streams live in a `RwLock`-guarded map keyed by tenant + aggregate, so
/// append batches are atomic and readers never observe a half-written batch.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored event across all tenants and streams, for projection
    /// rebuilds. Ordered by (tenant, aggregate, sequence).
    pub fn all_events(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;
        let mut events: Vec<StoredEvent> =
            streams.values().flat_map(|s| s.iter().cloned()).collect();
        events.sort_by(|a, b| {
            (a.tenant_id.as_uuid().as_bytes(), a.aggregate_id.as_uuid().as_bytes(), a.sequence_number)
                .cmp(&(b.tenant_id.as_uuid().as_bytes(), b.aggregate_id.as_uuid().as_bytes(), b.sequence_number))
        });
        Ok(events)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Err(EventStoreError::InvalidAppend(
                "append called with an empty batch".into(),
            ));
        }

        // A batch targets exactly one stream.
        let tenant_id = events[0].tenant_id;
        let aggregate_id = events[0].aggregate_id;
        let aggregate_type = events[0].aggregate_type.clone();

        for event in &events {
            if event.tenant_id != tenant_id {
                return Err(EventStoreError::TenantIsolation(format!(
                    "mixed tenants in append batch: {} and {}",
                    tenant_id, event.tenant_id
                )));
            }
            if event.aggregate_id != aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "mixed aggregates in append batch: {} and {}",
                    aggregate_id, event.aggregate_id
                )));
            }
            if event.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "mixed aggregate types in append batch: {} and {}",
                    aggregate_type, event.aggregate_type
                )));
            }
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;
        let key = StreamKey {
            tenant_id,
            aggregate_id,
        };
        let stream = streams.entry(key).or_default();

        if let Some(existing) = stream.first() {
            if existing.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream {} holds {}, append carries {}",
                    aggregate_id, existing.aggregate_type, aggregate_type
                )));
            }
        }

        let current_version = stream.last().map_or(0, |e| e.sequence_number);
        if !expected_version.matches(current_version) {
            return Err(EventStoreError::Concurrency(format!(
                "stream {aggregate_id} is at version {current_version}, expected {expected_version:?}"
            )));
        }

        let mut stored = Vec::with_capacity(events.len());
        for (offset, event) in events.into_iter().enumerate() {
            stored.push(StoredEvent {
                event_id: event.event_id,
                tenant_id: event.tenant_id,
                aggregate_id: event.aggregate_id,
                aggregate_type: event.aggregate_type,
                sequence_number: current_version + 1 + offset as u64,
                event_type: event.event_type,
                event_version: event.event_version,
                occurred_at: event.occurred_at,
                payload: event.payload,
            });
        }
        stream.extend(stored.iter().cloned());

        Ok(stored)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;
        let key = StreamKey {
            tenant_id,
            aggregate_id,
        };
        Ok(streams.get(&key).cloned().unwrap_or_default())
    }
}
