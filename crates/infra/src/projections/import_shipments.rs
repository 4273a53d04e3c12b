//! Shipment read model feeding the customs clearance dashboard metric.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use plasticflow_core::TenantId;
use plasticflow_events::EventEnvelope;
use plasticflow_parties::PartyId;
use plasticflow_purchasing::PurchaseOrderId;
use plasticflow_shipping::{ClearanceStatus, ImportShipmentEvent, ImportShipmentId};

use super::{ProjectionError, StreamCursors};
use crate::read_model::TenantStore;

/// Read model record for one import shipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentRow {
    pub shipment_id: ImportShipmentId,
    pub purchase_order_id: PurchaseOrderId,
    pub supplier_id: PartyId,
    pub clearance_status: ClearanceStatus,
    pub shipment_date: Option<NaiveDate>,
    pub expected_arrival: Option<NaiveDate>,
    pub cleared_on: Option<NaiveDate>,
    pub arrival_date: Option<NaiveDate>,
    pub cancelled: bool,
}

/// Shipment projection over `ImportShipmentEvent` streams.
///
/// Tracks the clearance dates per shipment so the dashboard can answer how
/// long customs clearance takes on average.
#[derive(Debug)]
pub struct ImportShipmentsProjection<S>
where
    S: TenantStore<ImportShipmentId, ShipmentRow>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ImportShipmentsProjection<S>
where
    S: TenantStore<ImportShipmentId, ShipmentRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, shipment_id: &ImportShipmentId) -> Option<ShipmentRow> {
        self.store.get(tenant_id, shipment_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ShipmentRow> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by_key(|r| *r.shipment_id.0.as_uuid().as_bytes());
        rows
    }

    /// Average days from expected arrival to customs clearance across
    /// cleared shipments, rounded to one decimal place. `None` when no
    /// shipment has both dates.
    pub fn average_clearance_days(&self, tenant_id: TenantId) -> Option<Decimal> {
        let mut total_days = 0i64;
        let mut count = 0u32;
        for row in self.store.list(tenant_id) {
            if row.cancelled || !row.clearance_status.is_final() {
                continue;
            }
            let (Some(cleared_on), Some(expected_arrival)) = (row.cleared_on, row.expected_arrival)
            else {
                continue;
            };
            total_days += (cleared_on - expected_arrival).num_days();
            count += 1;
        }
        if count == 0 {
            return None;
        }
        Some((Decimal::from(total_days) / Decimal::from(count)).round_dp(1))
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .advance(tenant_id, aggregate_id, envelope.sequence_number(), || {
                let event: ImportShipmentEvent =
                    serde_json::from_value(envelope.payload().clone())
                        .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                let (event_tenant, shipment_id) = shipment_event_ids(&event);
                if event_tenant != tenant_id {
                    return Err(ProjectionError::TenantIsolation(
                        "event tenant_id does not match envelope tenant_id".to_string(),
                    ));
                }
                if shipment_id.0 != aggregate_id {
                    return Err(ProjectionError::TenantIsolation(
                        "event shipment_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                self.apply_event(tenant_id, shipment_id, &event);
                Ok(())
            })
    }

    fn apply_event(
        &self,
        tenant_id: TenantId,
        shipment_id: ImportShipmentId,
        event: &ImportShipmentEvent,
    ) {
        match event {
            ImportShipmentEvent::ImportShipmentCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    shipment_id,
                    ShipmentRow {
                        shipment_id,
                        purchase_order_id: e.purchase_order_id,
                        supplier_id: e.supplier_id,
                        clearance_status: ClearanceStatus::InTransit,
                        shipment_date: e.shipment_date,
                        expected_arrival: e.expected_arrival,
                        cleared_on: None,
                        arrival_date: None,
                        cancelled: false,
                    },
                );
            }
            ImportShipmentEvent::ShipmentCleared(e) => {
                if let Some(mut row) = self.store.get(tenant_id, &shipment_id) {
                    row.clearance_status = ClearanceStatus::Cleared;
                    row.cleared_on = Some(e.cleared_on);
                    self.store.upsert(tenant_id, shipment_id, row);
                }
            }
            ImportShipmentEvent::ShipmentAtWarehouse(e) => {
                if let Some(mut row) = self.store.get(tenant_id, &shipment_id) {
                    row.clearance_status = ClearanceStatus::AtWarehouse;
                    row.cleared_on = Some(e.cleared_on);
                    row.arrival_date = Some(e.arrival_date);
                    self.store.upsert(tenant_id, shipment_id, row);
                }
            }
            ImportShipmentEvent::ClearanceRolledBack(_) => {
                if let Some(mut row) = self.store.get(tenant_id, &shipment_id) {
                    row.clearance_status = ClearanceStatus::InTransit;
                    row.cleared_on = None;
                    row.arrival_date = None;
                    self.store.upsert(tenant_id, shipment_id, row);
                }
            }
            ImportShipmentEvent::ImportShipmentCancelled(_) => {
                if let Some(mut row) = self.store.get(tenant_id, &shipment_id) {
                    row.cancelled = true;
                    self.store.upsert(tenant_id, shipment_id, row);
                }
            }
            // Destination and landed cost changes do not affect the
            // clearance timeline.
            ImportShipmentEvent::DestinationWarehouseSet(_)
            | ImportShipmentEvent::LandedCostsApplied(_)
            | ImportShipmentEvent::LandedCostsReleased(_) => {}
        }
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.reset();

        let mut envs: Vec<_> = envelopes.into_iter().collect();

        let mut tenants = envs.iter().map(|e| e.tenant_id()).collect::<Vec<_>>();
        tenants.sort_by_key(|t| *t.as_uuid().as_bytes());
        tenants.dedup();
        for t in tenants {
            self.store.clear_tenant(t);
        }

        envs.sort_by_key(|e| {
            (
                *e.tenant_id().as_uuid().as_bytes(),
                *e.aggregate_id().as_uuid().as_bytes(),
                e.sequence_number(),
            )
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

fn shipment_event_ids(event: &ImportShipmentEvent) -> (TenantId, ImportShipmentId) {
    match event {
        ImportShipmentEvent::ImportShipmentCreated(e) => (e.tenant_id, e.shipment_id),
        ImportShipmentEvent::DestinationWarehouseSet(e) => (e.tenant_id, e.shipment_id),
        ImportShipmentEvent::ShipmentCleared(e) => (e.tenant_id, e.shipment_id),
        ImportShipmentEvent::ShipmentAtWarehouse(e) => (e.tenant_id, e.shipment_id),
        ImportShipmentEvent::ClearanceRolledBack(e) => (e.tenant_id, e.shipment_id),
        ImportShipmentEvent::LandedCostsApplied(e) => (e.tenant_id, e.shipment_id),
        ImportShipmentEvent::LandedCostsReleased(e) => (e.tenant_id, e.shipment_id),
        ImportShipmentEvent::ImportShipmentCancelled(e) => (e.tenant_id, e.shipment_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plasticflow_core::AggregateId;
    use plasticflow_shipping::{
        ImportShipmentCancelled, ImportShipmentCreated, ShipmentCleared,
    };
    use std::sync::Arc;
    use uuid::Uuid;

    use crate::read_model::InMemoryTenantStore;

    type Store = Arc<InMemoryTenantStore<ImportShipmentId, ShipmentRow>>;

    fn projection() -> ImportShipmentsProjection<Store> {
        ImportShipmentsProjection::new(Arc::new(InMemoryTenantStore::new()))
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn envelope(
        tenant: TenantId,
        shipment_id: ImportShipmentId,
        seq: u64,
        event: &ImportShipmentEvent,
    ) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant,
            shipment_id.0,
            "shipment",
            seq,
            Utc::now(),
            serde_json::to_value(event).unwrap(),
        )
    }

    fn created(
        tenant: TenantId,
        shipment_id: ImportShipmentId,
        expected_arrival: Option<NaiveDate>,
    ) -> ImportShipmentEvent {
        ImportShipmentEvent::ImportShipmentCreated(ImportShipmentCreated {
            tenant_id: tenant,
            shipment_id,
            purchase_order_id: PurchaseOrderId::new(AggregateId::new()),
            supplier_id: PartyId::new(AggregateId::new()),
            currency: "USD".to_string(),
            local_currency: "PKR".to_string(),
            exchange_rate: Decimal::new(280, 0),
            shipment_date: Some(day(2025, 1, 20)),
            expected_arrival,
            items: vec![],
            occurred_at: Utc::now(),
        })
    }

    fn cleared(
        tenant: TenantId,
        shipment_id: ImportShipmentId,
        cleared_on: NaiveDate,
    ) -> ImportShipmentEvent {
        ImportShipmentEvent::ShipmentCleared(ShipmentCleared {
            tenant_id: tenant,
            shipment_id,
            cleared_on,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn clearance_days_average_over_cleared_shipments() {
        let projection = projection();
        let tenant = TenantId::new();

        // Two cleared shipments: 3 and 6 days from expected arrival.
        for (arrival, cleared_on) in [
            (day(2025, 2, 1), day(2025, 2, 4)),
            (day(2025, 2, 1), day(2025, 2, 7)),
        ] {
            let shipment = ImportShipmentId::new(AggregateId::new());
            projection
                .apply_envelope(&envelope(
                    tenant,
                    shipment,
                    1,
                    &created(tenant, shipment, Some(arrival)),
                ))
                .unwrap();
            projection
                .apply_envelope(&envelope(
                    tenant,
                    shipment,
                    2,
                    &cleared(tenant, shipment, cleared_on),
                ))
                .unwrap();
        }

        assert_eq!(
            projection.average_clearance_days(tenant),
            Some(Decimal::new(45, 1))
        );
    }

    #[test]
    fn uncleared_and_undated_shipments_are_left_out_of_the_average() {
        let projection = projection();
        let tenant = TenantId::new();

        // Still in transit.
        let in_transit = ImportShipmentId::new(AggregateId::new());
        projection
            .apply_envelope(&envelope(
                tenant,
                in_transit,
                1,
                &created(tenant, in_transit, Some(day(2025, 2, 1))),
            ))
            .unwrap();
        assert_eq!(projection.average_clearance_days(tenant), None);

        // Cleared but created without an expected arrival date.
        let undated = ImportShipmentId::new(AggregateId::new());
        projection
            .apply_envelope(&envelope(tenant, undated, 1, &created(tenant, undated, None)))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                tenant,
                undated,
                2,
                &cleared(tenant, undated, day(2025, 2, 10)),
            ))
            .unwrap();
        assert_eq!(projection.average_clearance_days(tenant), None);
    }

    #[test]
    fn cancelled_shipments_drop_out_of_the_average() {
        let projection = projection();
        let tenant = TenantId::new();
        let shipment = ImportShipmentId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(
                tenant,
                shipment,
                1,
                &created(tenant, shipment, Some(day(2025, 2, 1))),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                tenant,
                shipment,
                2,
                &cleared(tenant, shipment, day(2025, 2, 4)),
            ))
            .unwrap();
        assert_eq!(
            projection.average_clearance_days(tenant),
            Some(Decimal::new(30, 1))
        );

        projection
            .apply_envelope(&envelope(
                tenant,
                shipment,
                3,
                &ImportShipmentEvent::ImportShipmentCancelled(ImportShipmentCancelled {
                    tenant_id: tenant,
                    shipment_id: shipment,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        assert_eq!(projection.average_clearance_days(tenant), None);
    }
}
