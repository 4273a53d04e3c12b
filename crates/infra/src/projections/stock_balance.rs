//! Stock balance read model: per-lot quantities and values, flattened into
//! report rows on query.

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use plasticflow_catalog::{ProductId, Unit, WarehouseId};
use plasticflow_core::{TenantId, clamp_non_negative};
use plasticflow_events::EventEnvelope;
use plasticflow_inventory::{StockEntryEvent, StockEntryId};
use plasticflow_shipping::ImportShipmentId;

use super::{ProjectionError, StreamCursors};
use crate::read_model::TenantStore;

/// One lot line in the read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLineBalance {
    pub line_index: usize,
    pub product_id: ProductId,
    pub uom: Unit,
    pub received_qty: Decimal,
    pub reserved_qty: Decimal,
    pub issued_qty: Decimal,
    /// Landed cost per unit, local currency. Zero until the worksheet locks.
    pub landed_cost_rate_local: Decimal,
}

impl EntryLineBalance {
    pub fn available_qty(&self) -> Decimal {
        clamp_non_negative(self.received_qty - self.reserved_qty - self.issued_qty)
    }
}

/// Read model record: one stock entry with its lot lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryBalances {
    pub entry_id: StockEntryId,
    pub shipment_id: ImportShipmentId,
    pub warehouse: Option<WarehouseId>,
    pub at_warehouse: bool,
    pub lines: Vec<EntryLineBalance>,
}

/// One row of the stock balance report (one lot line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockBalanceRow {
    pub entry_id: StockEntryId,
    pub line_index: usize,
    pub shipment_id: ImportShipmentId,
    pub product_id: ProductId,
    pub uom: Unit,
    pub warehouse: Option<WarehouseId>,
    pub at_customs: bool,
    pub received_qty: Decimal,
    pub reserved_qty: Decimal,
    pub issued_qty: Decimal,
    pub available_qty: Decimal,
    /// available * landed cost rate (local currency).
    pub stock_value: Decimal,
}

/// Report filters; `None` means no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockBalanceFilter {
    pub product: Option<ProductId>,
    pub warehouse: Option<WarehouseId>,
    pub at_customs: Option<bool>,
}

/// Stock balance projection over `StockEntryEvent` streams.
///
/// Cancelled entries drop out of the read model entirely.
#[derive(Debug)]
pub struct StockBalanceProjection<S>
where
    S: TenantStore<StockEntryId, EntryBalances>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> StockBalanceProjection<S>
where
    S: TenantStore<StockEntryId, EntryBalances>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, entry_id: &StockEntryId) -> Option<EntryBalances> {
        self.store.get(tenant_id, entry_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<EntryBalances> {
        self.store.list(tenant_id)
    }

    /// Flattened stock balance report, one row per lot line.
    pub fn stock_balance(
        &self,
        tenant_id: TenantId,
        filter: &StockBalanceFilter,
    ) -> Vec<StockBalanceRow> {
        let mut rows: Vec<StockBalanceRow> = self
            .store
            .list(tenant_id)
            .into_iter()
            .flat_map(|entry| {
                let at_customs = !entry.at_warehouse;
                let warehouse = entry.warehouse;
                let shipment_id = entry.shipment_id;
                let entry_id = entry.entry_id;
                entry.lines.into_iter().map(move |line| {
                    let available = line.available_qty();
                    StockBalanceRow {
                        entry_id,
                        line_index: line.line_index,
                        shipment_id,
                        product_id: line.product_id,
                        uom: line.uom,
                        warehouse,
                        at_customs,
                        received_qty: line.received_qty,
                        reserved_qty: line.reserved_qty,
                        issued_qty: line.issued_qty,
                        available_qty: available,
                        stock_value: available * line.landed_cost_rate_local,
                    }
                })
            })
            .filter(|row| {
                filter.product.is_none_or(|p| row.product_id == p)
                    && filter.warehouse.is_none_or(|w| row.warehouse == Some(w))
                    && filter.at_customs.is_none_or(|c| row.at_customs == c)
            })
            .collect();

        rows.sort_by_key(|r| (*r.entry_id.0.as_uuid().as_bytes(), r.line_index));
        rows
    }

    /// (quantity, value) totals for stock sitting in warehouses.
    pub fn on_hand_totals(&self, tenant_id: TenantId) -> (Decimal, Decimal) {
        self.totals(tenant_id, Some(false))
    }

    /// (quantity, value) totals for stock still at customs.
    pub fn at_customs_totals(&self, tenant_id: TenantId) -> (Decimal, Decimal) {
        self.totals(tenant_id, Some(true))
    }

    fn totals(&self, tenant_id: TenantId, at_customs: Option<bool>) -> (Decimal, Decimal) {
        let filter = StockBalanceFilter {
            at_customs,
            ..Default::default()
        };
        self.stock_balance(tenant_id, &filter)
            .into_iter()
            .fold((Decimal::ZERO, Decimal::ZERO), |(qty, value), row| {
                (qty + row.available_qty, value + row.stock_value)
            })
    }

    /// Apply one published envelope.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .advance(tenant_id, aggregate_id, envelope.sequence_number(), || {
                let event: StockEntryEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                let (event_tenant, entry_id) = stock_entry_event_ids(&event);
                if event_tenant != tenant_id {
                    return Err(ProjectionError::TenantIsolation(
                        "event tenant_id does not match envelope tenant_id".to_string(),
                    ));
                }
                if entry_id.0 != aggregate_id {
                    return Err(ProjectionError::TenantIsolation(
                        "event entry_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                self.apply_event(tenant_id, entry_id, &event);
                Ok(())
            })
    }

    fn apply_event(&self, tenant_id: TenantId, entry_id: StockEntryId, event: &StockEntryEvent) {
        match event {
            StockEntryEvent::StockEntryReceived(e) => {
                let lines = e
                    .items
                    .iter()
                    .enumerate()
                    .map(|(idx, item)| EntryLineBalance {
                        line_index: idx,
                        product_id: item.product_id,
                        uom: item.uom.clone(),
                        received_qty: item.received_qty,
                        reserved_qty: item.reserved_qty,
                        issued_qty: item.issued_qty,
                        landed_cost_rate_local: item.landed_cost_rate_local,
                    })
                    .collect();
                self.store.upsert(
                    tenant_id,
                    entry_id,
                    EntryBalances {
                        entry_id,
                        shipment_id: e.shipment_id,
                        warehouse: e.warehouse,
                        at_warehouse: e.at_warehouse,
                        lines,
                    },
                );
            }
            StockEntryEvent::MovedToWarehouse(e) => {
                self.update(tenant_id, entry_id, |entry| {
                    entry.warehouse = Some(e.warehouse);
                    entry.at_warehouse = true;
                });
            }
            StockEntryEvent::StockReserved(e) => {
                self.update_line(tenant_id, entry_id, e.line_index, |line| {
                    line.reserved_qty += e.quantity;
                });
            }
            StockEntryEvent::StockReleased(e) => {
                self.update_line(tenant_id, entry_id, e.line_index, |line| {
                    line.reserved_qty = clamp_non_negative(line.reserved_qty - e.quantity);
                });
            }
            StockEntryEvent::StockIssued(e) => {
                self.update_line(tenant_id, entry_id, e.line_index, |line| {
                    line.reserved_qty = clamp_non_negative(line.reserved_qty - e.quantity);
                    line.issued_qty += e.quantity;
                });
            }
            StockEntryEvent::IssueReversed(e) => {
                self.update_line(tenant_id, entry_id, e.line_index, |line| {
                    line.issued_qty = clamp_non_negative(line.issued_qty - e.quantity);
                    line.reserved_qty += e.quantity;
                });
            }
            StockEntryEvent::ReceivedQtyAdjusted(e) => {
                self.update_line(tenant_id, entry_id, e.line_index, |line| {
                    line.received_qty = e.new_received_qty;
                });
            }
            StockEntryEvent::LandedCostsUpdated(e) => {
                self.update(tenant_id, entry_id, |entry| {
                    for cost in &e.lines {
                        if let Some(line) = entry.lines.get_mut(cost.line_index) {
                            line.landed_cost_rate_local = cost.landed_cost_rate_local;
                        }
                    }
                });
            }
            StockEntryEvent::StockEntryCancelled(_) => {
                self.store.remove(tenant_id, &entry_id);
            }
        }
    }

    fn update(
        &self,
        tenant_id: TenantId,
        entry_id: StockEntryId,
        f: impl FnOnce(&mut EntryBalances),
    ) {
        if let Some(mut entry) = self.store.get(tenant_id, &entry_id) {
            f(&mut entry);
            self.store.upsert(tenant_id, entry_id, entry);
        }
    }

    fn update_line(
        &self,
        tenant_id: TenantId,
        entry_id: StockEntryId,
        line_index: usize,
        f: impl FnOnce(&mut EntryLineBalance),
    ) {
        self.update(tenant_id, entry_id, |entry| {
            if let Some(line) = entry.lines.get_mut(line_index) {
                f(line);
            }
        });
    }

    /// Rebuild from a full replay of envelopes.
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

        // Deterministic replay order: tenant, aggregate, sequence.
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

fn stock_entry_event_ids(event: &StockEntryEvent) -> (TenantId, StockEntryId) {
    match event {
        StockEntryEvent::StockEntryReceived(e) => (e.tenant_id, e.entry_id),
        StockEntryEvent::MovedToWarehouse(e) => (e.tenant_id, e.entry_id),
        StockEntryEvent::StockReserved(e) => (e.tenant_id, e.entry_id),
        StockEntryEvent::StockReleased(e) => (e.tenant_id, e.entry_id),
        StockEntryEvent::StockIssued(e) => (e.tenant_id, e.entry_id),
        StockEntryEvent::IssueReversed(e) => (e.tenant_id, e.entry_id),
        StockEntryEvent::ReceivedQtyAdjusted(e) => (e.tenant_id, e.entry_id),
        StockEntryEvent::LandedCostsUpdated(e) => (e.tenant_id, e.entry_id),
        StockEntryEvent::StockEntryCancelled(e) => (e.tenant_id, e.entry_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plasticflow_core::AggregateId;
    use plasticflow_inventory::{EntryStatus, StockEntryItem};
    use std::sync::Arc;
    use uuid::Uuid;

    use crate::read_model::InMemoryTenantStore;

    type Store = Arc<InMemoryTenantStore<StockEntryId, EntryBalances>>;

    fn projection() -> StockBalanceProjection<Store> {
        StockBalanceProjection::new(Arc::new(InMemoryTenantStore::new()))
    }

    fn envelope(tenant: TenantId, entry_id: StockEntryId, seq: u64, event: &StockEntryEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant,
            entry_id.0,
            "stock_entry",
            seq,
            Utc::now(),
            serde_json::to_value(event).unwrap(),
        )
    }

    fn received(
        tenant: TenantId,
        entry_id: StockEntryId,
        product: ProductId,
        at_warehouse: bool,
    ) -> StockEntryEvent {
        StockEntryEvent::StockEntryReceived(plasticflow_inventory::StockEntryReceived {
            tenant_id: tenant,
            entry_id,
            shipment_id: ImportShipmentId::new(AggregateId::new()),
            warehouse: at_warehouse.then(|| WarehouseId::new(AggregateId::new())),
            arrival_date: None,
            at_warehouse,
            items: vec![StockEntryItem {
                shipment_item_index: 0,
                product_id: product,
                uom: Unit::Ton,
                received_qty: Decimal::new(100, 0),
                reserved_qty: Decimal::ZERO,
                issued_qty: Decimal::ZERO,
                original_shipped_qty: Decimal::new(100, 0),
                landed_cost_rate: Decimal::new(1_000, 0),
                landed_cost_amount: Decimal::new(100_000, 0),
                landed_cost_rate_local: Decimal::new(110_000, 0),
                landed_cost_amount_local: Decimal::new(11_000_000, 0),
            }],
            status: if at_warehouse {
                EntryStatus::Available
            } else {
                EntryStatus::AtCustoms
            },
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn reservations_and_issues_flow_into_the_report() {
        let projection = projection();
        let tenant = TenantId::new();
        let entry_id = StockEntryId::new(AggregateId::new());
        let product = ProductId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(tenant, entry_id, 1, &received(tenant, entry_id, product, true)))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                tenant,
                entry_id,
                2,
                &StockEntryEvent::StockReserved(plasticflow_inventory::StockReserved {
                    tenant_id: tenant,
                    entry_id,
                    line_index: 0,
                    quantity: Decimal::new(40, 0),
                    new_status: EntryStatus::Reserved,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                tenant,
                entry_id,
                3,
                &StockEntryEvent::StockIssued(plasticflow_inventory::StockIssued {
                    tenant_id: tenant,
                    entry_id,
                    line_index: 0,
                    quantity: Decimal::new(40, 0),
                    new_status: EntryStatus::PartiallyIssued,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        let rows = projection.stock_balance(tenant, &StockBalanceFilter::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].available_qty, Decimal::new(60, 0));
        assert_eq!(rows[0].issued_qty, Decimal::new(40, 0));
        assert_eq!(rows[0].stock_value, Decimal::new(6_600_000, 0));
    }

    #[test]
    fn duplicate_envelopes_do_not_double_apply() {
        let projection = projection();
        let tenant = TenantId::new();
        let entry_id = StockEntryId::new(AggregateId::new());
        let product = ProductId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(tenant, entry_id, 1, &received(tenant, entry_id, product, true)))
            .unwrap();
        let reserve = StockEntryEvent::StockReserved(plasticflow_inventory::StockReserved {
            tenant_id: tenant,
            entry_id,
            line_index: 0,
            quantity: Decimal::new(10, 0),
            new_status: EntryStatus::Reserved,
            occurred_at: Utc::now(),
        });
        projection
            .apply_envelope(&envelope(tenant, entry_id, 2, &reserve))
            .unwrap();
        projection
            .apply_envelope(&envelope(tenant, entry_id, 2, &reserve))
            .unwrap();

        let entry = projection.get(tenant, &entry_id).unwrap();
        assert_eq!(entry.lines[0].reserved_qty, Decimal::new(10, 0));
    }

    #[test]
    fn customs_and_warehouse_stock_split_in_the_filter() {
        let projection = projection();
        let tenant = TenantId::new();
        let product = ProductId::new(AggregateId::new());
        let customs_entry = StockEntryId::new(AggregateId::new());
        let warehouse_entry = StockEntryId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(
                tenant,
                customs_entry,
                1,
                &received(tenant, customs_entry, product, false),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                tenant,
                warehouse_entry,
                1,
                &received(tenant, warehouse_entry, product, true),
            ))
            .unwrap();

        let customs = projection.stock_balance(
            tenant,
            &StockBalanceFilter {
                at_customs: Some(true),
                ..Default::default()
            },
        );
        assert_eq!(customs.len(), 1);
        assert_eq!(customs[0].entry_id, customs_entry);

        let (on_hand_qty, _) = projection.on_hand_totals(tenant);
        assert_eq!(on_hand_qty, Decimal::new(100, 0));
    }

    #[test]
    fn cancelled_entries_leave_the_read_model() {
        let projection = projection();
        let tenant = TenantId::new();
        let entry_id = StockEntryId::new(AggregateId::new());
        let product = ProductId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(tenant, entry_id, 1, &received(tenant, entry_id, product, false)))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                tenant,
                entry_id,
                2,
                &StockEntryEvent::StockEntryCancelled(plasticflow_inventory::StockEntryCancelled {
                    tenant_id: tenant,
                    entry_id,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        assert!(projection.stock_balance(tenant, &StockBalanceFilter::default()).is_empty());
    }

    #[test]
    fn mismatched_event_tenant_is_rejected() {
        let projection = projection();
        let tenant = TenantId::new();
        let entry_id = StockEntryId::new(AggregateId::new());
        let product = ProductId::new(AggregateId::new());

        let event = received(TenantId::new(), entry_id, product, true);
        let env = EventEnvelope::new(
            Uuid::now_v7(),
            tenant,
            entry_id.0,
            "stock_entry",
            1,
            Utc::now(),
            serde_json::to_value(&event).unwrap(),
        );
        let err = projection.apply_envelope(&env).unwrap_err();
        assert!(matches!(err, ProjectionError::TenantIsolation(_)));
    }
}
