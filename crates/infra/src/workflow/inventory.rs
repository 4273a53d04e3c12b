//! Inventory workflow: manual stock adjustments planned FIFO across lots.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use plasticflow_catalog::{ProductId, WarehouseId};
use plasticflow_core::TenantId;
use plasticflow_events::{EventBus, EventEnvelope};
use plasticflow_inventory::{
    AdjustReceivedQty, AdjustmentAllocation, AdjustmentBatch, ApplyStockAdjustment, BalanceDelta,
    CancelStockAdjustment, LocationKind, StockAdjustment, StockAdjustmentCommand,
    StockAdjustmentId, StockEntry, StockEntryCommand, StockEntryId, plan_adjustment,
};

use super::{WorkflowEngine, aggregate_types, lot_slot};
use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStore;

/// Request to adjust one product's stock by a signed quantity.
#[derive(Debug, Clone)]
pub struct AdjustmentRequest {
    pub tenant_id: TenantId,
    pub adjustment_id: StockAdjustmentId,
    pub product_id: ProductId,
    pub location_kind: LocationKind,
    /// Restricts warehouse adjustments to one warehouse when set.
    pub warehouse: Option<WarehouseId>,
    pub quantity_delta: Decimal,
    pub posting_date: Option<NaiveDate>,
}

impl<S, B> WorkflowEngine<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Apply a signed adjustment, planned oldest-lot-first across the
    /// matching lots, and fan the per-line deltas out to the lots and the
    /// ledger.
    pub fn apply_stock_adjustment(
        &self,
        req: AdjustmentRequest,
    ) -> Result<Vec<AdjustmentAllocation>, DispatchError> {
        let mut batches = Vec::new();
        for record in self.lot_records(req.tenant_id)? {
            let entry = self.load_stock_entry(req.tenant_id, record.entry_id)?;
            let in_scope = match req.location_kind {
                LocationKind::Warehouse => {
                    entry.is_at_warehouse()
                        && (req.warehouse.is_none() || entry.warehouse() == req.warehouse)
                }
                LocationKind::Customs => !entry.is_at_warehouse(),
            };
            if !in_scope {
                continue;
            }
            for (line_index, item) in entry.items().iter().enumerate() {
                if item.product_id != req.product_id {
                    continue;
                }
                batches.push(AdjustmentBatch {
                    entry_id: record.entry_id,
                    line_index,
                    arrival_date: entry.arrival_date(),
                    created_at: record.created_at,
                    received_qty: item.received_qty,
                    available_qty: item.available_qty(),
                    original_shipped_qty: Some(item.original_shipped_qty),
                });
            }
        }

        let allocations =
            plan_adjustment(&batches, req.quantity_delta).map_err(DispatchError::from)?;
        let now = Utc::now();

        self.dispatcher().dispatch(
            req.tenant_id,
            req.adjustment_id.0,
            aggregate_types::STOCK_ADJUSTMENT,
            StockAdjustmentCommand::ApplyStockAdjustment(ApplyStockAdjustment {
                tenant_id: req.tenant_id,
                adjustment_id: req.adjustment_id,
                product_id: req.product_id,
                location_kind: req.location_kind,
                warehouse: req.warehouse,
                quantity_delta: req.quantity_delta,
                posting_date: req.posting_date,
                allocations: allocations.clone(),
                occurred_at: now,
            }),
            |_, id| StockAdjustment::empty(StockAdjustmentId::new(id)),
        )?;

        for alloc in &allocations {
            self.apply_line_delta(req.tenant_id, alloc.entry_id, alloc.line_index, alloc.quantity_delta)?;
        }
        Ok(allocations)
    }

    /// Cancel an adjustment by replaying its allocations in reverse with
    /// negated deltas.
    pub fn cancel_stock_adjustment(
        &self,
        tenant_id: TenantId,
        adjustment_id: StockAdjustmentId,
    ) -> Result<(), DispatchError> {
        let adjustment = self
            .dispatcher()
            .load(tenant_id, adjustment_id.0, |_, id| {
                StockAdjustment::empty(StockAdjustmentId::new(id))
            })?;
        let allocations = adjustment.allocations().to_vec();

        self.dispatcher().dispatch(
            tenant_id,
            adjustment_id.0,
            aggregate_types::STOCK_ADJUSTMENT,
            StockAdjustmentCommand::CancelStockAdjustment(CancelStockAdjustment {
                tenant_id,
                adjustment_id,
                occurred_at: Utc::now(),
            }),
            |_, id| StockAdjustment::empty(StockAdjustmentId::new(id)),
        )?;

        for alloc in allocations.iter().rev() {
            self.apply_line_delta(tenant_id, alloc.entry_id, alloc.line_index, -alloc.quantity_delta)?;
        }
        Ok(())
    }

    fn apply_line_delta(
        &self,
        tenant_id: TenantId,
        entry_id: StockEntryId,
        line_index: usize,
        quantity_delta: Decimal,
    ) -> Result<(), DispatchError> {
        let now = Utc::now();
        self.dispatcher().dispatch(
            tenant_id,
            entry_id.0,
            aggregate_types::STOCK_ENTRY,
            StockEntryCommand::AdjustReceivedQty(AdjustReceivedQty {
                tenant_id,
                entry_id,
                line_index,
                quantity_delta,
                occurred_at: now,
            }),
            |_, id| StockEntry::empty(StockEntryId::new(id)),
        )?;

        let entry = self.load_stock_entry(tenant_id, entry_id)?;
        let Some(item) = entry.items().get(line_index) else {
            return Ok(());
        };
        let slot = lot_slot(&entry, item.product_id)?;
        self.mutate_ledger(tenant_id, |ledger| {
            ledger.apply_delta(
                slot,
                BalanceDelta {
                    available: quantity_delta,
                    ..BalanceDelta::default()
                },
                Some("stock adjustment".to_string()),
                now,
            )
        })?;
        Ok(())
    }
}
