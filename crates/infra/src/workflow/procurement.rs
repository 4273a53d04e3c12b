//! Procurement workflow: purchase orders, import shipments, customs
//! clearance, and the receipt flow back onto the order.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use plasticflow_core::{QTY_TOLERANCE, TenantId};
use plasticflow_events::{EventBus, EventEnvelope};
use plasticflow_inventory::{
    CancelStockEntry, EntryItemInput, MoveToWarehouse, ReceiveFromShipment, SlotKey, SlotUpdate,
    StockEntry, StockEntryCommand, StockEntryId, StockLocation,
};
use plasticflow_purchasing::{
    CancelPurchaseOrder, CreatePurchaseOrder, LineReceipt, PoStatus, PurchaseOrder,
    PurchaseOrderCommand, PurchaseOrderId, RecordReceipt, RevertReceipt, SubmitPurchaseOrder,
};
use plasticflow_shipping::{
    CancelImportShipment, CreateImportShipment, ImportShipment, ImportShipmentCommand,
    ImportShipmentId, MarkAtWarehouse, MarkCleared, RollbackClearance, SetDestinationWarehouse,
    ShipmentItemInput,
};

use super::{LotRecord, WorkflowEngine, aggregate_types};
use crate::command_dispatcher::DispatchError;
use crate::event_store::{EventStore, StoredEvent};
use plasticflow_catalog::WarehouseId;

/// Request to draft an import shipment against a purchase order.
#[derive(Debug, Clone)]
pub struct ShipmentDraft {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    pub purchase_order_id: PurchaseOrderId,
    pub shipment_date: Option<NaiveDate>,
    pub expected_arrival: Option<NaiveDate>,
    pub lines: Vec<ShipmentDraftLine>,
}

/// One drafted line, keyed by the purchase order line it draws down.
#[derive(Debug, Clone, Copy)]
pub struct ShipmentDraftLine {
    pub po_line_index: usize,
    pub quantity: Decimal,
}

impl<S, B> WorkflowEngine<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub(crate) fn load_purchase_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Result<PurchaseOrder, DispatchError> {
        self.dispatcher()
            .load(tenant_id, order_id.0, |_, id| {
                PurchaseOrder::empty(PurchaseOrderId::new(id))
            })
    }

    pub(crate) fn load_import_shipment(
        &self,
        tenant_id: TenantId,
        shipment_id: ImportShipmentId,
    ) -> Result<ImportShipment, DispatchError> {
        self.dispatcher()
            .load(tenant_id, shipment_id.0, |_, id| {
                ImportShipment::empty(ImportShipmentId::new(id))
            })
    }

    pub fn create_purchase_order(
        &self,
        cmd: CreatePurchaseOrder,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            cmd.tenant_id,
            cmd.purchase_order_id.0,
            aggregate_types::PURCHASE_ORDER,
            PurchaseOrderCommand::CreatePurchaseOrder(cmd.clone()),
            |_, id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
        )
    }

    pub fn submit_purchase_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            tenant_id,
            order_id.0,
            aggregate_types::PURCHASE_ORDER,
            PurchaseOrderCommand::SubmitPurchaseOrder(SubmitPurchaseOrder {
                tenant_id,
                purchase_order_id: order_id,
                occurred_at: Utc::now(),
            }),
            |_, id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
        )
    }

    pub fn cancel_purchase_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            tenant_id,
            order_id.0,
            aggregate_types::PURCHASE_ORDER,
            PurchaseOrderCommand::CancelPurchaseOrder(CancelPurchaseOrder {
                tenant_id,
                purchase_order_id: order_id,
                occurred_at: Utc::now(),
            }),
            |_, id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
        )
    }

    /// Draft an import shipment against a purchase order.
    ///
    /// Quantities are capped at each line's pending balance minus whatever
    /// sibling shipments of the same order still have in transit, so the
    /// order can never be over-allocated across shipments.
    pub fn create_import_shipment(
        &self,
        draft: ShipmentDraft,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let order = self.load_purchase_order(draft.tenant_id, draft.purchase_order_id)?;
        if !matches!(
            order.status(),
            PoStatus::Submitted | PoStatus::PartiallyReceived
        ) {
            return Err(DispatchError::InvariantViolation(
                "import shipments can only be drafted against a submitted purchase order"
                    .to_string(),
            ));
        }
        let pending = order.pending_lines()?;

        // Quantity already afloat per order line on sibling shipments.
        // Cleared shipments are excluded: their receipt is already on the
        // order and reflected in pending_qty.
        let mut afloat: HashMap<usize, Decimal> = HashMap::new();
        for sibling in
            self.sibling_shipments(draft.tenant_id, draft.purchase_order_id, draft.shipment_id)?
        {
            let shipment = self.load_import_shipment(draft.tenant_id, sibling)?;
            if shipment.is_cancelled() || shipment.clearance_status().is_final() {
                continue;
            }
            for item in shipment.items() {
                *afloat.entry(item.po_line_index).or_default() += item.quantity;
            }
        }

        let mut items = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            let pending_line = pending
                .iter()
                .find(|p| p.line_index == line.po_line_index)
                .ok_or_else(|| {
                    DispatchError::Validation(format!(
                        "purchase order line {} has nothing pending",
                        line.po_line_index
                    ))
                })?;
            let in_transit = afloat.get(&line.po_line_index).copied().unwrap_or_default();
            let open = pending_line.pending_qty - in_transit;
            if line.quantity > open + QTY_TOLERANCE {
                return Err(DispatchError::Validation(format!(
                    "quantity {} on purchase order line {} exceeds the {} still open after in-transit shipments",
                    line.quantity, line.po_line_index, open
                )));
            }
            items.push(ShipmentItemInput {
                po_line_index: line.po_line_index,
                product_id: pending_line.product_id,
                uom: pending_line.uom.clone(),
                quantity: line.quantity,
                base_rate: pending_line.rate,
            });
        }

        let supplier_id = order.supplier_id().ok_or(DispatchError::NotFound)?;
        let committed = self.dispatcher().dispatch(
            draft.tenant_id,
            draft.shipment_id.0,
            aggregate_types::IMPORT_SHIPMENT,
            ImportShipmentCommand::CreateImportShipment(CreateImportShipment {
                tenant_id: draft.tenant_id,
                shipment_id: draft.shipment_id,
                purchase_order_id: draft.purchase_order_id,
                supplier_id,
                currency: order.purchase_currency().to_string(),
                local_currency: order.local_currency().to_string(),
                exchange_rate: order.exchange_rate(),
                shipment_date: draft.shipment_date,
                expected_arrival: draft.expected_arrival,
                items,
                occurred_at: Utc::now(),
            }),
            |_, id| ImportShipment::empty(ImportShipmentId::new(id)),
        )?;
        self.register_shipment(draft.tenant_id, draft.shipment_id, draft.purchase_order_id)?;
        Ok(committed)
    }

    pub fn set_destination_warehouse(
        &self,
        tenant_id: TenantId,
        shipment_id: ImportShipmentId,
        warehouse_id: WarehouseId,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            tenant_id,
            shipment_id.0,
            aggregate_types::IMPORT_SHIPMENT,
            ImportShipmentCommand::SetDestinationWarehouse(SetDestinationWarehouse {
                tenant_id,
                shipment_id,
                warehouse_id,
                occurred_at: Utc::now(),
            }),
            |_, id| ImportShipment::empty(ImportShipmentId::new(id)),
        )
    }

    /// Customs released the goods: mark the shipment cleared, open a stock
    /// lot at customs, record the receipt on the purchase order, and seed the
    /// customs ledger slots.
    pub fn clear_shipment(
        &self,
        tenant_id: TenantId,
        shipment_id: ImportShipmentId,
        cleared_on: NaiveDate,
    ) -> Result<StockEntryId, DispatchError> {
        if self.lot_for_shipment(tenant_id, shipment_id)?.is_some() {
            return Err(DispatchError::InvariantViolation(
                "shipment already has a stock lot; roll back clearance first".to_string(),
            ));
        }

        let shipment = self.load_import_shipment(tenant_id, shipment_id)?;
        let purchase_order_id = shipment.purchase_order_id().ok_or(DispatchError::NotFound)?;
        let now = Utc::now();

        self.dispatcher().dispatch(
            tenant_id,
            shipment_id.0,
            aggregate_types::IMPORT_SHIPMENT,
            ImportShipmentCommand::MarkCleared(MarkCleared {
                tenant_id,
                shipment_id,
                cleared_on,
                occurred_at: now,
            }),
            |_, id| ImportShipment::empty(ImportShipmentId::new(id)),
        )?;

        let entry_id = StockEntryId::new(plasticflow_core::AggregateId::new());
        let items: Vec<EntryItemInput> = shipment
            .items()
            .iter()
            .enumerate()
            .map(|(idx, item)| EntryItemInput {
                shipment_item_index: idx,
                product_id: item.product_id,
                uom: item.uom.clone(),
                quantity: item.quantity,
                landed_cost_rate: item.landed_cost_rate(),
                landed_cost_amount: item.landed_cost_amount,
                landed_cost_rate_local: item.landed_cost_rate_local(),
                landed_cost_amount_local: item.landed_cost_amount_local,
            })
            .collect();

        self.dispatcher().dispatch(
            tenant_id,
            entry_id.0,
            aggregate_types::STOCK_ENTRY,
            StockEntryCommand::ReceiveFromShipment(ReceiveFromShipment {
                tenant_id,
                entry_id,
                shipment_id,
                warehouse: shipment.destination_warehouse(),
                arrival_date: None,
                at_warehouse: false,
                items,
                occurred_at: now,
            }),
            |_, id| StockEntry::empty(StockEntryId::new(id)),
        )?;

        let receipts = merge_receipts(shipment.items().iter().map(|i| (i.po_line_index, i.quantity)));
        self.dispatcher().dispatch(
            tenant_id,
            purchase_order_id.0,
            aggregate_types::PURCHASE_ORDER,
            PurchaseOrderCommand::RecordReceipt(RecordReceipt {
                tenant_id,
                purchase_order_id,
                receipts,
                occurred_at: now,
            }),
            |_, id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
        )?;

        self.mutate_ledger(tenant_id, |ledger| {
            for (product, qty, amount_local) in fold_per_product(
                shipment
                    .items()
                    .iter()
                    .map(|i| (i.product_id, i.quantity, i.landed_cost_amount_local)),
            ) {
                let rate = if qty.is_zero() { qty } else { amount_local / qty };
                ledger.set_balances(
                    SlotKey {
                        product,
                        location: StockLocation::Customs {
                            shipment: shipment_id,
                        },
                    },
                    SlotUpdate {
                        available: Some(qty),
                        reserved: Some(Decimal::ZERO),
                        issued: Some(Decimal::ZERO),
                        landed_cost_rate: Some(rate),
                        landed_cost_amount: Some(amount_local),
                        remark: None,
                    },
                    now,
                );
            }
        })?;

        self.register_lot(
            tenant_id,
            LotRecord {
                entry_id,
                shipment_id,
                created_at: now,
            },
        )?;
        Ok(entry_id)
    }

    /// Goods moved into the destination warehouse: the customs slots close
    /// and the lot's balances reopen under the warehouse.
    pub fn mark_shipment_at_warehouse(
        &self,
        tenant_id: TenantId,
        shipment_id: ImportShipmentId,
        warehouse_id: Option<WarehouseId>,
        arrival_date: NaiveDate,
    ) -> Result<(), DispatchError> {
        let now = Utc::now();
        self.dispatcher().dispatch(
            tenant_id,
            shipment_id.0,
            aggregate_types::IMPORT_SHIPMENT,
            ImportShipmentCommand::MarkAtWarehouse(MarkAtWarehouse {
                tenant_id,
                shipment_id,
                warehouse_id,
                arrival_date,
                occurred_at: now,
            }),
            |_, id| ImportShipment::empty(ImportShipmentId::new(id)),
        )?;

        let record = self
            .lot_for_shipment(tenant_id, shipment_id)?
            .ok_or(DispatchError::NotFound)?;
        let shipment = self.load_import_shipment(tenant_id, shipment_id)?;
        let warehouse = warehouse_id
            .or(shipment.destination_warehouse())
            .ok_or(DispatchError::NotFound)?;

        self.dispatcher().dispatch(
            tenant_id,
            record.entry_id.0,
            aggregate_types::STOCK_ENTRY,
            StockEntryCommand::MoveToWarehouse(MoveToWarehouse {
                tenant_id,
                entry_id: record.entry_id,
                warehouse: Some(warehouse),
                occurred_at: now,
            }),
            |_, id| StockEntry::empty(StockEntryId::new(id)),
        )?;

        let entry = self.load_stock_entry(tenant_id, record.entry_id)?;
        self.mutate_ledger(tenant_id, |ledger| {
            ledger.clear_shipment(shipment_id);
            for (product, balances) in warehouse_balances(&entry) {
                ledger.set_balances(
                    SlotKey {
                        product,
                        location: StockLocation::Warehouse {
                            warehouse,
                            entry: record.entry_id,
                        },
                    },
                    balances,
                    now,
                );
            }
        })?;
        Ok(())
    }

    /// Amended declaration: cancel the stock lot, put the shipment back in
    /// transit, and revert the receipt from the purchase order.
    ///
    /// Refused while the lot carries reservations or issues.
    pub fn rollback_clearance(
        &self,
        tenant_id: TenantId,
        shipment_id: ImportShipmentId,
    ) -> Result<(), DispatchError> {
        let record = self
            .lot_for_shipment(tenant_id, shipment_id)?
            .ok_or(DispatchError::NotFound)?;
        let entry = self.load_stock_entry(tenant_id, record.entry_id)?;
        if entry.total_reserved() > QTY_TOLERANCE || entry.total_issued() > QTY_TOLERANCE {
            return Err(DispatchError::InvariantViolation(
                "release reservations and reverse issues before rolling back clearance"
                    .to_string(),
            ));
        }

        let now = Utc::now();
        self.dispatcher().dispatch(
            tenant_id,
            record.entry_id.0,
            aggregate_types::STOCK_ENTRY,
            StockEntryCommand::CancelStockEntry(CancelStockEntry {
                tenant_id,
                entry_id: record.entry_id,
                occurred_at: now,
            }),
            |_, id| StockEntry::empty(StockEntryId::new(id)),
        )?;
        self.dispatcher().dispatch(
            tenant_id,
            shipment_id.0,
            aggregate_types::IMPORT_SHIPMENT,
            ImportShipmentCommand::RollbackClearance(RollbackClearance {
                tenant_id,
                shipment_id,
                occurred_at: now,
            }),
            |_, id| ImportShipment::empty(ImportShipmentId::new(id)),
        )?;

        let shipment = self.load_import_shipment(tenant_id, shipment_id)?;
        let purchase_order_id = shipment.purchase_order_id().ok_or(DispatchError::NotFound)?;
        let receipts = merge_receipts(shipment.items().iter().map(|i| (i.po_line_index, i.quantity)));
        self.dispatcher().dispatch(
            tenant_id,
            purchase_order_id.0,
            aggregate_types::PURCHASE_ORDER,
            PurchaseOrderCommand::RevertReceipt(RevertReceipt {
                tenant_id,
                purchase_order_id,
                receipts,
                occurred_at: now,
            }),
            |_, id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
        )?;

        self.mutate_ledger(tenant_id, |ledger| {
            ledger.clear_shipment(shipment_id);
            ledger.clear_entry(record.entry_id);
        })?;
        self.unregister_lot(tenant_id, record.entry_id)?;
        Ok(())
    }

    pub fn cancel_import_shipment(
        &self,
        tenant_id: TenantId,
        shipment_id: ImportShipmentId,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        if self.lot_for_shipment(tenant_id, shipment_id)?.is_some() {
            return Err(DispatchError::InvariantViolation(
                "roll back clearance before cancelling the shipment".to_string(),
            ));
        }
        let committed = self.dispatcher().dispatch(
            tenant_id,
            shipment_id.0,
            aggregate_types::IMPORT_SHIPMENT,
            ImportShipmentCommand::CancelImportShipment(CancelImportShipment {
                tenant_id,
                shipment_id,
                occurred_at: Utc::now(),
            }),
            |_, id| ImportShipment::empty(ImportShipmentId::new(id)),
        )?;
        self.unregister_shipment(tenant_id, shipment_id)?;
        Ok(committed)
    }
}

fn merge_receipts(lines: impl Iterator<Item = (usize, Decimal)>) -> Vec<LineReceipt> {
    let mut merged: Vec<LineReceipt> = Vec::new();
    for (line_index, quantity) in lines {
        match merged.iter_mut().find(|r| r.line_index == line_index) {
            Some(r) => r.quantity += quantity,
            None => merged.push(LineReceipt {
                line_index,
                quantity,
            }),
        }
    }
    merged
}

fn fold_per_product(
    lines: impl Iterator<Item = (plasticflow_catalog::ProductId, Decimal, Decimal)>,
) -> Vec<(plasticflow_catalog::ProductId, Decimal, Decimal)> {
    let mut folded: Vec<(plasticflow_catalog::ProductId, Decimal, Decimal)> = Vec::new();
    for (product, qty, amount) in lines {
        match folded.iter_mut().find(|(p, _, _)| *p == product) {
            Some((_, q, a)) => {
                *q += qty;
                *a += amount;
            }
            None => folded.push((product, qty, amount)),
        }
    }
    folded
}

/// Fold a lot's lines into per-product warehouse slot balances.
fn warehouse_balances(entry: &StockEntry) -> Vec<(plasticflow_catalog::ProductId, SlotUpdate)> {
    let mut folded: Vec<(plasticflow_catalog::ProductId, SlotUpdate)> = Vec::new();
    for item in entry.items() {
        match folded.iter_mut().find(|(p, _)| *p == item.product_id) {
            Some((_, update)) => {
                *update = SlotUpdate {
                    available: Some(update.available.unwrap_or_default() + item.available_qty()),
                    reserved: Some(update.reserved.unwrap_or_default() + item.reserved_qty),
                    issued: Some(update.issued.unwrap_or_default() + item.issued_qty),
                    landed_cost_rate: update.landed_cost_rate,
                    landed_cost_amount: Some(
                        update.landed_cost_amount.unwrap_or_default()
                            + item.landed_cost_amount_local,
                    ),
                    remark: None,
                };
            }
            None => folded.push((
                item.product_id,
                SlotUpdate {
                    available: Some(item.available_qty()),
                    reserved: Some(item.reserved_qty),
                    issued: Some(item.issued_qty),
                    landed_cost_rate: Some(item.landed_cost_rate_local),
                    landed_cost_amount: Some(item.landed_cost_amount_local),
                    remark: None,
                },
            )),
        }
    }
    folded
}
