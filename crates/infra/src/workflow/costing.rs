//! Costing workflow: landing cost worksheets against cleared shipments, and
//! the push of a locked allocation into the shipment, its stock lot, and the
//! ledger.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use plasticflow_core::TenantId;
use plasticflow_costing::{
    AllocationMethod, CancelWorksheet, CostComponent, CreateWorksheet, LandingCostWorksheet,
    LandingCostWorksheetId, LockWorksheet, ProfitAssumptions, ShipmentSnapshot, SnapshotItem,
    UnlockWorksheet, UpdateCostComponents, WorksheetCommand, WorksheetStatus,
};
use plasticflow_events::{EventBus, EventEnvelope};
use plasticflow_inventory::{
    LandedCostLine, SlotKey, SlotUpdate, StockEntry, StockEntryCommand, StockEntryId,
    StockLocation, UpdateLandedCosts,
};
use plasticflow_shipping::{ApplyLandedCosts, ImportShipmentCommand, ImportShipmentId, ReleaseLandedCosts};

use super::{WorkflowEngine, aggregate_types};
use crate::command_dispatcher::DispatchError;
use crate::event_store::{EventStore, StoredEvent};

impl<S, B> WorkflowEngine<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub(crate) fn load_worksheet(
        &self,
        tenant_id: TenantId,
        worksheet_id: LandingCostWorksheetId,
    ) -> Result<LandingCostWorksheet, DispatchError> {
        self.dispatcher()
            .load(tenant_id, worksheet_id.0, |_, id| {
                LandingCostWorksheet::empty(LandingCostWorksheetId::new(id))
            })
    }

    /// Open a worksheet against a shipment, snapshotting its items.
    ///
    /// At most one non-cancelled worksheet may exist per shipment.
    pub fn create_worksheet(
        &self,
        tenant_id: TenantId,
        worksheet_id: LandingCostWorksheetId,
        shipment_id: ImportShipmentId,
        allocation_method: AllocationMethod,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        for existing in self.worksheets_for_shipment(tenant_id, shipment_id)? {
            let sheet = self.load_worksheet(tenant_id, existing)?;
            if sheet.status() != WorksheetStatus::Cancelled {
                return Err(DispatchError::InvariantViolation(
                    "shipment already has an active landing cost worksheet".to_string(),
                ));
            }
        }

        let shipment = self.load_import_shipment(tenant_id, shipment_id)?;
        if shipment.is_cancelled() {
            return Err(DispatchError::InvariantViolation(
                "cannot open a worksheet against a cancelled shipment".to_string(),
            ));
        }

        let items = shipment
            .items()
            .iter()
            .enumerate()
            .map(|(idx, item)| SnapshotItem {
                item_index: idx,
                product_id: item.product_id,
                quantity: item.quantity,
                base_amount_import: item.base_amount,
            })
            .collect();
        let snapshot = ShipmentSnapshot {
            shipment_id,
            shipment_currency: shipment.currency().to_string(),
            worksheet_currency: shipment.local_currency().to_string(),
            shipment_exchange_rate: shipment.exchange_rate(),
            items,
        };

        let committed = self.dispatcher().dispatch(
            tenant_id,
            worksheet_id.0,
            aggregate_types::WORKSHEET,
            WorksheetCommand::CreateWorksheet(CreateWorksheet {
                tenant_id,
                worksheet_id,
                snapshot,
                allocation_method,
                occurred_at: Utc::now(),
            }),
            |_, id| LandingCostWorksheet::empty(LandingCostWorksheetId::new(id)),
        )?;
        self.register_worksheet(tenant_id, worksheet_id, shipment_id)?;
        Ok(committed)
    }

    pub fn update_cost_components(
        &self,
        tenant_id: TenantId,
        worksheet_id: LandingCostWorksheetId,
        components: Vec<CostComponent>,
        default_assumptions: ProfitAssumptions,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            tenant_id,
            worksheet_id.0,
            aggregate_types::WORKSHEET,
            WorksheetCommand::UpdateCostComponents(UpdateCostComponents {
                tenant_id,
                worksheet_id,
                components,
                default_assumptions,
                occurred_at: Utc::now(),
            }),
            |_, id| LandingCostWorksheet::empty(LandingCostWorksheetId::new(id)),
        )
    }

    /// Lock the worksheet and push its allocation onto the shipment, the
    /// stock lot (if clearance already produced one), and the ledger.
    pub fn lock_worksheet(
        &self,
        tenant_id: TenantId,
        worksheet_id: LandingCostWorksheetId,
    ) -> Result<(), DispatchError> {
        let now = Utc::now();
        self.dispatcher().dispatch(
            tenant_id,
            worksheet_id.0,
            aggregate_types::WORKSHEET,
            WorksheetCommand::LockWorksheet(LockWorksheet {
                tenant_id,
                worksheet_id,
                occurred_at: now,
            }),
            |_, id| LandingCostWorksheet::empty(LandingCostWorksheetId::new(id)),
        )?;

        let sheet = self.load_worksheet(tenant_id, worksheet_id)?;
        let shipment_id = sheet.shipment_id().ok_or(DispatchError::NotFound)?;
        self.dispatcher().dispatch(
            tenant_id,
            shipment_id.0,
            aggregate_types::IMPORT_SHIPMENT,
            ImportShipmentCommand::ApplyLandedCosts(ApplyLandedCosts {
                tenant_id,
                shipment_id,
                worksheet_id: worksheet_id.0,
                allocations: sheet.shipment_allocations(),
                occurred_at: now,
            }),
            |_, id| plasticflow_shipping::ImportShipment::empty(
                plasticflow_shipping::ImportShipmentId::new(id),
            ),
        )?;

        self.sync_lot_costs(tenant_id, shipment_id)
    }

    /// Unlock for revision: release the allocation from the shipment and zero
    /// the lot's landed costs until the next lock.
    pub fn unlock_worksheet(
        &self,
        tenant_id: TenantId,
        worksheet_id: LandingCostWorksheetId,
    ) -> Result<(), DispatchError> {
        let now = Utc::now();
        self.dispatcher().dispatch(
            tenant_id,
            worksheet_id.0,
            aggregate_types::WORKSHEET,
            WorksheetCommand::UnlockWorksheet(UnlockWorksheet {
                tenant_id,
                worksheet_id,
                occurred_at: now,
            }),
            |_, id| LandingCostWorksheet::empty(LandingCostWorksheetId::new(id)),
        )?;

        let sheet = self.load_worksheet(tenant_id, worksheet_id)?;
        let shipment_id = sheet.shipment_id().ok_or(DispatchError::NotFound)?;
        self.dispatcher().dispatch(
            tenant_id,
            shipment_id.0,
            aggregate_types::IMPORT_SHIPMENT,
            ImportShipmentCommand::ReleaseLandedCosts(ReleaseLandedCosts {
                tenant_id,
                shipment_id,
                worksheet_id: worksheet_id.0,
                occurred_at: now,
            }),
            |_, id| plasticflow_shipping::ImportShipment::empty(
                plasticflow_shipping::ImportShipmentId::new(id),
            ),
        )?;

        self.sync_lot_costs(tenant_id, shipment_id)
    }

    pub fn cancel_worksheet(
        &self,
        tenant_id: TenantId,
        worksheet_id: LandingCostWorksheetId,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let committed = self.dispatcher().dispatch(
            tenant_id,
            worksheet_id.0,
            aggregate_types::WORKSHEET,
            WorksheetCommand::CancelWorksheet(CancelWorksheet {
                tenant_id,
                worksheet_id,
                occurred_at: Utc::now(),
            }),
            |_, id| LandingCostWorksheet::empty(LandingCostWorksheetId::new(id)),
        )?;
        self.unregister_worksheet(tenant_id, worksheet_id)?;
        Ok(committed)
    }

    /// Re-derive a lot's landed cost lines from its shipment's current
    /// per-unit rates (zero when no worksheet is locked in).
    fn sync_lot_costs(
        &self,
        tenant_id: TenantId,
        shipment_id: ImportShipmentId,
    ) -> Result<(), DispatchError> {
        let Some(record) = self.lot_for_shipment(tenant_id, shipment_id)? else {
            return Ok(());
        };
        let now = Utc::now();
        let shipment = self.load_import_shipment(tenant_id, shipment_id)?;
        let entry = self.load_stock_entry(tenant_id, record.entry_id)?;

        let mut lines = Vec::with_capacity(entry.items().len());
        for (line_index, item) in entry.items().iter().enumerate() {
            let ship_item = shipment
                .items()
                .get(item.shipment_item_index)
                .ok_or(DispatchError::NotFound)?;
            let rate = ship_item.landed_cost_rate();
            let rate_local = ship_item.landed_cost_rate_local();
            lines.push(LandedCostLine {
                line_index,
                landed_cost_rate: rate,
                landed_cost_amount: rate * item.received_qty,
                landed_cost_rate_local: rate_local,
                landed_cost_amount_local: rate_local * item.received_qty,
            });
        }

        self.dispatcher().dispatch(
            tenant_id,
            record.entry_id.0,
            aggregate_types::STOCK_ENTRY,
            StockEntryCommand::UpdateLandedCosts(UpdateLandedCosts {
                tenant_id,
                entry_id: record.entry_id,
                lines,
                occurred_at: now,
            }),
            |_, id| StockEntry::empty(StockEntryId::new(id)),
        )?;

        let entry = self.load_stock_entry(tenant_id, record.entry_id)?;
        self.mutate_ledger(tenant_id, |ledger| {
            for (product, qty, amount_local) in per_product_costs(&entry) {
                let location = if entry.is_at_warehouse() {
                    match entry.warehouse() {
                        Some(warehouse) => StockLocation::Warehouse {
                            warehouse,
                            entry: record.entry_id,
                        },
                        None => continue,
                    }
                } else {
                    StockLocation::Customs {
                        shipment: shipment_id,
                    }
                };
                ledger.set_balances(
                    SlotKey { product, location },
                    SlotUpdate {
                        landed_cost_rate: Some(if qty.is_zero() {
                            Decimal::ZERO
                        } else {
                            amount_local / qty
                        }),
                        landed_cost_amount: Some(amount_local),
                        ..SlotUpdate::default()
                    },
                    now,
                );
            }
        })?;
        Ok(())
    }
}

fn per_product_costs(
    entry: &plasticflow_inventory::StockEntry,
) -> Vec<(plasticflow_catalog::ProductId, Decimal, Decimal)> {
    let mut folded: Vec<(plasticflow_catalog::ProductId, Decimal, Decimal)> = Vec::new();
    for item in entry.items() {
        match folded.iter_mut().find(|(p, _, _)| *p == item.product_id) {
            Some((_, qty, amount)) => {
                *qty += item.received_qty;
                *amount += item.landed_cost_amount_local;
            }
            None => folded.push((
                item.product_id,
                item.received_qty,
                item.landed_cost_amount_local,
            )),
        }
    }
    folded
}
