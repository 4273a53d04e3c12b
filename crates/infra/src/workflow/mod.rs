//! Workflow services: the coordination layer between aggregates.
//!
//! Every rule that spans more than one aggregate lives here: drafting a
//! shipment against a purchase order's pending lines, turning customs
//! clearance into a stock lot and a ledger slot, pushing a locked worksheet's
//! allocation into the shipment and its lot, reserving stock FIFO for a sales
//! order, and walking a delivery through gate pass, loading, and issuance.
//!
//! The engine keeps the authoritative [`StockLedger`] per tenant, plus small
//! registries (lots per shipment, shipments per purchase order, worksheets
//! per shipment) that answer the cross-aggregate questions the event store
//! alone cannot: "which lot came from this shipment", "how much of this
//! purchase order line is already afloat".

mod costing;
mod delivery;
mod inventory;
mod masterdata;
mod procurement;
mod proforma;
mod sales;

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use plasticflow_core::{AggregateId, TenantId};
use plasticflow_costing::LandingCostWorksheetId;
use plasticflow_events::{EventBus, EventEnvelope};
use plasticflow_inventory::{
    BatchSummary, FifoPolicy, SlotKey, StockEntry, StockEntryId, StockLedger, StockLocation,
};
use plasticflow_purchasing::PurchaseOrderId;
use plasticflow_shipping::ImportShipmentId;

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

pub use inventory::AdjustmentRequest;
pub use procurement::{ShipmentDraft, ShipmentDraftLine};
pub use proforma::{ProformaConversion, ProformaDraft};
pub use sales::{GatePassRequest, InvoiceRequest};

/// Aggregate type tags recorded on every stream.
pub mod aggregate_types {
    pub const PARTY: &str = "parties.party";
    pub const PRODUCT: &str = "catalog.product";
    pub const WAREHOUSE: &str = "catalog.warehouse";
    pub const PURCHASE_ORDER: &str = "purchasing.order";
    pub const IMPORT_SHIPMENT: &str = "shipping.shipment";
    pub const WORKSHEET: &str = "costing.worksheet";
    pub const STOCK_ENTRY: &str = "inventory.stock_entry";
    pub const STOCK_ADJUSTMENT: &str = "inventory.adjustment";
    pub const SALES_ORDER: &str = "sales.order";
    pub const PROFORMA_INVOICE: &str = "sales.proforma";
    pub const INVOICE: &str = "invoicing.invoice";
    pub const GATE_PASS: &str = "logistics.gate_pass";
    pub const LOADING_ORDER: &str = "logistics.loading_order";
    pub const DELIVERY_NOTE: &str = "logistics.delivery_note";
}

/// One stock lot the engine knows about, with the clearance timestamp FIFO
/// falls back to when the lot has no arrival date.
#[derive(Debug, Clone, Copy)]
struct LotRecord {
    entry_id: StockEntryId,
    shipment_id: ImportShipmentId,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct ShipmentRecord {
    shipment_id: ImportShipmentId,
    purchase_order_id: PurchaseOrderId,
}

#[derive(Debug, Clone, Copy)]
struct WorksheetRecord {
    worksheet_id: LandingCostWorksheetId,
    shipment_id: ImportShipmentId,
}

/// The workflow engine.
///
/// Generic over store and bus like the dispatcher it wraps, so tests run
/// fully in memory.
#[derive(Debug)]
pub struct WorkflowEngine<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    ledgers: RwLock<HashMap<TenantId, StockLedger>>,
    lots: RwLock<HashMap<TenantId, Vec<LotRecord>>>,
    shipments: RwLock<HashMap<TenantId, Vec<ShipmentRecord>>>,
    worksheets: RwLock<HashMap<TenantId, Vec<WorksheetRecord>>>,
    fifo: FifoPolicy,
}

impl<S, B> WorkflowEngine<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self::with_fifo_policy(store, bus, FifoPolicy::default())
    }

    pub fn with_fifo_policy(store: S, bus: B, fifo: FifoPolicy) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store, bus),
            ledgers: RwLock::new(HashMap::new()),
            lots: RwLock::new(HashMap::new()),
            shipments: RwLock::new(HashMap::new()),
            worksheets: RwLock::new(HashMap::new()),
            fifo,
        }
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S, B> {
        &self.dispatcher
    }

    pub fn fifo_policy(&self) -> FifoPolicy {
        self.fifo
    }

    /// Read access to a tenant's ledger.
    pub fn with_ledger<R>(
        &self,
        tenant_id: TenantId,
        f: impl FnOnce(&StockLedger) -> R,
    ) -> Result<R, DispatchError> {
        let map = self.ledgers.read().map_err(|_| lock_poisoned("ledger"))?;
        Ok(match map.get(&tenant_id) {
            Some(ledger) => f(ledger),
            None => f(&StockLedger::new()),
        })
    }

    pub(crate) fn mutate_ledger<R>(
        &self,
        tenant_id: TenantId,
        f: impl FnOnce(&mut StockLedger) -> R,
    ) -> Result<R, DispatchError> {
        let mut map = self.ledgers.write().map_err(|_| lock_poisoned("ledger"))?;
        Ok(f(map.entry(tenant_id).or_default()))
    }

    // Registry plumbing.

    fn register_lot(&self, tenant_id: TenantId, record: LotRecord) -> Result<(), DispatchError> {
        let mut map = self.lots.write().map_err(|_| lock_poisoned("lot registry"))?;
        map.entry(tenant_id).or_default().push(record);
        Ok(())
    }

    fn unregister_lot(
        &self,
        tenant_id: TenantId,
        entry_id: StockEntryId,
    ) -> Result<(), DispatchError> {
        let mut map = self.lots.write().map_err(|_| lock_poisoned("lot registry"))?;
        if let Some(records) = map.get_mut(&tenant_id) {
            records.retain(|r| r.entry_id != entry_id);
        }
        Ok(())
    }

    fn lot_for_shipment(
        &self,
        tenant_id: TenantId,
        shipment_id: ImportShipmentId,
    ) -> Result<Option<LotRecord>, DispatchError> {
        let map = self.lots.read().map_err(|_| lock_poisoned("lot registry"))?;
        Ok(map
            .get(&tenant_id)
            .and_then(|records| records.iter().find(|r| r.shipment_id == shipment_id))
            .copied())
    }

    fn lot_records(&self, tenant_id: TenantId) -> Result<Vec<LotRecord>, DispatchError> {
        let map = self.lots.read().map_err(|_| lock_poisoned("lot registry"))?;
        Ok(map.get(&tenant_id).cloned().unwrap_or_default())
    }

    fn register_shipment(
        &self,
        tenant_id: TenantId,
        shipment_id: ImportShipmentId,
        purchase_order_id: PurchaseOrderId,
    ) -> Result<(), DispatchError> {
        let mut map = self
            .shipments
            .write()
            .map_err(|_| lock_poisoned("shipment registry"))?;
        map.entry(tenant_id).or_default().push(ShipmentRecord {
            shipment_id,
            purchase_order_id,
        });
        Ok(())
    }

    fn unregister_shipment(
        &self,
        tenant_id: TenantId,
        shipment_id: ImportShipmentId,
    ) -> Result<(), DispatchError> {
        let mut map = self
            .shipments
            .write()
            .map_err(|_| lock_poisoned("shipment registry"))?;
        if let Some(records) = map.get_mut(&tenant_id) {
            records.retain(|r| r.shipment_id != shipment_id);
        }
        Ok(())
    }

    fn sibling_shipments(
        &self,
        tenant_id: TenantId,
        purchase_order_id: PurchaseOrderId,
        except: ImportShipmentId,
    ) -> Result<Vec<ImportShipmentId>, DispatchError> {
        let map = self
            .shipments
            .read()
            .map_err(|_| lock_poisoned("shipment registry"))?;
        Ok(map
            .get(&tenant_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| {
                        r.purchase_order_id == purchase_order_id && r.shipment_id != except
                    })
                    .map(|r| r.shipment_id)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn register_worksheet(
        &self,
        tenant_id: TenantId,
        worksheet_id: LandingCostWorksheetId,
        shipment_id: ImportShipmentId,
    ) -> Result<(), DispatchError> {
        let mut map = self
            .worksheets
            .write()
            .map_err(|_| lock_poisoned("worksheet registry"))?;
        map.entry(tenant_id).or_default().push(WorksheetRecord {
            worksheet_id,
            shipment_id,
        });
        Ok(())
    }

    fn unregister_worksheet(
        &self,
        tenant_id: TenantId,
        worksheet_id: LandingCostWorksheetId,
    ) -> Result<(), DispatchError> {
        let mut map = self
            .worksheets
            .write()
            .map_err(|_| lock_poisoned("worksheet registry"))?;
        if let Some(records) = map.get_mut(&tenant_id) {
            records.retain(|r| r.worksheet_id != worksheet_id);
        }
        Ok(())
    }

    fn worksheets_for_shipment(
        &self,
        tenant_id: TenantId,
        shipment_id: ImportShipmentId,
    ) -> Result<Vec<LandingCostWorksheetId>, DispatchError> {
        let map = self
            .worksheets
            .read()
            .map_err(|_| lock_poisoned("worksheet registry"))?;
        Ok(map
            .get(&tenant_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.shipment_id == shipment_id)
                    .map(|r| r.worksheet_id)
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn lock_poisoned(what: &str) -> DispatchError {
    DispatchError::LockPoisoned(what.to_string())
}

impl<S, B> WorkflowEngine<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub(crate) fn load_stock_entry(
        &self,
        tenant_id: TenantId,
        entry_id: StockEntryId,
    ) -> Result<StockEntry, DispatchError> {
        self.dispatcher
            .load(tenant_id, entry_id.0, |_, id: AggregateId| {
                StockEntry::empty(StockEntryId::new(id))
            })
    }

    /// Batch view for FIFO and adjustment planning: one summary per product
    /// per warehoused lot, built from the live aggregates.
    pub(crate) fn batch_summaries(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<BatchSummary>, DispatchError> {
        let mut summaries = Vec::new();
        for record in self.lot_records(tenant_id)? {
            let entry = self.load_stock_entry(tenant_id, record.entry_id)?;
            let Some(warehouse) = entry.warehouse().filter(|_| entry.is_at_warehouse()) else {
                continue;
            };

            let mut per_product: Vec<(plasticflow_catalog::ProductId, rust_decimal::Decimal)> =
                Vec::new();
            for item in entry.items() {
                match per_product.iter_mut().find(|(p, _)| *p == item.product_id) {
                    Some((_, available)) => *available += item.available_qty(),
                    None => per_product.push((item.product_id, item.available_qty())),
                }
            }

            for (product_id, available) in per_product {
                summaries.push(BatchSummary {
                    entry_id: record.entry_id,
                    product_id,
                    warehouse,
                    arrival_date: entry.arrival_date(),
                    created_at: record.created_at,
                    available,
                    status: entry.status(),
                });
            }
        }
        Ok(summaries)
    }
}

/// Ledger slot for one product on a lot: warehouse slot once the lot moved
/// in, customs slot under the originating shipment before that.
pub(crate) fn lot_slot(
    entry: &StockEntry,
    product: plasticflow_catalog::ProductId,
) -> Result<SlotKey, DispatchError> {
    let location = if entry.is_at_warehouse() {
        let warehouse = entry.warehouse().ok_or_else(|| {
            DispatchError::InvariantViolation(
                "stock entry is at warehouse but has no warehouse recorded".to_string(),
            )
        })?;
        StockLocation::Warehouse {
            warehouse,
            entry: entry.id_typed(),
        }
    } else {
        let shipment = entry.shipment_id().ok_or_else(|| {
            DispatchError::InvariantViolation(
                "stock entry has no originating shipment recorded".to_string(),
            )
        })?;
        StockLocation::Customs { shipment }
    };
    Ok(SlotKey { product, location })
}
