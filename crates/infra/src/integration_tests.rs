//! End-to-end tests running the whole pipeline against the in-memory store
//! and bus: purchase order, import shipment, clearance, landed costs, sales
//! order, invoicing, gate pass, and delivery.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use plasticflow_catalog::{ProductId, Unit, WarehouseId};
use plasticflow_core::{AggregateId, ExpectedVersion, TenantId};
use plasticflow_costing::{
    AllocationMethod, CostBucket, CostComponent, CostScope, LandingCostWorksheetId,
    ProfitAssumptions, WorksheetStatus,
};
use plasticflow_events::{EventBus, EventEnvelope, InMemoryEventBus};
use plasticflow_inventory::{
    FifoPolicy, LocationKind, SlotKey, StockAdjustmentId, StockEntryId, StockLocation,
};
use plasticflow_invoicing::InvoiceId;
use plasticflow_logistics::{
    DeliveryNoteId, GatePassId, GatePassStatus, IssueGatePass, LoadingStatus,
};
use plasticflow_parties::PartyId;
use plasticflow_purchasing::{CreatePurchaseOrder, PoStatus, PurchaseOrderId};
use plasticflow_sales::{
    BatchRef, CreateSalesOrder, DeliverySource, OrderStatus, ProformaInvoiceId,
    ProformaLineInput, ProformaStatus, SalesOrderId, SalesOrderLineInput, SalesType,
};
use plasticflow_shipping::{ClearanceStatus, ImportShipmentId};

use crate::command_dispatcher::DispatchError;
use crate::event_store::{
    EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent,
};
use crate::projections::ImportShipmentsProjection;
use crate::read_model::InMemoryTenantStore;
use crate::workflow::{
    aggregate_types, AdjustmentRequest, GatePassRequest, InvoiceRequest, ProformaConversion,
    ProformaDraft, ShipmentDraft, ShipmentDraftLine, WorkflowEngine,
};

type TestEngine = WorkflowEngine<InMemoryEventStore, InMemoryEventBus<EventEnvelope<JsonValue>>>;

fn engine() -> TestEngine {
    WorkflowEngine::new(InMemoryEventStore::new(), InMemoryEventBus::new())
}

fn engine_without_fifo() -> TestEngine {
    WorkflowEngine::with_fifo_policy(
        InMemoryEventStore::new(),
        InMemoryEventBus::new(),
        FifoPolicy::disabled(),
    )
}

fn d(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

fn day(y: i32, m: u32, dd: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, dd).expect("valid date")
}

/// One purchase order of `quantity` tons at `rate` USD/ton, submitted.
fn submitted_po<S, B>(
    engine: &WorkflowEngine<S, B>,
    tenant: TenantId,
    product: ProductId,
    quantity: i64,
    rate: i64,
) -> PurchaseOrderId
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let po = PurchaseOrderId::new(AggregateId::new());
    engine
        .create_purchase_order(CreatePurchaseOrder {
            tenant_id: tenant,
            purchase_order_id: po,
            supplier_id: PartyId::new(AggregateId::new()),
            purchase_currency: "USD".to_string(),
            local_currency: "PKR".to_string(),
            exchange_rate: Some(d(280)),
            order_date: day(2025, 1, 5),
            expected_shipment: None,
            lines: vec![(product, Unit::Ton, d(quantity), d(rate))],
            occurred_at: Utc::now(),
        })
        .expect("create purchase order");
    engine
        .submit_purchase_order(tenant, po)
        .expect("submit purchase order");
    po
}

fn drafted_shipment<S, B>(
    engine: &WorkflowEngine<S, B>,
    tenant: TenantId,
    po: PurchaseOrderId,
    quantity: i64,
) -> ImportShipmentId
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let shipment = ImportShipmentId::new(AggregateId::new());
    engine
        .create_import_shipment(ShipmentDraft {
            tenant_id: tenant,
            shipment_id: shipment,
            purchase_order_id: po,
            shipment_date: Some(day(2025, 1, 20)),
            expected_arrival: None,
            lines: vec![ShipmentDraftLine {
                po_line_index: 0,
                quantity: d(quantity),
            }],
        })
        .expect("draft shipment");
    shipment
}

/// Full import pipeline: PO -> shipment -> cleared -> at warehouse.
/// Returns (po, shipment, entry, warehouse).
fn warehoused_lot<S, B>(
    engine: &WorkflowEngine<S, B>,
    tenant: TenantId,
    product: ProductId,
    quantity: i64,
) -> (PurchaseOrderId, ImportShipmentId, StockEntryId, WarehouseId)
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let warehouse = WarehouseId::new(AggregateId::new());
    let (po, shipment, entry) = warehoused_lot_in(engine, tenant, product, warehouse, quantity);
    (po, shipment, entry, warehouse)
}

/// Same pipeline, landing in a caller-chosen warehouse.
fn warehoused_lot_in<S, B>(
    engine: &WorkflowEngine<S, B>,
    tenant: TenantId,
    product: ProductId,
    warehouse: WarehouseId,
    quantity: i64,
) -> (PurchaseOrderId, ImportShipmentId, StockEntryId)
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let po = submitted_po(engine, tenant, product, quantity, 500);
    let shipment = drafted_shipment(engine, tenant, po, quantity);
    engine
        .set_destination_warehouse(tenant, shipment, warehouse)
        .expect("set destination");
    let entry = engine
        .clear_shipment(tenant, shipment, day(2025, 2, 1))
        .expect("clear shipment");
    engine
        .mark_shipment_at_warehouse(tenant, shipment, None, day(2025, 2, 3))
        .expect("mark at warehouse");
    (po, shipment, entry)
}

/// Credit order for `quantity` tons at `rate`, pinned to one lot line and
/// submitted (reserving the stock).
fn submitted_credit_order(
    engine: &TestEngine,
    tenant: TenantId,
    product: ProductId,
    entry: StockEntryId,
    warehouse: WarehouseId,
    quantity: i64,
    rate: i64,
) -> SalesOrderId {
    let order = SalesOrderId::new(AggregateId::new());
    engine
        .create_sales_order(CreateSalesOrder {
            tenant_id: tenant,
            order_id: order,
            customer: PartyId::new(AggregateId::new()),
            sales_type: SalesType::Credit,
            delivery_source: DeliverySource::Warehouse,
            currency: "PKR".to_string(),
            lines: vec![SalesOrderLineInput {
                product_id: product,
                uom: Unit::Ton,
                quantity: d(quantity),
                rate: d(rate),
                batch: Some(BatchRef {
                    entry_id: entry,
                    line_index: 0,
                }),
                warehouse: Some(warehouse),
            }],
            occurred_at: Utc::now(),
        })
        .expect("create sales order");
    engine
        .submit_sales_order(tenant, order)
        .expect("submit sales order");
    order
}

fn warehouse_slot(product: ProductId, warehouse: WarehouseId, entry: StockEntryId) -> SlotKey {
    SlotKey {
        product,
        location: StockLocation::Warehouse { warehouse, entry },
    }
}

#[test]
fn shipment_drafts_cannot_overallocate_the_order() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let po = submitted_po(&engine, tenant, product, 100, 500);

    drafted_shipment(&engine, tenant, po, 60);

    let err = engine
        .create_import_shipment(ShipmentDraft {
            tenant_id: tenant,
            shipment_id: ImportShipmentId::new(AggregateId::new()),
            purchase_order_id: po,
            shipment_date: None,
            expected_arrival: None,
            lines: vec![ShipmentDraftLine {
                po_line_index: 0,
                quantity: d(50),
            }],
        })
        .unwrap_err();
    match err {
        DispatchError::Validation(_) => {}
        other => panic!("Expected Validation error, got {other:?}"),
    }

    // The remaining 40 can still be drafted.
    drafted_shipment(&engine, tenant, po, 40);
}

#[test]
fn clearance_opens_a_customs_lot_and_records_the_receipt() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let warehouse = WarehouseId::new(AggregateId::new());
    let po = submitted_po(&engine, tenant, product, 100, 500);
    let shipment = drafted_shipment(&engine, tenant, po, 60);
    engine
        .set_destination_warehouse(tenant, shipment, warehouse)
        .expect("set destination");

    let entry = engine
        .clear_shipment(tenant, shipment, day(2025, 2, 1))
        .expect("clear shipment");

    let order = engine.load_purchase_order(tenant, po).expect("load po");
    assert_eq!(order.status(), PoStatus::PartiallyReceived);

    let loaded = engine
        .load_import_shipment(tenant, shipment)
        .expect("load shipment");
    assert_eq!(loaded.clearance_status(), ClearanceStatus::Cleared);

    let lot = engine.load_stock_entry(tenant, entry).expect("load lot");
    assert!(!lot.is_at_warehouse());
    assert_eq!(lot.total_received(), d(60));

    engine.with_ledger(tenant, |ledger| {
        assert_eq!(ledger.available(product, LocationKind::Customs), d(60));
        assert_eq!(ledger.available_for_shipment(product, shipment), d(60));
        assert_eq!(ledger.available_in_warehouse(product, warehouse), d(0));
    })
    .unwrap();

    // A second clearance of the same shipment is refused.
    let err = engine
        .clear_shipment(tenant, shipment, day(2025, 2, 2))
        .unwrap_err();
    match err {
        DispatchError::InvariantViolation(_) => {}
        other => panic!("Expected InvariantViolation error, got {other:?}"),
    }
}

#[test]
fn arrival_moves_the_customs_balances_into_the_warehouse() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let (_, shipment, entry, warehouse) = warehoused_lot(&engine, tenant, product, 100);

    let lot = engine.load_stock_entry(tenant, entry).expect("load lot");
    assert!(lot.is_at_warehouse());
    assert_eq!(lot.warehouse(), Some(warehouse));

    engine.with_ledger(tenant, |ledger| {
        assert_eq!(ledger.available_for_shipment(product, shipment), d(0));
        assert_eq!(ledger.available_in_warehouse(product, warehouse), d(100));
    })
    .unwrap();
}

#[test]
fn clearance_rollback_reverts_the_receipt_and_clears_the_ledger() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let warehouse = WarehouseId::new(AggregateId::new());
    let po = submitted_po(&engine, tenant, product, 100, 500);
    let shipment = drafted_shipment(&engine, tenant, po, 60);
    engine
        .set_destination_warehouse(tenant, shipment, warehouse)
        .expect("set destination");
    engine
        .clear_shipment(tenant, shipment, day(2025, 2, 1))
        .expect("clear shipment");

    engine
        .rollback_clearance(tenant, shipment)
        .expect("rollback clearance");

    let order = engine.load_purchase_order(tenant, po).expect("load po");
    assert_eq!(order.status(), PoStatus::Submitted);
    engine.with_ledger(tenant, |ledger| {
        assert_eq!(ledger.available(product, LocationKind::Customs), d(0));
    })
    .unwrap();

    // With the lot gone the shipment can now be cancelled.
    engine
        .cancel_import_shipment(tenant, shipment)
        .expect("cancel shipment");
}

#[test]
fn rollback_is_refused_while_the_lot_holds_reservations() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let (_, shipment, entry, warehouse) = warehoused_lot(&engine, tenant, product, 100);
    submitted_credit_order(&engine, tenant, product, entry, warehouse, 40, 150);

    let err = engine.rollback_clearance(tenant, shipment).unwrap_err();
    match err {
        DispatchError::InvariantViolation(_) => {}
        other => panic!("Expected InvariantViolation error, got {other:?}"),
    }
}

#[test]
fn locked_worksheet_pushes_landed_costs_onto_shipment_lot_and_ledger() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let (_, shipment, entry, warehouse) = warehoused_lot(&engine, tenant, product, 100);

    let worksheet = LandingCostWorksheetId::new(AggregateId::new());
    engine
        .create_worksheet(tenant, worksheet, shipment, AllocationMethod::ByQuantity)
        .expect("create worksheet");
    engine
        .update_cost_components(
            tenant,
            worksheet,
            vec![CostComponent {
                name: "inland freight".to_string(),
                bucket: CostBucket::Local,
                scope: CostScope::TotalAmount,
                amount: d(100_000),
                percent: None,
                currency: "PKR".to_string(),
                exchange_rate: None,
                apply_to_item: None,
            }],
            ProfitAssumptions::default(),
        )
        .expect("update components");
    engine
        .lock_worksheet(tenant, worksheet)
        .expect("lock worksheet");

    let loaded = engine
        .load_import_shipment(tenant, shipment)
        .expect("load shipment");
    assert!(loaded.landed_costs_locked());
    assert!(loaded.total_landed_cost_local() > Decimal::ZERO);

    let lot = engine.load_stock_entry(tenant, entry).expect("load lot");
    assert!(lot.items()[0].landed_cost_rate_local > Decimal::ZERO);

    engine.with_ledger(tenant, |ledger| {
        let slot = ledger
            .slot(&warehouse_slot(product, warehouse, entry))
            .expect("warehouse slot");
        assert!(slot.landed_cost_rate > Decimal::ZERO);
        assert!(slot.stock_value() > Decimal::ZERO);
    })
    .unwrap();

    // Only one active worksheet per shipment.
    let err = engine
        .create_worksheet(
            tenant,
            LandingCostWorksheetId::new(AggregateId::new()),
            shipment,
            AllocationMethod::ByQuantity,
        )
        .unwrap_err();
    match err {
        DispatchError::InvariantViolation(_) => {}
        other => panic!("Expected InvariantViolation error, got {other:?}"),
    }

    // Unlocking zeroes the lot costs again.
    engine
        .unlock_worksheet(tenant, worksheet)
        .expect("unlock worksheet");
    let sheet = engine
        .load_worksheet(tenant, worksheet)
        .expect("load worksheet");
    assert_eq!(sheet.status(), WorksheetStatus::InReview);
    let lot = engine.load_stock_entry(tenant, entry).expect("load lot");
    assert_eq!(lot.items()[0].landed_cost_rate_local, Decimal::ZERO);
}

#[test]
fn submitting_a_sales_order_reserves_the_pinned_lot_line() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let (_, _, entry, warehouse) = warehoused_lot(&engine, tenant, product, 100);

    let order = submitted_credit_order(&engine, tenant, product, entry, warehouse, 40, 150);

    let loaded = engine.load_sales_order(tenant, order).expect("load order");
    assert_eq!(loaded.status(), OrderStatus::CreditSales);

    let lot = engine.load_stock_entry(tenant, entry).expect("load lot");
    assert_eq!(lot.total_reserved(), d(40));

    engine.with_ledger(tenant, |ledger| {
        let slot = ledger
            .slot(&warehouse_slot(product, warehouse, entry))
            .expect("warehouse slot");
        assert_eq!(slot.available, d(60));
        assert_eq!(slot.reserved, d(40));
    })
    .unwrap();
}

#[test]
fn oversized_order_line_is_rejected_before_any_reservation() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let (_, _, entry, warehouse) = warehoused_lot(&engine, tenant, product, 50);

    let order = SalesOrderId::new(AggregateId::new());
    engine
        .create_sales_order(CreateSalesOrder {
            tenant_id: tenant,
            order_id: order,
            customer: PartyId::new(AggregateId::new()),
            sales_type: SalesType::Credit,
            delivery_source: DeliverySource::Warehouse,
            currency: "PKR".to_string(),
            lines: vec![SalesOrderLineInput {
                product_id: product,
                uom: Unit::Ton,
                quantity: d(80),
                rate: d(150),
                batch: Some(BatchRef {
                    entry_id: entry,
                    line_index: 0,
                }),
                warehouse: Some(warehouse),
            }],
            occurred_at: Utc::now(),
        })
        .expect("create sales order");

    let err = engine.submit_sales_order(tenant, order).unwrap_err();
    match err {
        DispatchError::InvariantViolation(_) => {}
        other => panic!("Expected InvariantViolation error, got {other:?}"),
    }

    let lot = engine.load_stock_entry(tenant, entry).expect("load lot");
    assert_eq!(lot.total_reserved(), d(0));
}

/// Store wrapper that refuses any append carrying the named event type,
/// simulating a concurrent writer beating a multi-step workflow to one of
/// its streams.
struct RefusingStore {
    inner: InMemoryEventStore,
    refuse_event_type: &'static str,
}

impl EventStore for RefusingStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events
            .iter()
            .any(|e| e.event_type == self.refuse_event_type)
        {
            return Err(EventStoreError::Concurrency(
                "stream changed underneath the workflow".to_string(),
            ));
        }
        self.inner.append(events, expected_version)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.inner.load_stream(tenant_id, aggregate_id)
    }
}

#[test]
fn failed_order_submit_releases_the_reservations_it_made() {
    let engine = WorkflowEngine::new(
        RefusingStore {
            inner: InMemoryEventStore::new(),
            refuse_event_type: "sales.order.submitted",
        },
        InMemoryEventBus::new(),
    );
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let (_, _, entry, warehouse) = warehoused_lot(&engine, tenant, product, 100);

    let order = SalesOrderId::new(AggregateId::new());
    engine
        .create_sales_order(CreateSalesOrder {
            tenant_id: tenant,
            order_id: order,
            customer: PartyId::new(AggregateId::new()),
            sales_type: SalesType::Credit,
            delivery_source: DeliverySource::Warehouse,
            currency: "PKR".to_string(),
            lines: vec![SalesOrderLineInput {
                product_id: product,
                uom: Unit::Ton,
                quantity: d(40),
                rate: d(150),
                batch: Some(BatchRef {
                    entry_id: entry,
                    line_index: 0,
                }),
                warehouse: Some(warehouse),
            }],
            occurred_at: Utc::now(),
        })
        .expect("create sales order");

    // Reservations are dispatched before the order submit; when the submit
    // append is refused they must be rolled back again.
    let err = engine.submit_sales_order(tenant, order).unwrap_err();
    match err {
        DispatchError::Concurrency(_) => {}
        other => panic!("Expected Concurrency error, got {other:?}"),
    }

    let lot = engine.load_stock_entry(tenant, entry).expect("load lot");
    assert_eq!(lot.total_reserved(), d(0));

    engine
        .with_ledger(tenant, |ledger| {
            let slot = ledger
                .slot(&warehouse_slot(product, warehouse, entry))
                .expect("warehouse slot");
            assert_eq!(slot.available, d(100));
            assert_eq!(slot.reserved, d(0));
        })
        .unwrap();
}

#[test]
fn fifo_blocks_newer_lots_while_an_older_one_still_has_stock() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let warehouse = WarehouseId::new(AggregateId::new());
    warehoused_lot_in(&engine, tenant, product, warehouse, 100);
    let (_, _, new_entry) = warehoused_lot_in(&engine, tenant, product, warehouse, 100);

    let order = SalesOrderId::new(AggregateId::new());
    engine
        .create_sales_order(CreateSalesOrder {
            tenant_id: tenant,
            order_id: order,
            customer: PartyId::new(AggregateId::new()),
            sales_type: SalesType::Credit,
            delivery_source: DeliverySource::Warehouse,
            currency: "PKR".to_string(),
            lines: vec![SalesOrderLineInput {
                product_id: product,
                uom: Unit::Ton,
                quantity: d(10),
                rate: d(150),
                batch: Some(BatchRef {
                    entry_id: new_entry,
                    line_index: 0,
                }),
                warehouse: Some(warehouse),
            }],
            occurred_at: Utc::now(),
        })
        .expect("create sales order");

    let err = engine.submit_sales_order(tenant, order).unwrap_err();
    match err {
        DispatchError::InvariantViolation(msg) => {
            assert!(msg.contains("FIFO"), "unexpected message: {msg}")
        }
        other => panic!("Expected InvariantViolation error, got {other:?}"),
    }
}

#[test]
fn fifo_can_be_disabled_by_policy() {
    let engine = engine_without_fifo();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let warehouse = WarehouseId::new(AggregateId::new());
    warehoused_lot_in(&engine, tenant, product, warehouse, 100);
    let (_, _, new_entry) = warehoused_lot_in(&engine, tenant, product, warehouse, 100);

    submitted_credit_order(&engine, tenant, product, new_entry, warehouse, 10, 150);
}

#[test]
fn cancelling_a_sales_order_releases_its_reservations() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let (_, _, entry, warehouse) = warehoused_lot(&engine, tenant, product, 100);
    let order = submitted_credit_order(&engine, tenant, product, entry, warehouse, 40, 150);

    engine
        .cancel_sales_order(tenant, order)
        .expect("cancel sales order");

    let lot = engine.load_stock_entry(tenant, entry).expect("load lot");
    assert_eq!(lot.total_reserved(), d(0));
    engine.with_ledger(tenant, |ledger| {
        assert_eq!(ledger.available_in_warehouse(product, warehouse), d(100));
    })
    .unwrap();
}

#[test]
fn invoicing_is_capped_at_the_outstanding_amount() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let (_, _, entry, warehouse) = warehoused_lot(&engine, tenant, product, 100);
    // 40 tons at 150 = 6000 total.
    let order = submitted_credit_order(&engine, tenant, product, entry, warehouse, 40, 150);

    let err = engine
        .issue_invoice(InvoiceRequest {
            tenant_id: tenant,
            invoice_id: InvoiceId::new(AggregateId::new()),
            order_id: order,
            amount: Some(d(7000)),
            invoice_date: day(2025, 3, 1),
            due_date: None,
        })
        .unwrap_err();
    match err {
        DispatchError::Validation(_) => {}
        other => panic!("Expected Validation error, got {other:?}"),
    }

    engine
        .issue_invoice(InvoiceRequest {
            tenant_id: tenant,
            invoice_id: InvoiceId::new(AggregateId::new()),
            order_id: order,
            amount: Some(d(4000)),
            invoice_date: day(2025, 3, 1),
            due_date: None,
        })
        .expect("partial invoice");

    let loaded = engine.load_sales_order(tenant, order).expect("load order");
    assert_eq!(loaded.invoiced_amount(), d(4000));
    assert!(!loaded.is_fully_invoiced());

    // `None` invoices the remaining 2000.
    engine
        .issue_invoice(InvoiceRequest {
            tenant_id: tenant,
            invoice_id: InvoiceId::new(AggregateId::new()),
            order_id: order,
            amount: None,
            invoice_date: day(2025, 3, 2),
            due_date: None,
        })
        .expect("closing invoice");
    let loaded = engine.load_sales_order(tenant, order).expect("load order");
    assert!(loaded.is_fully_invoiced());

    let err = engine
        .issue_invoice(InvoiceRequest {
            tenant_id: tenant,
            invoice_id: InvoiceId::new(AggregateId::new()),
            order_id: order,
            amount: None,
            invoice_date: day(2025, 3, 3),
            due_date: None,
        })
        .unwrap_err();
    match err {
        DispatchError::InvariantViolation(_) => {}
        other => panic!("Expected InvariantViolation error, got {other:?}"),
    }
}

#[test]
fn cancelling_an_invoice_rolls_invoicing_progress_back() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let (_, _, entry, warehouse) = warehoused_lot(&engine, tenant, product, 100);
    let order = submitted_credit_order(&engine, tenant, product, entry, warehouse, 40, 150);

    let invoice = InvoiceId::new(AggregateId::new());
    engine
        .issue_invoice(InvoiceRequest {
            tenant_id: tenant,
            invoice_id: invoice,
            order_id: order,
            amount: None,
            invoice_date: day(2025, 3, 1),
            due_date: None,
        })
        .expect("invoice");
    assert!(
        engine
            .load_sales_order(tenant, order)
            .expect("load order")
            .is_fully_invoiced()
    );

    engine
        .cancel_invoice(tenant, invoice)
        .expect("cancel invoice");

    let loaded = engine.load_sales_order(tenant, order).expect("load order");
    assert_eq!(loaded.invoiced_amount(), d(0));
    assert_eq!(loaded.latest_invoice(), None);
}

#[test]
fn gate_pass_requires_a_fully_invoiced_order() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let (_, _, entry, warehouse) = warehoused_lot(&engine, tenant, product, 100);
    let order = submitted_credit_order(&engine, tenant, product, entry, warehouse, 40, 150);

    let err = engine
        .create_gate_pass(GatePassRequest {
            tenant_id: tenant,
            gate_pass_id: GatePassId::new(AggregateId::new()),
            order_id: order,
            driver_name: "Rashid".to_string(),
            vehicle_number: "LES-4821".to_string(),
        })
        .unwrap_err();
    match err {
        DispatchError::InvariantViolation(_) => {}
        other => panic!("Expected InvariantViolation error, got {other:?}"),
    }
}

/// Drives an order through invoice and gate pass; returns the gate pass id.
fn readied_for_delivery(
    engine: &TestEngine,
    tenant: TenantId,
    order: SalesOrderId,
) -> GatePassId {
    engine
        .issue_invoice(InvoiceRequest {
            tenant_id: tenant,
            invoice_id: InvoiceId::new(AggregateId::new()),
            order_id: order,
            amount: None,
            invoice_date: day(2025, 3, 1),
            due_date: None,
        })
        .expect("invoice");
    let gate_pass = GatePassId::new(AggregateId::new());
    engine
        .create_gate_pass(GatePassRequest {
            tenant_id: tenant,
            gate_pass_id: gate_pass,
            order_id: order,
            driver_name: "Rashid".to_string(),
            vehicle_number: "LES-4821".to_string(),
        })
        .expect("gate pass");
    gate_pass
}

#[test]
fn delivery_issues_stock_and_closes_the_gate_pass() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let (_, _, entry, warehouse) = warehoused_lot(&engine, tenant, product, 100);
    let order = submitted_credit_order(&engine, tenant, product, entry, warehouse, 40, 150);
    let gate_pass = readied_for_delivery(&engine, tenant, order);

    assert_eq!(
        engine
            .load_sales_order(tenant, order)
            .expect("load order")
            .status(),
        OrderStatus::ReadyForDelivery
    );

    let note = DeliveryNoteId::new(AggregateId::new());
    engine
        .create_delivery_note(tenant, note, order, Some(day(2025, 3, 5)))
        .expect("create note");

    // Not until the gate pass is issued at the gate.
    let err = engine.submit_delivery_note(tenant, note).unwrap_err();
    match err {
        DispatchError::InvariantViolation(_) => {}
        other => panic!("Expected InvariantViolation error, got {other:?}"),
    }

    engine
        .issue_gate_pass(IssueGatePass {
            tenant_id: tenant,
            gate_pass_id: gate_pass,
            issued_on: day(2025, 3, 5),
            occurred_at: Utc::now(),
        })
        .expect("issue gate pass");
    engine
        .submit_delivery_note(tenant, note)
        .expect("submit note");

    let lot = engine.load_stock_entry(tenant, entry).expect("load lot");
    assert_eq!(lot.total_issued(), d(40));
    assert_eq!(lot.total_reserved(), d(0));

    engine.with_ledger(tenant, |ledger| {
        let slot = ledger
            .slot(&warehouse_slot(product, warehouse, entry))
            .expect("warehouse slot");
        assert_eq!(slot.available, d(60));
        assert_eq!(slot.reserved, d(0));
        assert_eq!(slot.issued, d(40));
    })
    .unwrap();

    assert_eq!(
        engine
            .load_sales_order(tenant, order)
            .expect("load order")
            .status(),
        OrderStatus::Completed
    );
    assert_eq!(
        engine
            .load_gate_pass(tenant, gate_pass)
            .expect("load gate pass")
            .status(),
        GatePassStatus::Closed
    );
}

#[test]
fn cancelling_a_dispatched_delivery_reverses_the_issues() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let (_, _, entry, warehouse) = warehoused_lot(&engine, tenant, product, 100);
    let order = submitted_credit_order(&engine, tenant, product, entry, warehouse, 40, 150);
    let gate_pass = readied_for_delivery(&engine, tenant, order);

    let note = DeliveryNoteId::new(AggregateId::new());
    engine
        .create_delivery_note(tenant, note, order, None)
        .expect("create note");
    engine
        .issue_gate_pass(IssueGatePass {
            tenant_id: tenant,
            gate_pass_id: gate_pass,
            issued_on: day(2025, 3, 5),
            occurred_at: Utc::now(),
        })
        .expect("issue gate pass");
    engine
        .submit_delivery_note(tenant, note)
        .expect("submit note");

    engine
        .cancel_delivery_note(tenant, note)
        .expect("cancel note");

    let lot = engine.load_stock_entry(tenant, entry).expect("load lot");
    assert_eq!(lot.total_issued(), d(0));
    assert_eq!(lot.total_reserved(), d(40));

    assert_eq!(
        engine
            .load_sales_order(tenant, order)
            .expect("load order")
            .status(),
        OrderStatus::ReadyForDelivery
    );
    assert_eq!(
        engine
            .load_gate_pass(tenant, gate_pass)
            .expect("load gate pass")
            .status(),
        GatePassStatus::Issued
    );
}

#[test]
fn loading_orders_follow_the_gate_pass() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let (_, _, entry, warehouse) = warehoused_lot(&engine, tenant, product, 100);
    let order = submitted_credit_order(&engine, tenant, product, entry, warehouse, 40, 150);

    // No gate pass yet.
    let loading = plasticflow_logistics::LoadingOrderId::new(AggregateId::new());
    let err = engine
        .create_loading_order(plasticflow_logistics::CreateLoadingOrder {
            tenant_id: tenant,
            loading_order_id: loading,
            sales_order: order,
            driver_name: "Rashid".to_string(),
            vehicle_plate: "LES-4821".to_string(),
            driver_phone: "0300-0000000".to_string(),
            destination: "Lahore".to_string(),
            occurred_at: Utc::now(),
        })
        .unwrap_err();
    match err {
        DispatchError::InvariantViolation(_) => {}
        other => panic!("Expected InvariantViolation error, got {other:?}"),
    }

    readied_for_delivery(&engine, tenant, order);
    engine
        .create_loading_order(plasticflow_logistics::CreateLoadingOrder {
            tenant_id: tenant,
            loading_order_id: loading,
            sales_order: order,
            driver_name: "Rashid".to_string(),
            vehicle_plate: "LES-4821".to_string(),
            driver_phone: "0300-0000000".to_string(),
            destination: "Lahore".to_string(),
            occurred_at: Utc::now(),
        })
        .expect("create loading order");
    engine
        .start_loading(plasticflow_logistics::StartLoading {
            tenant_id: tenant,
            loading_order_id: loading,
            occurred_at: Utc::now(),
        })
        .expect("start loading");
    engine
        .complete_loading(plasticflow_logistics::CompleteLoading {
            tenant_id: tenant,
            loading_order_id: loading,
            occurred_at: Utc::now(),
        })
        .expect("complete loading");

    let loaded = engine
        .dispatcher()
        .load(tenant, loading.0, |_, id| {
            plasticflow_logistics::LoadingOrder::empty(plasticflow_logistics::LoadingOrderId::new(
                id,
            ))
        })
        .expect("load loading order");
    assert_eq!(loaded.status(), LoadingStatus::Completed);
}

#[test]
fn negative_adjustment_draws_down_the_lot_and_ledger() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let (_, _, entry, warehouse) = warehoused_lot(&engine, tenant, product, 100);

    let adjustment = StockAdjustmentId::new(AggregateId::new());
    let allocations = engine
        .apply_stock_adjustment(AdjustmentRequest {
            tenant_id: tenant,
            adjustment_id: adjustment,
            product_id: product,
            location_kind: LocationKind::Warehouse,
            warehouse: Some(warehouse),
            quantity_delta: d(-30),
            posting_date: Some(day(2025, 4, 1)),
        })
        .expect("apply adjustment");
    assert_eq!(
        allocations.iter().map(|a| a.quantity_delta).sum::<Decimal>(),
        d(-30)
    );

    let lot = engine.load_stock_entry(tenant, entry).expect("load lot");
    assert_eq!(lot.total_received(), d(70));
    engine.with_ledger(tenant, |ledger| {
        assert_eq!(ledger.available_in_warehouse(product, warehouse), d(70));
    })
    .unwrap();

    engine
        .cancel_stock_adjustment(tenant, adjustment)
        .expect("cancel adjustment");
    let lot = engine.load_stock_entry(tenant, entry).expect("load lot");
    assert_eq!(lot.total_received(), d(100));
    engine.with_ledger(tenant, |ledger| {
        assert_eq!(ledger.available_in_warehouse(product, warehouse), d(100));
    })
    .unwrap();
}

#[test]
fn proforma_converts_into_a_draft_order_at_vat_inclusive_rates() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());

    let proforma = ProformaInvoiceId::new(AggregateId::new());
    engine
        .create_proforma_invoice(ProformaDraft {
            tenant_id: tenant,
            proforma_id: proforma,
            customer: PartyId::new(AggregateId::new()),
            currency: "PKR".to_string(),
            valid_until: Some(day(2025, 3, 31)),
            lines: vec![ProformaLineInput {
                product_id: product,
                uom: Unit::Ton,
                quantity: d(10),
                rate: d(100),
            }],
        })
        .expect("create proforma");
    engine
        .submit_proforma_invoice(tenant, proforma)
        .expect("submit proforma");

    let order_id = SalesOrderId::new(AggregateId::new());
    let order = engine
        .convert_proforma_invoice(ProformaConversion {
            tenant_id: tenant,
            proforma_id: proforma,
            order_id,
            sales_type: SalesType::Credit,
            delivery_source: DeliverySource::Warehouse,
        })
        .expect("convert proforma");

    let loaded = engine.load_sales_order(tenant, order).expect("load order");
    assert_eq!(loaded.status(), OrderStatus::Draft);
    assert_eq!(loaded.lines()[0].rate, d(115));
    assert_eq!(loaded.total_amount(), d(1150));

    let loaded_proforma = engine
        .load_proforma_invoice(tenant, proforma)
        .expect("load proforma");
    assert_eq!(loaded_proforma.status(), ProformaStatus::Converted);
    assert_eq!(loaded_proforma.sales_order(), Some(order.0));

    // A second conversion must not create another order.
    let err = engine
        .convert_proforma_invoice(ProformaConversion {
            tenant_id: tenant,
            proforma_id: proforma,
            order_id: SalesOrderId::new(AggregateId::new()),
            sales_type: SalesType::Credit,
            delivery_source: DeliverySource::Warehouse,
        })
        .unwrap_err();
    match err {
        DispatchError::Concurrency(_) => {}
        other => panic!("Expected Concurrency error, got {other:?}"),
    }
}

#[test]
fn draft_proformas_cannot_be_converted() {
    let engine = engine();
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());

    let proforma = ProformaInvoiceId::new(AggregateId::new());
    engine
        .create_proforma_invoice(ProformaDraft {
            tenant_id: tenant,
            proforma_id: proforma,
            customer: PartyId::new(AggregateId::new()),
            currency: "PKR".to_string(),
            valid_until: None,
            lines: vec![ProformaLineInput {
                product_id: product,
                uom: Unit::Ton,
                quantity: d(5),
                rate: d(200),
            }],
        })
        .expect("create proforma");

    let err = engine
        .convert_proforma_invoice(ProformaConversion {
            tenant_id: tenant,
            proforma_id: proforma,
            order_id: SalesOrderId::new(AggregateId::new()),
            sales_type: SalesType::Cash,
            delivery_source: DeliverySource::Warehouse,
        })
        .unwrap_err();
    match err {
        DispatchError::InvariantViolation(_) => {}
        other => panic!("Expected InvariantViolation error, got {other:?}"),
    }
}

#[test]
fn shipment_projection_rebuilds_from_the_event_store() {
    let store = std::sync::Arc::new(InMemoryEventStore::new());
    let engine = WorkflowEngine::new(store.clone(), InMemoryEventBus::new());
    let tenant = TenantId::new();
    let product = ProductId::new(AggregateId::new());
    let warehouse = WarehouseId::new(AggregateId::new());
    let po = submitted_po(&engine, tenant, product, 100, 500);

    let shipment = ImportShipmentId::new(AggregateId::new());
    engine
        .create_import_shipment(ShipmentDraft {
            tenant_id: tenant,
            shipment_id: shipment,
            purchase_order_id: po,
            shipment_date: Some(day(2025, 1, 20)),
            expected_arrival: Some(day(2025, 1, 25)),
            lines: vec![ShipmentDraftLine {
                po_line_index: 0,
                quantity: d(100),
            }],
        })
        .expect("draft shipment");
    engine
        .set_destination_warehouse(tenant, shipment, warehouse)
        .expect("set destination");
    engine
        .clear_shipment(tenant, shipment, day(2025, 2, 1))
        .expect("clear shipment");
    engine
        .mark_shipment_at_warehouse(tenant, shipment, None, day(2025, 2, 3))
        .expect("mark at warehouse");

    let projection = ImportShipmentsProjection::new(std::sync::Arc::new(
        InMemoryTenantStore::new(),
    ));
    let envelopes = store
        .all_events()
        .expect("read event store")
        .into_iter()
        .filter(|e| e.aggregate_type == aggregate_types::IMPORT_SHIPMENT)
        .map(|e| e.to_envelope());
    projection
        .rebuild_from_scratch(envelopes)
        .expect("rebuild projection");

    let row = projection.get(tenant, &shipment).expect("shipment row");
    assert_eq!(row.clearance_status, ClearanceStatus::AtWarehouse);
    assert_eq!(row.cleared_on, Some(day(2025, 2, 1)));
    assert_eq!(row.arrival_date, Some(day(2025, 2, 3)));

    // Cleared seven days after the expected arrival.
    assert_eq!(
        projection.average_clearance_days(tenant),
        Some(Decimal::new(70, 1))
    );
}
