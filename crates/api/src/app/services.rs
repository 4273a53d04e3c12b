use std::sync::Arc;

use serde_json::Value as JsonValue;

use plasticflow_events::{EventEnvelope, InMemoryEventBus};
use plasticflow_infra::{
    event_store::InMemoryEventStore,
    projections::{
        DailySalesProjection, DashboardQuery, EntryBalances, ImportShipmentsProjection,
        InvoiceRow, SalesOrderSummary, SalesOrdersProjection, ShipmentRow,
        StockBalanceProjection,
    },
    read_model::InMemoryTenantStore,
    workers::{ProjectionWorker, WorkerHandle},
    workflow::{aggregate_types, WorkflowEngine},
};
use plasticflow_inventory::StockEntryId;
use plasticflow_invoicing::InvoiceId;
use plasticflow_sales::SalesOrderId;
use plasticflow_shipping::ImportShipmentId;

pub type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Engine = WorkflowEngine<Arc<InMemoryEventStore>, Bus>;

type StockStore = Arc<InMemoryTenantStore<StockEntryId, EntryBalances>>;
type OrderStore = Arc<InMemoryTenantStore<SalesOrderId, SalesOrderSummary>>;
type InvoiceStore = Arc<InMemoryTenantStore<InvoiceId, InvoiceRow>>;
type ShipmentStore = Arc<InMemoryTenantStore<ImportShipmentId, ShipmentRow>>;

/// Shared application services: the workflow engine plus the read models the
/// query endpoints serve from.
///
/// Projections are updated by a background worker consuming the event bus, so
/// reads are eventually consistent with the command path.
pub struct AppServices {
    engine: Engine,
    stock: Arc<StockBalanceProjection<StockStore>>,
    sales_orders: Arc<SalesOrdersProjection<OrderStore>>,
    invoices: Arc<DailySalesProjection<InvoiceStore>>,
    shipments: Arc<ImportShipmentsProjection<ShipmentStore>>,
    dashboard: DashboardQuery<StockStore, OrderStore, InvoiceStore, ShipmentStore>,
    _worker: WorkerHandle,
}

impl AppServices {
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn stock(&self) -> &StockBalanceProjection<StockStore> {
        &self.stock
    }

    pub fn sales_orders(&self) -> &SalesOrdersProjection<OrderStore> {
        &self.sales_orders
    }

    pub fn invoices(&self) -> &DailySalesProjection<InvoiceStore> {
        &self.invoices
    }

    pub fn shipments(&self) -> &ImportShipmentsProjection<ShipmentStore> {
        &self.shipments
    }

    pub fn dashboard(&self) -> &DashboardQuery<StockStore, OrderStore, InvoiceStore, ShipmentStore> {
        &self.dashboard
    }
}

/// Wire up the in-memory stack: event store, bus, engine, projections, and the
/// projection worker feeding them.
pub fn build_services() -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    let engine = WorkflowEngine::new(store, bus.clone());

    let stock = Arc::new(StockBalanceProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let sales_orders = Arc::new(SalesOrdersProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let invoices = Arc::new(DailySalesProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let shipments = Arc::new(ImportShipmentsProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));

    let worker = {
        let stock = stock.clone();
        let sales_orders = sales_orders.clone();
        let invoices = invoices.clone();
        let shipments = shipments.clone();
        ProjectionWorker::spawn(
            "api.projections",
            bus.clone(),
            None,
            move |envelope: EventEnvelope<JsonValue>| match envelope.aggregate_type() {
                aggregate_types::STOCK_ENTRY => stock.apply_envelope(&envelope),
                aggregate_types::SALES_ORDER => sales_orders.apply_envelope(&envelope),
                aggregate_types::INVOICE => invoices.apply_envelope(&envelope),
                aggregate_types::IMPORT_SHIPMENT => shipments.apply_envelope(&envelope),
                _ => Ok(()),
            },
        )
    };

    let dashboard = DashboardQuery::new(
        stock.clone(),
        sales_orders.clone(),
        invoices.clone(),
        shipments.clone(),
    );

    AppServices {
        engine,
        stock,
        sales_orders,
        invoices,
        shipments,
        dashboard,
        _worker: worker,
    }
}
