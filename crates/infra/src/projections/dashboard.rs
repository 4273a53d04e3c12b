//! Dashboard summary composed from the other read models.
//!
//! No event consumption of its own: every number here is a query over the
//! stock balance, sales order, invoice, and shipment projections.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use plasticflow_core::TenantId;
use plasticflow_inventory::StockEntryId;
use plasticflow_invoicing::InvoiceId;
use plasticflow_sales::{OrderStatus, SalesOrderId};
use plasticflow_shipping::ImportShipmentId;

use super::daily_sales::{DailySalesProjection, InvoiceRow};
use super::import_shipments::{ImportShipmentsProjection, ShipmentRow};
use super::sales_orders::{SalesOrderSummary, SalesOrdersProjection};
use super::stock_balance::{EntryBalances, StockBalanceProjection};
use crate::read_model::TenantStore;

/// Headline numbers for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSummary {
    pub stock_on_hand_qty: Decimal,
    pub stock_on_hand_value: Decimal,
    pub stock_at_customs_qty: Decimal,
    pub stock_at_customs_value: Decimal,
    pub open_order_count: usize,
    pub open_order_value: Decimal,
    pub ready_for_delivery_count: usize,
    pub outstanding_receivables: Decimal,
    pub invoiced_today: Decimal,
    /// Average days from expected arrival to customs clearance, one decimal
    /// place. `None` until a shipment has cleared with both dates known.
    pub avg_clearance_days: Option<Decimal>,
}

pub struct DashboardQuery<S1, S2, S3, S4>
where
    S1: TenantStore<StockEntryId, EntryBalances>,
    S2: TenantStore<SalesOrderId, SalesOrderSummary>,
    S3: TenantStore<InvoiceId, InvoiceRow>,
    S4: TenantStore<ImportShipmentId, ShipmentRow>,
{
    stock: Arc<StockBalanceProjection<S1>>,
    orders: Arc<SalesOrdersProjection<S2>>,
    invoices: Arc<DailySalesProjection<S3>>,
    shipments: Arc<ImportShipmentsProjection<S4>>,
}

impl<S1, S2, S3, S4> DashboardQuery<S1, S2, S3, S4>
where
    S1: TenantStore<StockEntryId, EntryBalances>,
    S2: TenantStore<SalesOrderId, SalesOrderSummary>,
    S3: TenantStore<InvoiceId, InvoiceRow>,
    S4: TenantStore<ImportShipmentId, ShipmentRow>,
{
    pub fn new(
        stock: Arc<StockBalanceProjection<S1>>,
        orders: Arc<SalesOrdersProjection<S2>>,
        invoices: Arc<DailySalesProjection<S3>>,
        shipments: Arc<ImportShipmentsProjection<S4>>,
    ) -> Self {
        Self {
            stock,
            orders,
            invoices,
            shipments,
        }
    }

    pub fn summarize(&self, tenant_id: TenantId, today: NaiveDate) -> DashboardSummary {
        let (stock_on_hand_qty, stock_on_hand_value) = self.stock.on_hand_totals(tenant_id);
        let (stock_at_customs_qty, stock_at_customs_value) =
            self.stock.at_customs_totals(tenant_id);

        let open = self.orders.open_orders(tenant_id);
        let open_order_value = open.iter().map(|o| o.total_amount).sum();
        let ready_for_delivery_count = open
            .iter()
            .filter(|o| o.status == OrderStatus::ReadyForDelivery)
            .count();

        let invoiced_today = self
            .invoices
            .daily_sales(tenant_id, today, today)
            .into_iter()
            .map(|d| d.invoiced_total)
            .sum();

        DashboardSummary {
            stock_on_hand_qty,
            stock_on_hand_value,
            stock_at_customs_qty,
            stock_at_customs_value,
            open_order_count: open.len(),
            open_order_value,
            ready_for_delivery_count,
            outstanding_receivables: self.invoices.outstanding_receivables(tenant_id),
            invoiced_today,
            avg_clearance_days: self.shipments.average_clearance_days(tenant_id),
        }
    }
}
