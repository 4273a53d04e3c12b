use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use plasticflow_catalog::{Product, Unit, Warehouse};
use plasticflow_costing::{AllocationMethod, CostComponent, LandingCostWorksheet, ProfitAssumptions};
use plasticflow_infra::projections::{
    DailySalesRow, DashboardSummary, EntryBalances, InvoiceRow, SalesOrderSummary, StockBalanceRow,
};
use plasticflow_inventory::LocationKind;
use plasticflow_logistics::{DeliveryNote, GatePass, LoadingOrder};
use plasticflow_parties::{ContactInfo, Party, PartyKind};
use plasticflow_purchasing::PurchaseOrder;
use plasticflow_sales::{DeliverySource, ProformaInvoice, SalesType};
use plasticflow_shipping::ImportShipment;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterPartyRequest {
    pub kind: PartyKind,
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub tax_id: Option<String>,
    #[serde(default)]
    pub credit_approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePartyRequest {
    pub name: Option<String>,
    pub contact: Option<ContactInfo>,
    pub tax_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuspendPartyRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub item_code: String,
    pub name: String,
    pub uom: Unit,
}

#[derive(Debug, Deserialize)]
pub struct CreateWarehouseRequest {
    pub name: String,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseOrderLineRequest {
    pub product_id: String,
    pub uom: Unit,
    pub quantity: Decimal,
    pub rate: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseOrderRequest {
    pub supplier_id: String,
    pub purchase_currency: String,
    pub local_currency: String,
    pub exchange_rate: Option<Decimal>,
    pub order_date: NaiveDate,
    pub expected_shipment: Option<NaiveDate>,
    pub lines: Vec<PurchaseOrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ShipmentLineRequest {
    pub po_line_index: usize,
    pub quantity: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateShipmentRequest {
    pub purchase_order_id: String,
    pub shipment_date: Option<NaiveDate>,
    pub expected_arrival: Option<NaiveDate>,
    pub lines: Vec<ShipmentLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct SetDestinationRequest {
    pub warehouse_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ClearShipmentRequest {
    pub cleared_on: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AtWarehouseRequest {
    pub warehouse_id: Option<String>,
    pub arrival_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct CreateWorksheetRequest {
    pub shipment_id: String,
    pub allocation_method: AllocationMethod,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWorksheetRequest {
    pub components: Vec<CostComponent>,
    pub assumptions: Option<ProfitAssumptions>,
}

#[derive(Debug, Deserialize)]
pub struct SalesOrderLineRequest {
    pub product_id: String,
    pub uom: Unit,
    pub quantity: Decimal,
    pub rate: Decimal,
    /// Pins the line to a specific stock entry line (FIFO still applies).
    pub entry_id: Option<String>,
    pub line_index: Option<usize>,
    pub warehouse_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSalesOrderRequest {
    pub customer_id: String,
    pub sales_type: SalesType,
    pub delivery_source: DeliverySource,
    pub currency: String,
    pub lines: Vec<SalesOrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ProformaLineRequest {
    pub product_id: String,
    pub uom: Unit,
    pub quantity: Decimal,
    /// Net rate; VAT is derived on top.
    pub rate: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateProformaRequest {
    pub customer_id: String,
    pub currency: String,
    pub valid_until: Option<NaiveDate>,
    pub lines: Vec<ProformaLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ConvertProformaRequest {
    pub sales_type: SalesType,
    pub delivery_source: DeliverySource,
}

#[derive(Debug, Deserialize)]
pub struct PaymentSlipRequest {
    pub reference: String,
    pub amount_paid: Decimal,
    pub paid_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct IssueInvoiceRequest {
    pub sales_order_id: String,
    /// Partial invoice amount; omit to invoice the outstanding remainder.
    pub amount: Option<Decimal>,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateGatePassRequest {
    pub sales_order_id: String,
    pub driver_name: String,
    pub vehicle_number: String,
}

#[derive(Debug, Deserialize)]
pub struct IssueGatePassRequest {
    pub issued_on: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct CreateLoadingOrderRequest {
    pub sales_order_id: String,
    pub driver_name: String,
    pub vehicle_plate: String,
    pub driver_phone: String,
    pub destination: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateDeliveryNoteRequest {
    pub sales_order_id: String,
    pub delivery_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmDeliveryRequest {
    pub delivered_on: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustmentRequest {
    pub product_id: String,
    pub location: LocationKind,
    pub warehouse_id: Option<String>,
    pub quantity_delta: Decimal,
    pub posting_date: Option<NaiveDate>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn party_to_json(party: &Party) -> serde_json::Value {
    json!({
        "id": party.id_typed().to_string(),
        "kind": party.kind(),
        "name": party.name(),
        "contact": party.contact(),
        "tax_id": party.tax_id(),
        "credit_approved": party.credit_approved(),
        "status": party.status(),
    })
}

pub fn product_to_json(product: &Product) -> serde_json::Value {
    json!({
        "id": product.id_typed().to_string(),
        "item_code": product.item_code(),
        "name": product.name(),
        "uom": product.uom(),
        "status": product.status(),
    })
}

pub fn warehouse_to_json(warehouse: &Warehouse) -> serde_json::Value {
    json!({
        "id": warehouse.id_typed().to_string(),
        "name": warehouse.name(),
        "location": warehouse.location(),
    })
}

pub fn purchase_order_to_json(po: &PurchaseOrder) -> serde_json::Value {
    json!({
        "id": po.id_typed().to_string(),
        "supplier_id": po.supplier_id().map(|s| s.to_string()),
        "status": po.status(),
        "purchase_currency": po.purchase_currency(),
        "local_currency": po.local_currency(),
        "exchange_rate": po.exchange_rate(),
        "expected_shipment": po.expected_shipment(),
        "total_quantity": po.total_quantity(),
        "total_amount": po.total_amount(),
        "total_amount_local": po.total_amount_local(),
        "lines": po.lines().iter().map(|l| json!({
            "product_id": l.product_id.to_string(),
            "uom": l.uom,
            "quantity": l.quantity,
            "rate": l.rate,
            "amount": l.amount,
            "received_qty": l.received_qty,
            "pending_qty": l.pending_qty(),
        })).collect::<Vec<_>>(),
    })
}

pub fn shipment_to_json(shipment: &ImportShipment) -> serde_json::Value {
    json!({
        "id": shipment.id_typed().to_string(),
        "purchase_order_id": shipment.purchase_order_id().map(|p| p.to_string()),
        "supplier_id": shipment.supplier_id().map(|s| s.to_string()),
        "currency": shipment.currency(),
        "local_currency": shipment.local_currency(),
        "exchange_rate": shipment.exchange_rate(),
        "clearance_status": shipment.clearance_status(),
        "cleared_on": shipment.cleared_on(),
        "arrival_date": shipment.arrival_date(),
        "destination_warehouse": shipment.destination_warehouse().map(|w| w.to_string()),
        "landed_costs_locked": shipment.landed_costs_locked(),
        "total_quantity": shipment.total_quantity(),
        "total_shipment_amount": shipment.total_shipment_amount(),
        "total_landed_cost": shipment.total_landed_cost(),
        "total_landed_cost_local": shipment.total_landed_cost_local(),
        "items": shipment.items().iter().map(|i| json!({
            "po_line_index": i.po_line_index,
            "product_id": i.product_id.to_string(),
            "uom": i.uom,
            "quantity": i.quantity,
            "base_rate": i.base_rate,
            "base_amount": i.base_amount,
            "landed_cost_amount": i.landed_cost_amount,
            "landed_cost_amount_local": i.landed_cost_amount_local,
        })).collect::<Vec<_>>(),
    })
}

pub fn worksheet_to_json(worksheet: &LandingCostWorksheet) -> serde_json::Value {
    json!({
        "id": worksheet.id_typed().to_string(),
        "shipment_id": worksheet.shipment_id().map(|s| s.to_string()),
        "status": worksheet.status(),
        "locked_on": worksheet.locked_on(),
        "components": worksheet.components(),
        "breakdown": worksheet.breakdown(),
    })
}

pub fn entry_balances_to_json(entry: &EntryBalances) -> serde_json::Value {
    json!({
        "id": entry.entry_id.to_string(),
        "shipment_id": entry.shipment_id.to_string(),
        "warehouse": entry.warehouse.map(|w| w.to_string()),
        "at_warehouse": entry.at_warehouse,
        "lines": entry.lines.iter().map(|l| json!({
            "line_index": l.line_index,
            "product_id": l.product_id.to_string(),
            "uom": l.uom,
            "received_qty": l.received_qty,
            "reserved_qty": l.reserved_qty,
            "issued_qty": l.issued_qty,
            "available_qty": l.available_qty(),
            "landed_cost_rate_local": l.landed_cost_rate_local,
        })).collect::<Vec<_>>(),
    })
}

pub fn stock_balance_row_to_json(row: &StockBalanceRow) -> serde_json::Value {
    json!({
        "entry_id": row.entry_id.to_string(),
        "line_index": row.line_index,
        "shipment_id": row.shipment_id.to_string(),
        "product_id": row.product_id.to_string(),
        "uom": row.uom,
        "warehouse": row.warehouse.map(|w| w.to_string()),
        "at_customs": row.at_customs,
        "received_qty": row.received_qty,
        "reserved_qty": row.reserved_qty,
        "issued_qty": row.issued_qty,
        "available_qty": row.available_qty,
        "stock_value": row.stock_value,
    })
}

pub fn sales_order_summary_to_json(order: &SalesOrderSummary) -> serde_json::Value {
    json!({
        "id": order.order_id.to_string(),
        "customer_id": order.customer.to_string(),
        "sales_type": order.sales_type,
        "currency": order.currency,
        "status": order.status,
        "total_quantity": order.total_quantity,
        "total_amount": order.total_amount,
        "paid_amount": order.paid_amount,
        "invoiced_amount": order.invoiced_amount,
        "outstanding_amount": order.outstanding_amount,
        "updated_at": order.updated_at,
    })
}

pub fn proforma_to_json(proforma: &ProformaInvoice) -> serde_json::Value {
    json!({
        "id": proforma.id_typed().to_string(),
        "customer": proforma.customer().map(|c| c.to_string()),
        "currency": proforma.currency(),
        "valid_until": proforma.valid_until(),
        "status": proforma.status(),
        "sales_order": proforma.sales_order().map(|o| o.to_string()),
        "total_quantity": proforma.total_quantity(),
        "total_amount": proforma.total_amount(),
        "total_vat": proforma.total_vat(),
        "total_gross_amount": proforma.total_gross_amount(),
        "lines": proforma.lines().iter().map(|l| json!({
            "product_id": l.product_id.to_string(),
            "uom": l.uom,
            "quantity": l.quantity,
            "rate": l.rate,
            "amount": l.amount,
            "vat_amount": l.vat_amount,
            "gross_amount": l.gross_amount,
        })).collect::<Vec<_>>(),
    })
}

pub fn invoice_row_to_json(invoice: &InvoiceRow) -> serde_json::Value {
    json!({
        "id": invoice.invoice_id.to_string(),
        "sales_order_id": invoice.sales_order.to_string(),
        "customer_id": invoice.customer.to_string(),
        "invoice_type": invoice.invoice_type,
        "currency": invoice.currency,
        "invoice_date": invoice.invoice_date,
        "due_date": invoice.due_date,
        "total_amount": invoice.total_amount,
        "paid_amount": invoice.paid_amount,
        "outstanding_amount": invoice.outstanding_amount,
        "status": invoice.status,
    })
}

pub fn gate_pass_to_json(gate_pass: &GatePass) -> serde_json::Value {
    json!({
        "id": gate_pass.id_typed().to_string(),
        "sales_order_id": gate_pass.sales_order().map(|o| o.to_string()),
        "invoice_id": gate_pass.invoice().map(|i| i.to_string()),
        "status": gate_pass.status(),
        "lines": gate_pass.lines().iter().map(|l| json!({
            "product_id": l.product_id.to_string(),
            "uom": l.uom,
            "quantity": l.quantity,
            "warehouse": l.warehouse.map(|w| w.to_string()),
        })).collect::<Vec<_>>(),
    })
}

pub fn loading_order_to_json(order: &LoadingOrder) -> serde_json::Value {
    json!({
        "id": order.id_typed().to_string(),
        "sales_order_id": order.sales_order().map(|o| o.to_string()),
        "status": order.status(),
    })
}

pub fn delivery_note_to_json(note: &DeliveryNote) -> serde_json::Value {
    json!({
        "id": note.id_typed().to_string(),
        "sales_order_id": note.sales_order().map(|o| o.to_string()),
        "gate_pass_id": note.gate_pass().map(|g| g.to_string()),
        "status": note.status(),
        "lines": note.lines().iter().map(|l| json!({
            "product_id": l.product_id.to_string(),
            "uom": l.uom,
            "quantity": l.quantity,
            "warehouse": l.warehouse.map(|w| w.to_string()),
        })).collect::<Vec<_>>(),
    })
}

pub fn daily_sales_row_to_json(row: &DailySalesRow) -> serde_json::Value {
    json!({
        "date": row.date,
        "invoiced_total": row.invoiced_total,
        "invoice_count": row.invoice_count,
    })
}

pub fn dashboard_to_json(summary: &DashboardSummary) -> serde_json::Value {
    json!({
        "stock_on_hand_qty": summary.stock_on_hand_qty,
        "stock_on_hand_value": summary.stock_on_hand_value,
        "stock_at_customs_qty": summary.stock_at_customs_qty,
        "stock_at_customs_value": summary.stock_at_customs_value,
        "open_order_count": summary.open_order_count,
        "open_order_value": summary.open_order_value,
        "ready_for_delivery_count": summary.ready_for_delivery_count,
        "outstanding_receivables": summary.outstanding_receivables,
        "invoiced_today": summary.invoiced_today,
        "avg_clearance_days": summary.avg_clearance_days,
    })
}
