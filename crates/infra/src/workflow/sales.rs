//! Sales workflow: order submission with availability and FIFO checks,
//! invoicing against the outstanding balance, and the gate pass / loading
//! order paperwork that readies an order for delivery.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tracing::warn;

use plasticflow_core::{Aggregate, PAYMENT_TOLERANCE, QTY_TOLERANCE, TenantId, clamp_non_negative};
use plasticflow_events::{EventBus, EventEnvelope};
use plasticflow_inventory::{
    ReleaseStock, ReserveStock, StockEntry, StockEntryCommand, StockEntryId, ensure_fifo,
};
use plasticflow_invoicing::{
    CancelInvoice, Invoice, InvoiceCommand, InvoiceId, IssueInvoice, RecordInvoicePayment,
    build_invoice_lines,
};
use plasticflow_logistics::{
    CancelGatePass, CancelLoadingOrder, CompleteLoading, CreateGatePass, CreateLoadingOrder,
    GatePass, GatePassCommand, GatePassId, GatePassLine, IssueGatePass, LoadingOrder,
    LoadingOrderCommand, LoadingOrderId, StartLoading,
};
use plasticflow_sales::{
    AddPaymentSlip, AttachGatePass, BatchRef, CancelSalesOrder, CreateSalesOrder, DeliverySource,
    OrderStatus, RecordInvoicingProgress, SalesOrder, SalesOrderCancelled, SalesOrderCommand,
    SalesOrderEvent, SalesOrderId, SubmitSalesOrder,
};

use super::{WorkflowEngine, aggregate_types, lot_slot};
use crate::command_dispatcher::DispatchError;
use crate::event_store::{EventStore, StoredEvent};

/// Request to issue an invoice against a sales order.
///
/// `amount` of `None` invoices the full outstanding balance.
#[derive(Debug, Clone)]
pub struct InvoiceRequest {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub order_id: SalesOrderId,
    pub amount: Option<Decimal>,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
}

/// Request to create a gate pass for a fully invoiced order.
#[derive(Debug, Clone)]
pub struct GatePassRequest {
    pub tenant_id: TenantId,
    pub gate_pass_id: GatePassId,
    pub order_id: SalesOrderId,
    pub driver_name: String,
    pub vehicle_number: String,
}

impl<S, B> WorkflowEngine<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub(crate) fn load_sales_order(
        &self,
        tenant_id: TenantId,
        order_id: SalesOrderId,
    ) -> Result<SalesOrder, DispatchError> {
        self.dispatcher()
            .load(tenant_id, order_id.0, |_, id| {
                SalesOrder::empty(SalesOrderId::new(id))
            })
    }

    pub(crate) fn load_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Invoice, DispatchError> {
        self.dispatcher()
            .load(tenant_id, invoice_id.0, |_, id| {
                Invoice::empty(InvoiceId::new(id))
            })
    }

    pub(crate) fn load_gate_pass(
        &self,
        tenant_id: TenantId,
        gate_pass_id: GatePassId,
    ) -> Result<GatePass, DispatchError> {
        self.dispatcher()
            .load(tenant_id, gate_pass_id.0, |_, id| {
                GatePass::empty(GatePassId::new(id))
            })
    }

    pub fn create_sales_order(
        &self,
        cmd: CreateSalesOrder,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            cmd.tenant_id,
            cmd.order_id.0,
            aggregate_types::SALES_ORDER,
            SalesOrderCommand::CreateSalesOrder(cmd.clone()),
            |_, id| SalesOrder::empty(SalesOrderId::new(id)),
        )
    }

    pub fn add_payment_slip(&self, cmd: AddPaymentSlip) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            cmd.tenant_id,
            cmd.order_id.0,
            aggregate_types::SALES_ORDER,
            SalesOrderCommand::AddPaymentSlip(cmd.clone()),
            |_, id| SalesOrder::empty(SalesOrderId::new(id)),
        )
    }

    /// Submit a sales order, reserving every batch-pinned line.
    ///
    /// Availability and FIFO are checked across all warehoused lots before
    /// any reservation is made. If the final order submit still fails (a
    /// concurrent writer can touch the order after the pre-check), the
    /// reservations made here are released again before the error returns.
    pub fn submit_sales_order(
        &self,
        tenant_id: TenantId,
        order_id: SalesOrderId,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let order = self.load_sales_order(tenant_id, order_id)?;
        let now = Utc::now();

        // Run the aggregate's own submit rules first (pure, on a loaded
        // copy) so reservations are never made for a doomed submit.
        order
            .handle(&SalesOrderCommand::SubmitSalesOrder(SubmitSalesOrder {
                tenant_id,
                order_id,
                occurred_at: now,
            }))
            .map_err(DispatchError::from)?;

        let batches = self.batch_summaries(tenant_id)?;
        let mut reservations: Vec<(BatchRef, Decimal, StockEntry)> = Vec::new();
        for line in order.lines() {
            let Some(batch) = line.batch else { continue };
            let entry = self.load_stock_entry(tenant_id, batch.entry_id)?;
            let item = entry.items().get(batch.line_index).ok_or_else(|| {
                DispatchError::Validation(format!(
                    "order line references unknown lot line {}",
                    batch.line_index
                ))
            })?;
            if item.product_id != line.product_id {
                return Err(DispatchError::Validation(
                    "order line product does not match the pinned lot line".to_string(),
                ));
            }
            if line.quantity > item.available_qty() + QTY_TOLERANCE {
                return Err(DispatchError::InvariantViolation(format!(
                    "insufficient stock on lot {}: requested {}, available {}",
                    batch.entry_id,
                    line.quantity,
                    item.available_qty()
                )));
            }

            if entry.is_at_warehouse() && order.delivery_source() == DeliverySource::Warehouse {
                if let Some(candidate) = batches
                    .iter()
                    .find(|b| b.entry_id == batch.entry_id && b.product_id == line.product_id)
                {
                    ensure_fifo(self.fifo_policy(), candidate, &batches)
                        .map_err(DispatchError::from)?;
                }
            }
            reservations.push((batch, line.quantity, entry));
        }

        for (batch, quantity, entry) in &reservations {
            self.dispatcher().dispatch(
                tenant_id,
                batch.entry_id.0,
                aggregate_types::STOCK_ENTRY,
                StockEntryCommand::ReserveStock(ReserveStock {
                    tenant_id,
                    entry_id: batch.entry_id,
                    line_index: batch.line_index,
                    quantity: *quantity,
                    occurred_at: now,
                }),
                |_, id| StockEntry::empty(StockEntryId::new(id)),
            )?;
            let item = &entry.items()[batch.line_index];
            let slot = lot_slot(entry, item.product_id)?;
            self.mutate_ledger(tenant_id, |ledger| ledger.reserve(slot, *quantity, now))?;
        }

        match self.dispatcher().dispatch(
            tenant_id,
            order_id.0,
            aggregate_types::SALES_ORDER,
            SalesOrderCommand::SubmitSalesOrder(SubmitSalesOrder {
                tenant_id,
                order_id,
                occurred_at: now,
            }),
            |_, id| SalesOrder::empty(SalesOrderId::new(id)),
        ) {
            Ok(committed) => Ok(committed),
            Err(err) => {
                // The order did not submit, so nothing may stay reserved on
                // its behalf.
                self.release_failed_submit(tenant_id, &reservations, now);
                Err(err)
            }
        }
    }

    fn release_failed_submit(
        &self,
        tenant_id: TenantId,
        reservations: &[(BatchRef, Decimal, StockEntry)],
        now: chrono::DateTime<Utc>,
    ) {
        for (batch, quantity, entry) in reservations {
            let released = self.dispatcher().dispatch(
                tenant_id,
                batch.entry_id.0,
                aggregate_types::STOCK_ENTRY,
                StockEntryCommand::ReleaseStock(ReleaseStock {
                    tenant_id,
                    entry_id: batch.entry_id,
                    line_index: batch.line_index,
                    quantity: *quantity,
                    occurred_at: now,
                }),
                |_, id| StockEntry::empty(StockEntryId::new(id)),
            );
            if let Err(release_err) = released {
                warn!(
                    %tenant_id,
                    entry_id = %batch.entry_id,
                    error = %release_err,
                    "failed to release a reservation after a failed order submit"
                );
                continue;
            }
            let item = &entry.items()[batch.line_index];
            let rolled_back = lot_slot(entry, item.product_id).and_then(|slot| {
                self.mutate_ledger(tenant_id, |ledger| ledger.release(slot, *quantity, now))
            });
            if let Err(ledger_err) = rolled_back {
                warn!(
                    %tenant_id,
                    entry_id = %batch.entry_id,
                    error = %ledger_err,
                    "failed to release a ledger reservation after a failed order submit"
                );
            }
        }
    }

    /// Issue an invoice capped at the order's outstanding amount, with lines
    /// scaled proportionally from the order lines.
    pub fn issue_invoice(&self, req: InvoiceRequest) -> Result<Vec<StoredEvent>, DispatchError> {
        let order = self.load_sales_order(req.tenant_id, req.order_id)?;
        if !order.is_submitted() {
            return Err(DispatchError::InvariantViolation(
                "invoices can only be issued against a submitted sales order".to_string(),
            ));
        }
        let outstanding = order.outstanding_amount();
        if outstanding <= PAYMENT_TOLERANCE {
            return Err(DispatchError::InvariantViolation(
                "sales order is already fully invoiced".to_string(),
            ));
        }
        let amount = req.amount.unwrap_or(outstanding);
        if amount > outstanding + PAYMENT_TOLERANCE {
            return Err(DispatchError::Validation(format!(
                "invoice amount {amount} exceeds the outstanding {outstanding}"
            )));
        }

        let lines = build_invoice_lines(order.lines(), amount).map_err(DispatchError::from)?;
        let customer = order.customer().ok_or(DispatchError::NotFound)?;
        let now = Utc::now();

        let committed = self.dispatcher().dispatch(
            req.tenant_id,
            req.invoice_id.0,
            aggregate_types::INVOICE,
            InvoiceCommand::IssueInvoice(IssueInvoice {
                tenant_id: req.tenant_id,
                invoice_id: req.invoice_id,
                sales_order: req.order_id,
                customer,
                invoice_type: order.sales_type(),
                currency: order.currency().to_string(),
                invoice_date: req.invoice_date,
                due_date: req.due_date,
                lines,
                occurred_at: now,
            }),
            |_, id| Invoice::empty(InvoiceId::new(id)),
        )?;

        self.dispatcher().dispatch(
            req.tenant_id,
            req.order_id.0,
            aggregate_types::SALES_ORDER,
            SalesOrderCommand::RecordInvoicingProgress(RecordInvoicingProgress {
                tenant_id: req.tenant_id,
                order_id: req.order_id,
                invoiced_amount: order.invoiced_amount() + amount,
                latest_invoice: Some(req.invoice_id.0),
                occurred_at: now,
            }),
            |_, id| SalesOrder::empty(SalesOrderId::new(id)),
        )?;
        Ok(committed)
    }

    pub fn record_invoice_payment(
        &self,
        cmd: RecordInvoicePayment,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            cmd.tenant_id,
            cmd.invoice_id.0,
            aggregate_types::INVOICE,
            InvoiceCommand::RecordInvoicePayment(cmd.clone()),
            |_, id| Invoice::empty(InvoiceId::new(id)),
        )
    }

    /// Cancel an invoice and roll the order's invoicing progress back.
    ///
    /// If the order had reached ready-for-delivery on the strength of this
    /// invoice, its gate pass is cancelled too.
    pub fn cancel_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<(), DispatchError> {
        let invoice = self.load_invoice(tenant_id, invoice_id)?;
        let total = invoice.total_amount();
        let order_id = invoice.sales_order();
        let now = Utc::now();

        self.dispatcher().dispatch(
            tenant_id,
            invoice_id.0,
            aggregate_types::INVOICE,
            InvoiceCommand::CancelInvoice(CancelInvoice {
                tenant_id,
                invoice_id,
                occurred_at: now,
            }),
            |_, id| Invoice::empty(InvoiceId::new(id)),
        )?;

        let Some(order_id) = order_id else {
            return Ok(());
        };
        let order = self.load_sales_order(tenant_id, order_id)?;
        let gate_pass = order.gate_pass();
        let new_invoiced = clamp_non_negative(order.invoiced_amount() - total);
        self.dispatcher().dispatch(
            tenant_id,
            order_id.0,
            aggregate_types::SALES_ORDER,
            SalesOrderCommand::RecordInvoicingProgress(RecordInvoicingProgress {
                tenant_id,
                order_id,
                invoiced_amount: new_invoiced,
                latest_invoice: None,
                occurred_at: now,
            }),
            |_, id| SalesOrder::empty(SalesOrderId::new(id)),
        )?;

        let dropped_out = order.total_amount() - new_invoiced > PAYMENT_TOLERANCE;
        if let Some(gp) = gate_pass {
            if dropped_out && order.status() == OrderStatus::ReadyForDelivery {
                self.dispatcher().dispatch(
                    tenant_id,
                    gp,
                    aggregate_types::GATE_PASS,
                    GatePassCommand::CancelGatePass(CancelGatePass {
                        tenant_id,
                        gate_pass_id: GatePassId::new(gp),
                        occurred_at: now,
                    }),
                    |_, id| GatePass::empty(GatePassId::new(id)),
                )?;
            }
        }
        Ok(())
    }

    /// Create a gate pass for a fully invoiced order and attach it.
    pub fn create_gate_pass(&self, req: GatePassRequest) -> Result<Vec<StoredEvent>, DispatchError> {
        let order = self.load_sales_order(req.tenant_id, req.order_id)?;
        if !order.is_fully_invoiced() || !order.is_submitted() {
            return Err(DispatchError::InvariantViolation(
                "sales order must be fully invoiced before a gate pass is created".to_string(),
            ));
        }
        if order.gate_pass().is_some() {
            return Err(DispatchError::InvariantViolation(
                "sales order already has a gate pass".to_string(),
            ));
        }
        let invoice = order
            .latest_invoice()
            .ok_or(DispatchError::NotFound)
            .map(InvoiceId::new)?;
        let customer = order.customer().ok_or(DispatchError::NotFound)?;
        let now = Utc::now();

        let lines: Vec<GatePassLine> = order
            .lines()
            .iter()
            .map(|l| GatePassLine {
                product_id: l.product_id,
                uom: l.uom.clone(),
                quantity: l.quantity,
                batch: l.batch,
                warehouse: l.warehouse,
            })
            .collect();

        let committed = self.dispatcher().dispatch(
            req.tenant_id,
            req.gate_pass_id.0,
            aggregate_types::GATE_PASS,
            GatePassCommand::CreateGatePass(CreateGatePass {
                tenant_id: req.tenant_id,
                gate_pass_id: req.gate_pass_id,
                sales_order: req.order_id,
                invoice,
                customer,
                driver_name: req.driver_name.clone(),
                vehicle_number: req.vehicle_number.clone(),
                lines,
                occurred_at: now,
            }),
            |_, id| GatePass::empty(GatePassId::new(id)),
        )?;

        self.dispatcher().dispatch(
            req.tenant_id,
            req.order_id.0,
            aggregate_types::SALES_ORDER,
            SalesOrderCommand::AttachGatePass(AttachGatePass {
                tenant_id: req.tenant_id,
                order_id: req.order_id,
                gate_pass: req.gate_pass_id.0,
                occurred_at: now,
            }),
            |_, id| SalesOrder::empty(SalesOrderId::new(id)),
        )?;
        Ok(committed)
    }

    pub fn issue_gate_pass(&self, cmd: IssueGatePass) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            cmd.tenant_id,
            cmd.gate_pass_id.0,
            aggregate_types::GATE_PASS,
            GatePassCommand::IssueGatePass(cmd.clone()),
            |_, id| GatePass::empty(GatePassId::new(id)),
        )
    }

    pub fn create_loading_order(
        &self,
        cmd: CreateLoadingOrder,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let order = self.load_sales_order(cmd.tenant_id, cmd.sales_order)?;
        if order.gate_pass().is_none() {
            return Err(DispatchError::InvariantViolation(
                "attach a gate pass before creating a loading order".to_string(),
            ));
        }
        self.dispatcher().dispatch(
            cmd.tenant_id,
            cmd.loading_order_id.0,
            aggregate_types::LOADING_ORDER,
            LoadingOrderCommand::CreateLoadingOrder(cmd.clone()),
            |_, id| LoadingOrder::empty(LoadingOrderId::new(id)),
        )
    }

    pub fn start_loading(&self, cmd: StartLoading) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            cmd.tenant_id,
            cmd.loading_order_id.0,
            aggregate_types::LOADING_ORDER,
            LoadingOrderCommand::StartLoading(cmd.clone()),
            |_, id| LoadingOrder::empty(LoadingOrderId::new(id)),
        )
    }

    /// Complete loading, provided the order's gate pass still stands.
    pub fn complete_loading(
        &self,
        cmd: CompleteLoading,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let loading = self
            .dispatcher()
            .load(cmd.tenant_id, cmd.loading_order_id.0, |_, id| {
                LoadingOrder::empty(LoadingOrderId::new(id))
            })?;
        let order_id = loading.sales_order().ok_or(DispatchError::NotFound)?;
        let order = self.load_sales_order(cmd.tenant_id, order_id)?;
        if order.gate_pass().is_none() {
            return Err(DispatchError::InvariantViolation(
                "sales order has no gate pass; loading cannot complete".to_string(),
            ));
        }
        self.dispatcher().dispatch(
            cmd.tenant_id,
            cmd.loading_order_id.0,
            aggregate_types::LOADING_ORDER,
            LoadingOrderCommand::CompleteLoading(cmd.clone()),
            |_, id| LoadingOrder::empty(LoadingOrderId::new(id)),
        )
    }

    pub fn cancel_loading_order(
        &self,
        cmd: CancelLoadingOrder,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            cmd.tenant_id,
            cmd.loading_order_id.0,
            aggregate_types::LOADING_ORDER,
            LoadingOrderCommand::CancelLoadingOrder(cmd.clone()),
            |_, id| LoadingOrder::empty(LoadingOrderId::new(id)),
        )
    }

    /// Cancel a sales order and release every reservation it held.
    pub fn cancel_sales_order(
        &self,
        tenant_id: TenantId,
        order_id: SalesOrderId,
    ) -> Result<(), DispatchError> {
        let now = Utc::now();
        let committed = self.dispatcher().dispatch(
            tenant_id,
            order_id.0,
            aggregate_types::SALES_ORDER,
            SalesOrderCommand::CancelSalesOrder(CancelSalesOrder {
                tenant_id,
                order_id,
                occurred_at: now,
            }),
            |_, id| SalesOrder::empty(SalesOrderId::new(id)),
        )?;

        for released in committed
            .iter()
            .filter_map(|stored| {
                serde_json::from_value::<SalesOrderEvent>(stored.payload.clone()).ok()
            })
            .filter_map(|event| match event {
                SalesOrderEvent::SalesOrderCancelled(SalesOrderCancelled {
                    released_reservations,
                    ..
                }) => Some(released_reservations),
                _ => None,
            })
        {
            for (batch, quantity) in released {
                self.dispatcher().dispatch(
                    tenant_id,
                    batch.entry_id.0,
                    aggregate_types::STOCK_ENTRY,
                    StockEntryCommand::ReleaseStock(ReleaseStock {
                        tenant_id,
                        entry_id: batch.entry_id,
                        line_index: batch.line_index,
                        quantity,
                        occurred_at: now,
                    }),
                    |_, id| StockEntry::empty(StockEntryId::new(id)),
                )?;
                let entry = self.load_stock_entry(tenant_id, batch.entry_id)?;
                let item = entry.items().get(batch.line_index).cloned();
                if let Some(item) = item {
                    let slot = lot_slot(&entry, item.product_id)?;
                    self.mutate_ledger(tenant_id, |ledger| ledger.release(slot, quantity, now))?;
                }
            }
        }
        Ok(())
    }
}
