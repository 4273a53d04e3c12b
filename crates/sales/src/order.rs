//! Sales order aggregate: order capture through payment, invoicing, and
//! delivery readiness.
//!
//! Cash orders reconcile payment slips against the order total (tolerance
//! 0.01) and move PaymentPending -> PaymentVerified automatically; credit
//! orders skip slip reconciliation. Stock availability and FIFO checks run in
//! the workflow layer against the ledger read model before submit is
//! dispatched; the aggregate owns the status machine.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plasticflow_catalog::{ProductId, Unit, WarehouseId};
use plasticflow_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, PAYMENT_TOLERANCE, TenantId, approx_eq,
    clamp_non_negative,
};
use plasticflow_events::Event;
use plasticflow_inventory::StockEntryId;
use plasticflow_parties::PartyId;

/// Sales order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalesOrderId(pub AggregateId);

impl SalesOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SalesOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesType {
    Cash,
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverySource {
    Warehouse,
    DirectFromCustoms,
}

/// Order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    PaymentPending,
    PaymentVerified,
    CreditSales,
    Invoiced,
    ReadyForDelivery,
    Completed,
    Cancelled,
}

/// Reference to the lot line a sales order line reserves against.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchRef {
    pub entry_id: StockEntryId,
    pub line_index: usize,
}

/// One order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderLine {
    pub product_id: ProductId,
    pub uom: Unit,
    pub quantity: Decimal,
    pub rate: Decimal,
    /// quantity * rate.
    pub amount: Decimal,
    pub batch: Option<BatchRef>,
    pub warehouse: Option<WarehouseId>,
}

/// Input line for `CreateSalesOrder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderLineInput {
    pub product_id: ProductId,
    pub uom: Unit,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub batch: Option<BatchRef>,
    pub warehouse: Option<WarehouseId>,
}

/// One payment slip attached to a cash order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSlip {
    pub reference: String,
    pub amount_paid: Decimal,
    pub paid_on: Option<NaiveDate>,
}

/// Aggregate root: SalesOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrder {
    id: SalesOrderId,
    tenant_id: Option<TenantId>,
    customer: Option<PartyId>,
    sales_type: SalesType,
    delivery_source: DeliverySource,
    currency: String,
    lines: Vec<SalesOrderLine>,
    payment_slips: Vec<PaymentSlip>,
    invoiced_amount: Decimal,
    latest_invoice: Option<AggregateId>,
    gate_pass: Option<AggregateId>,
    status: OrderStatus,
    version: u64,
    created: bool,
}

impl SalesOrder {
    pub fn empty(id: SalesOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            customer: None,
            sales_type: SalesType::Cash,
            delivery_source: DeliverySource::Warehouse,
            currency: String::new(),
            lines: Vec::new(),
            payment_slips: Vec::new(),
            invoiced_amount: Decimal::ZERO,
            latest_invoice: None,
            gate_pass: None,
            status: OrderStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SalesOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn customer(&self) -> Option<PartyId> {
        self.customer
    }

    pub fn sales_type(&self) -> SalesType {
        self.sales_type
    }

    pub fn delivery_source(&self) -> DeliverySource {
        self.delivery_source
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn lines(&self) -> &[SalesOrderLine] {
        &self.lines
    }

    pub fn payment_slips(&self) -> &[PaymentSlip] {
        &self.payment_slips
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn gate_pass(&self) -> Option<AggregateId> {
        self.gate_pass
    }

    pub fn latest_invoice(&self) -> Option<AggregateId> {
        self.latest_invoice
    }

    pub fn total_quantity(&self) -> Decimal {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn total_amount(&self) -> Decimal {
        self.lines.iter().map(|l| l.amount).sum()
    }

    pub fn total_paid(&self) -> Decimal {
        self.payment_slips.iter().map(|s| s.amount_paid).sum()
    }

    pub fn invoiced_amount(&self) -> Decimal {
        self.invoiced_amount
    }

    pub fn outstanding_amount(&self) -> Decimal {
        clamp_non_negative(self.total_amount() - self.invoiced_amount)
    }

    pub fn is_fully_invoiced(&self) -> bool {
        self.outstanding_amount() <= PAYMENT_TOLERANCE
    }

    pub fn is_submitted(&self) -> bool {
        self.created && !matches!(self.status, OrderStatus::Draft | OrderStatus::Cancelled)
    }

    /// Batch reservations this order holds: (batch ref, quantity) per line
    /// that references a lot.
    pub fn batch_reservations(&self) -> Vec<(BatchRef, Decimal)> {
        self.lines
            .iter()
            .filter_map(|line| line.batch.map(|batch| (batch, line.quantity)))
            .collect()
    }

    /// Payment-derived status for a submitted order that is not yet fully
    /// invoiced.
    fn payment_status(&self) -> OrderStatus {
        match self.sales_type {
            SalesType::Credit => OrderStatus::CreditSales,
            SalesType::Cash => {
                let total = self.total_amount();
                if total <= PAYMENT_TOLERANCE {
                    return OrderStatus::PaymentVerified;
                }
                if !self.payment_slips.is_empty()
                    && approx_eq(self.total_paid(), total, PAYMENT_TOLERANCE)
                {
                    OrderStatus::PaymentVerified
                } else {
                    OrderStatus::PaymentPending
                }
            }
        }
    }
}

impl AggregateRoot for SalesOrder {
    type Id = SalesOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateSalesOrder (draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSalesOrder {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub customer: PartyId,
    pub sales_type: SalesType,
    pub delivery_source: DeliverySource,
    pub currency: String,
    pub lines: Vec<SalesOrderLineInput>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddPaymentSlip (cash orders).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPaymentSlip {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub slip: PaymentSlip,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitSalesOrder.
///
/// The workflow layer runs the availability and FIFO checks and applies the
/// reservations before dispatching this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitSalesOrder {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordInvoicingProgress (absolute invoiced total).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInvoicingProgress {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub invoiced_amount: Decimal,
    pub latest_invoice: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AttachGatePass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachGatePass {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub gate_pass: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteDelivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteDelivery {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseDelivery (delivery note cancelled).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseDelivery {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelSalesOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSalesOrder {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderCommand {
    CreateSalesOrder(CreateSalesOrder),
    AddPaymentSlip(AddPaymentSlip),
    SubmitSalesOrder(SubmitSalesOrder),
    RecordInvoicingProgress(RecordInvoicingProgress),
    AttachGatePass(AttachGatePass),
    CompleteDelivery(CompleteDelivery),
    ReverseDelivery(ReverseDelivery),
    CancelSalesOrder(CancelSalesOrder),
}

/// Event: SalesOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderCreated {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub customer: PartyId,
    pub sales_type: SalesType,
    pub delivery_source: DeliverySource,
    pub currency: String,
    pub lines: Vec<SalesOrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentSlipAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSlipAdded {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub slip: PaymentSlip,
    pub new_status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SalesOrderSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderSubmitted {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub new_status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoicingProgressRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicingProgressRecorded {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub invoiced_amount: Decimal,
    pub outstanding_amount: Decimal,
    pub latest_invoice: Option<AggregateId>,
    pub new_status: OrderStatus,
    /// Set when the progress update dropped the order out of
    /// ReadyForDelivery and detached its gate pass.
    pub gate_pass_cleared: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GatePassAttached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePassAttached {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub gate_pass: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryCompleted {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryReversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReversed {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SalesOrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderCancelled {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    /// Reservations to release, for the workflow layer and projections.
    pub released_reservations: Vec<(BatchRef, Decimal)>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderEvent {
    SalesOrderCreated(SalesOrderCreated),
    PaymentSlipAdded(PaymentSlipAdded),
    SalesOrderSubmitted(SalesOrderSubmitted),
    InvoicingProgressRecorded(InvoicingProgressRecorded),
    GatePassAttached(GatePassAttached),
    DeliveryCompleted(DeliveryCompleted),
    DeliveryReversed(DeliveryReversed),
    SalesOrderCancelled(SalesOrderCancelled),
}

impl Event for SalesOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SalesOrderEvent::SalesOrderCreated(_) => "sales.order.created",
            SalesOrderEvent::PaymentSlipAdded(_) => "sales.order.payment_slip_added",
            SalesOrderEvent::SalesOrderSubmitted(_) => "sales.order.submitted",
            SalesOrderEvent::InvoicingProgressRecorded(_) => "sales.order.invoicing_progress",
            SalesOrderEvent::GatePassAttached(_) => "sales.order.gate_pass_attached",
            SalesOrderEvent::DeliveryCompleted(_) => "sales.order.delivery_completed",
            SalesOrderEvent::DeliveryReversed(_) => "sales.order.delivery_reversed",
            SalesOrderEvent::SalesOrderCancelled(_) => "sales.order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SalesOrderEvent::SalesOrderCreated(e) => e.occurred_at,
            SalesOrderEvent::PaymentSlipAdded(e) => e.occurred_at,
            SalesOrderEvent::SalesOrderSubmitted(e) => e.occurred_at,
            SalesOrderEvent::InvoicingProgressRecorded(e) => e.occurred_at,
            SalesOrderEvent::GatePassAttached(e) => e.occurred_at,
            SalesOrderEvent::DeliveryCompleted(e) => e.occurred_at,
            SalesOrderEvent::DeliveryReversed(e) => e.occurred_at,
            SalesOrderEvent::SalesOrderCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SalesOrder {
    type Command = SalesOrderCommand;
    type Event = SalesOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SalesOrderEvent::SalesOrderCreated(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.customer = Some(e.customer);
                self.sales_type = e.sales_type;
                self.delivery_source = e.delivery_source;
                self.currency = e.currency.clone();
                self.lines = e.lines.clone();
                self.status = OrderStatus::Draft;
                self.created = true;
            }
            SalesOrderEvent::PaymentSlipAdded(e) => {
                self.payment_slips.push(e.slip.clone());
                self.status = e.new_status;
            }
            SalesOrderEvent::SalesOrderSubmitted(e) => {
                self.status = e.new_status;
            }
            SalesOrderEvent::InvoicingProgressRecorded(e) => {
                self.invoiced_amount = e.invoiced_amount;
                self.latest_invoice = e.latest_invoice;
                if e.gate_pass_cleared {
                    self.gate_pass = None;
                }
                self.status = e.new_status;
            }
            SalesOrderEvent::GatePassAttached(e) => {
                self.gate_pass = Some(e.gate_pass);
                self.status = OrderStatus::ReadyForDelivery;
            }
            SalesOrderEvent::DeliveryCompleted(_) => {
                self.status = OrderStatus::Completed;
            }
            SalesOrderEvent::DeliveryReversed(_) => {
                self.status = OrderStatus::ReadyForDelivery;
            }
            SalesOrderEvent::SalesOrderCancelled(_) => {
                self.status = OrderStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SalesOrderCommand::CreateSalesOrder(cmd) => self.handle_create(cmd),
            SalesOrderCommand::AddPaymentSlip(cmd) => self.handle_add_slip(cmd),
            SalesOrderCommand::SubmitSalesOrder(cmd) => self.handle_submit(cmd),
            SalesOrderCommand::RecordInvoicingProgress(cmd) => self.handle_progress(cmd),
            SalesOrderCommand::AttachGatePass(cmd) => self.handle_attach_gate_pass(cmd),
            SalesOrderCommand::CompleteDelivery(cmd) => self.handle_complete(cmd),
            SalesOrderCommand::ReverseDelivery(cmd) => self.handle_reverse_delivery(cmd),
            SalesOrderCommand::CancelSalesOrder(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl SalesOrder {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: SalesOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_not_cancelled(&self) -> Result<(), DomainError> {
        if self.status == OrderStatus::Cancelled {
            return Err(DomainError::invariant("sales order is cancelled"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateSalesOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sales order already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("sales order needs at least one line"));
        }
        let currency = cmd.currency.trim().to_uppercase();
        if currency.is_empty() {
            return Err(DomainError::validation("currency cannot be empty"));
        }

        let mut lines = Vec::with_capacity(cmd.lines.len());
        for input in &cmd.lines {
            if input.quantity <= Decimal::ZERO {
                return Err(DomainError::validation("line quantities must be positive"));
            }
            if input.rate < Decimal::ZERO {
                return Err(DomainError::validation("line rates cannot be negative"));
            }
            if cmd.delivery_source == DeliverySource::Warehouse
                && input.batch.is_some()
                && input.warehouse.is_none()
            {
                return Err(DomainError::validation(
                    "warehouse reservations must name the warehouse",
                ));
            }
            lines.push(SalesOrderLine {
                product_id: input.product_id,
                uom: input.uom.clone(),
                quantity: input.quantity,
                rate: input.rate,
                amount: input.quantity * input.rate,
                batch: input.batch,
                warehouse: input.warehouse,
            });
        }

        Ok(vec![SalesOrderEvent::SalesOrderCreated(SalesOrderCreated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            customer: cmd.customer,
            sales_type: cmd.sales_type,
            delivery_source: cmd.delivery_source,
            currency,
            lines,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_slip(&self, cmd: &AddPaymentSlip) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_not_cancelled()?;

        if self.sales_type != SalesType::Cash {
            return Err(DomainError::invariant(
                "payment slips only apply to cash sales orders",
            ));
        }
        if cmd.slip.amount_paid <= Decimal::ZERO {
            return Err(DomainError::validation("slip amount must be positive"));
        }
        if cmd.slip.reference.trim().is_empty() {
            return Err(DomainError::validation("slip reference cannot be empty"));
        }

        let total = self.total_amount();
        let paid_after = self.total_paid() + cmd.slip.amount_paid;
        if paid_after - total > PAYMENT_TOLERANCE {
            return Err(DomainError::invariant(format!(
                "total payment {paid_after} cannot exceed the order total {total}"
            )));
        }

        let mut preview = self.clone();
        preview.payment_slips.push(cmd.slip.clone());
        // Draft orders keep their status; submitted cash orders re-derive it.
        let new_status = match self.status {
            OrderStatus::Draft => OrderStatus::Draft,
            OrderStatus::PaymentPending | OrderStatus::PaymentVerified => preview.payment_status(),
            other => other,
        };

        Ok(vec![SalesOrderEvent::PaymentSlipAdded(PaymentSlipAdded {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            slip: cmd.slip.clone(),
            new_status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitSalesOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;

        if self.status != OrderStatus::Draft {
            return Err(DomainError::conflict("only draft sales orders can be submitted"));
        }

        Ok(vec![SalesOrderEvent::SalesOrderSubmitted(SalesOrderSubmitted {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            new_status: self.payment_status(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_progress(
        &self,
        cmd: &RecordInvoicingProgress,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_not_cancelled()?;

        if !self.is_submitted() {
            return Err(DomainError::invariant(
                "submit the sales order before invoicing it",
            ));
        }
        if cmd.invoiced_amount < Decimal::ZERO {
            return Err(DomainError::validation("invoiced amount cannot be negative"));
        }

        let outstanding = clamp_non_negative(self.total_amount() - cmd.invoiced_amount);
        let mut gate_pass_cleared = false;
        let new_status = if outstanding <= PAYMENT_TOLERANCE {
            match self.status {
                OrderStatus::ReadyForDelivery | OrderStatus::Completed => self.status,
                _ => OrderStatus::Invoiced,
            }
        } else {
            // An invoice was cancelled: fall back to the payment-derived
            // status and detach any gate pass.
            if self.status == OrderStatus::ReadyForDelivery {
                gate_pass_cleared = true;
            }
            match self.status {
                OrderStatus::Completed => OrderStatus::Completed,
                _ => self.payment_status(),
            }
        };

        Ok(vec![SalesOrderEvent::InvoicingProgressRecorded(
            InvoicingProgressRecorded {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                invoiced_amount: cmd.invoiced_amount,
                outstanding_amount: outstanding,
                latest_invoice: cmd.latest_invoice,
                new_status,
                gate_pass_cleared,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_attach_gate_pass(
        &self,
        cmd: &AttachGatePass,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_not_cancelled()?;

        if !self.is_submitted() {
            return Err(DomainError::invariant(
                "submit the sales order before generating a gate pass",
            ));
        }
        if !self.is_fully_invoiced() {
            return Err(DomainError::invariant(format!(
                "invoice the full value before generating a gate pass; outstanding {}",
                self.outstanding_amount()
            )));
        }
        if self.gate_pass.is_some() {
            return Err(DomainError::conflict("a gate pass is already attached"));
        }

        Ok(vec![SalesOrderEvent::GatePassAttached(GatePassAttached {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            gate_pass: cmd.gate_pass,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteDelivery) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;

        if self.status != OrderStatus::ReadyForDelivery {
            return Err(DomainError::invariant(
                "only orders ready for delivery can be completed",
            ));
        }

        Ok(vec![SalesOrderEvent::DeliveryCompleted(DeliveryCompleted {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse_delivery(
        &self,
        cmd: &ReverseDelivery,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;

        if self.status != OrderStatus::Completed {
            return Err(DomainError::invariant("only completed orders can be reopened"));
        }

        Ok(vec![SalesOrderEvent::DeliveryReversed(DeliveryReversed {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelSalesOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.order_id)?;

        match self.status {
            OrderStatus::Cancelled => {
                return Err(DomainError::conflict("sales order is already cancelled"));
            }
            OrderStatus::Completed => {
                return Err(DomainError::invariant(
                    "completed sales orders cannot be cancelled",
                ));
            }
            _ => {}
        }

        let released_reservations = if self.is_submitted() {
            self.batch_reservations()
        } else {
            Vec::new()
        };

        Ok(vec![SalesOrderEvent::SalesOrderCancelled(SalesOrderCancelled {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            released_reservations,
            occurred_at: cmd.occurred_at,
        })])
    }
}
