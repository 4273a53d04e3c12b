//! Invoice aggregate.
//!
//! Invoices are issued against a submitted sales order for at most its
//! outstanding amount; the workflow layer builds the proportional lines and
//! verifies the cap against the order before dispatching `IssueInvoice`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plasticflow_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, PAYMENT_TOLERANCE, TenantId,
    clamp_non_negative,
};
use plasticflow_events::Event;
use plasticflow_parties::PartyId;
use plasticflow_sales::{SalesOrderId, SalesType};

use crate::lines::InvoiceLine;

/// Invoice identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Cancelled,
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    tenant_id: Option<TenantId>,
    sales_order: Option<SalesOrderId>,
    customer: Option<PartyId>,
    invoice_type: SalesType,
    currency: String,
    invoice_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    lines: Vec<InvoiceLine>,
    paid_amount: Decimal,
    status: InvoiceStatus,
    version: u64,
    created: bool,
}

impl Invoice {
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            tenant_id: None,
            sales_order: None,
            customer: None,
            invoice_type: SalesType::Cash,
            currency: String::new(),
            invoice_date: None,
            due_date: None,
            lines: Vec::new(),
            paid_amount: Decimal::ZERO,
            status: InvoiceStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn sales_order(&self) -> Option<SalesOrderId> {
        self.sales_order
    }

    pub fn invoice_type(&self) -> SalesType {
        self.invoice_type
    }

    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn total_amount(&self) -> Decimal {
        self.lines.iter().map(|l| l.amount).sum()
    }

    pub fn paid_amount(&self) -> Decimal {
        self.paid_amount
    }

    pub fn outstanding_amount(&self) -> Decimal {
        clamp_non_negative(self.total_amount() - self.paid_amount)
    }

    pub fn is_active(&self) -> bool {
        self.created && self.status != InvoiceStatus::Cancelled
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: IssueInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub sales_order: SalesOrderId,
    pub customer: PartyId,
    /// Must match the order's sales type; the workflow layer checks this
    /// against the order before dispatch.
    pub invoice_type: SalesType,
    pub currency: String,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub lines: Vec<InvoiceLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordInvoicePayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInvoicePayment {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    IssueInvoice(IssueInvoice),
    RecordInvoicePayment(RecordInvoicePayment),
    CancelInvoice(CancelInvoice),
}

/// Event: InvoiceIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub sales_order: SalesOrderId,
    pub customer: PartyId,
    pub invoice_type: SalesType,
    pub currency: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub lines: Vec<InvoiceLine>,
    pub total_amount: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoicePaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePaymentRecorded {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub outstanding_amount: Decimal,
    pub new_status: InvoiceStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCancelled {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub sales_order: Option<SalesOrderId>,
    /// Amount the order's invoicing progress must give back.
    pub reverted_amount: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceIssued(InvoiceIssued),
    InvoicePaymentRecorded(InvoicePaymentRecorded),
    InvoiceCancelled(InvoiceCancelled),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceIssued(_) => "invoicing.invoice.issued",
            InvoiceEvent::InvoicePaymentRecorded(_) => "invoicing.invoice.payment_recorded",
            InvoiceEvent::InvoiceCancelled(_) => "invoicing.invoice.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceIssued(e) => e.occurred_at,
            InvoiceEvent::InvoicePaymentRecorded(e) => e.occurred_at,
            InvoiceEvent::InvoiceCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceIssued(e) => {
                self.id = e.invoice_id;
                self.tenant_id = Some(e.tenant_id);
                self.sales_order = Some(e.sales_order);
                self.customer = Some(e.customer);
                self.invoice_type = e.invoice_type;
                self.currency = e.currency.clone();
                self.invoice_date = Some(e.invoice_date);
                self.due_date = Some(e.due_date);
                self.lines = e.lines.clone();
                self.status = InvoiceStatus::Pending;
                self.created = true;
            }
            InvoiceEvent::InvoicePaymentRecorded(e) => {
                self.paid_amount += e.amount;
                self.status = e.new_status;
            }
            InvoiceEvent::InvoiceCancelled(_) => {
                self.status = InvoiceStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::IssueInvoice(cmd) => self.handle_issue(cmd),
            InvoiceCommand::RecordInvoicePayment(cmd) => self.handle_payment(cmd),
            InvoiceCommand::CancelInvoice(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Invoice {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_invoice_id(&self, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if self.id != invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }
        Ok(())
    }

    fn handle_issue(&self, cmd: &IssueInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("invoice needs at least one line"));
        }
        let currency = cmd.currency.trim().to_uppercase();
        if currency.is_empty() {
            return Err(DomainError::validation("currency cannot be empty"));
        }
        let total_amount: Decimal = cmd.lines.iter().map(|l| l.amount).sum();
        if total_amount <= Decimal::ZERO {
            return Err(DomainError::validation("invoice total must be positive"));
        }

        Ok(vec![InvoiceEvent::InvoiceIssued(InvoiceIssued {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            sales_order: cmd.sales_order,
            customer: cmd.customer,
            invoice_type: cmd.invoice_type,
            currency,
            invoice_date: cmd.invoice_date,
            due_date: cmd.due_date.unwrap_or(cmd.invoice_date),
            lines: cmd.lines.clone(),
            total_amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_payment(
        &self,
        cmd: &RecordInvoicePayment,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        match self.status {
            InvoiceStatus::Pending => {}
            InvoiceStatus::Paid => {
                return Err(DomainError::conflict("invoice is already paid"));
            }
            InvoiceStatus::Cancelled => {
                return Err(DomainError::invariant("invoice is cancelled"));
            }
        }
        if cmd.amount <= Decimal::ZERO {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        let outstanding = self.outstanding_amount();
        if cmd.amount - outstanding > PAYMENT_TOLERANCE {
            return Err(DomainError::invariant(format!(
                "payment {} exceeds the outstanding amount {outstanding}",
                cmd.amount
            )));
        }

        let outstanding_after = clamp_non_negative(outstanding - cmd.amount);
        let new_status = if outstanding_after <= PAYMENT_TOLERANCE {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::Pending
        };

        Ok(vec![InvoiceEvent::InvoicePaymentRecorded(InvoicePaymentRecorded {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            amount: cmd.amount,
            outstanding_amount: outstanding_after,
            new_status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.status == InvoiceStatus::Cancelled {
            return Err(DomainError::conflict("invoice is already cancelled"));
        }

        Ok(vec![InvoiceEvent::InvoiceCancelled(InvoiceCancelled {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            sales_order: self.sales_order,
            reverted_amount: self.total_amount(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plasticflow_catalog::{ProductId, Unit};

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_invoice_id() -> InvoiceId {
        InvoiceId::new(AggregateId::new())
    }

    fn invoice_line(quantity: i64, rate: i64) -> InvoiceLine {
        InvoiceLine {
            product_id: ProductId::new(AggregateId::new()),
            uom: Unit::Ton,
            quantity: Decimal::new(quantity, 0),
            rate: Decimal::new(rate, 0),
            amount: Decimal::new(quantity * rate, 0),
        }
    }

    fn issued_invoice(tenant_id: TenantId, invoice_id: InvoiceId) -> Invoice {
        let mut invoice = Invoice::empty(invoice_id);
        let events = invoice
            .handle(&InvoiceCommand::IssueInvoice(IssueInvoice {
                tenant_id,
                invoice_id,
                sales_order: SalesOrderId::new(AggregateId::new()),
                customer: PartyId::new(AggregateId::new()),
                invoice_type: SalesType::Credit,
                currency: "BDT".to_string(),
                invoice_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                due_date: None,
                lines: vec![invoice_line(10, 100_000)],
                occurred_at: Utc::now(),
            }))
            .unwrap();
        invoice.apply(&events[0]);
        invoice
    }

    #[test]
    fn issue_computes_totals_and_defaults_the_due_date() {
        let invoice = issued_invoice(test_tenant_id(), test_invoice_id());
        assert_eq!(invoice.status(), InvoiceStatus::Pending);
        assert_eq!(invoice.total_amount(), Decimal::new(1_000_000, 0));
        assert_eq!(invoice.outstanding_amount(), Decimal::new(1_000_000, 0));
        assert_eq!(invoice.due_date, NaiveDate::from_ymd_opt(2025, 3, 1));
    }

    #[test]
    fn payments_reduce_outstanding_until_paid() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let mut invoice = issued_invoice(tenant_id, invoice_id);

        let events = invoice
            .handle(&InvoiceCommand::RecordInvoicePayment(RecordInvoicePayment {
                tenant_id,
                invoice_id,
                amount: Decimal::new(400_000, 0),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        invoice.apply(&events[0]);
        assert_eq!(invoice.status(), InvoiceStatus::Pending);
        assert_eq!(invoice.outstanding_amount(), Decimal::new(600_000, 0));

        let events = invoice
            .handle(&InvoiceCommand::RecordInvoicePayment(RecordInvoicePayment {
                tenant_id,
                invoice_id,
                amount: Decimal::new(600_000, 0),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        invoice.apply(&events[0]);
        assert_eq!(invoice.status(), InvoiceStatus::Paid);
        assert_eq!(invoice.outstanding_amount(), Decimal::ZERO);
    }

    #[test]
    fn overpayment_is_rejected() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let invoice = issued_invoice(tenant_id, invoice_id);

        let err = invoice
            .handle(&InvoiceCommand::RecordInvoicePayment(RecordInvoicePayment {
                tenant_id,
                invoice_id,
                amount: Decimal::new(1_000_001, 0),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation error for overpayment"),
        }
    }

    #[test]
    fn cancel_reports_the_amount_to_revert() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let mut invoice = issued_invoice(tenant_id, invoice_id);

        let events = invoice
            .handle(&InvoiceCommand::CancelInvoice(CancelInvoice {
                tenant_id,
                invoice_id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        match &events[0] {
            InvoiceEvent::InvoiceCancelled(e) => {
                assert_eq!(e.reverted_amount, Decimal::new(1_000_000, 0));
                assert!(e.sales_order.is_some());
            }
            _ => panic!("Expected InvoiceCancelled event"),
        }
        invoice.apply(&events[0]);

        let err = invoice
            .handle(&InvoiceCommand::RecordInvoicePayment(RecordInvoicePayment {
                tenant_id,
                invoice_id,
                amount: Decimal::ONE,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation error for payment on cancelled invoice"),
        }
    }
}
