//! Proforma invoice aggregate: a VAT-bearing quotation that can be converted
//! into a draft sales order.
//!
//! Line amounts are net of VAT; each line also carries its VAT (at the flat
//! 15% rate) and gross amount. Conversion produces sales order lines at the
//! VAT-inclusive rate, without lot pinning: reservations happen when the
//! resulting order is submitted.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plasticflow_catalog::{ProductId, Unit};
use plasticflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use plasticflow_events::Event;
use plasticflow_parties::PartyId;

use crate::order::SalesOrderLineInput;

/// Flat VAT rate applied to every proforma line: 15%.
pub const VAT_RATE_BP: (i64, u32) = (15, 2);

fn vat_rate() -> Decimal {
    Decimal::new(VAT_RATE_BP.0, VAT_RATE_BP.1)
}

/// Proforma invoice identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProformaInvoiceId(pub AggregateId);

impl ProformaInvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProformaInvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Proforma lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProformaStatus {
    Draft,
    Submitted,
    Converted,
    Cancelled,
}

/// One quoted line with its derived VAT split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProformaLine {
    pub product_id: ProductId,
    pub uom: Unit,
    pub quantity: Decimal,
    /// Net rate, before VAT.
    pub rate: Decimal,
    /// quantity * rate.
    pub amount: Decimal,
    /// amount * 15%.
    pub vat_amount: Decimal,
    /// amount + vat_amount.
    pub gross_amount: Decimal,
}

/// Input line for `CreateProformaInvoice`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProformaLineInput {
    pub product_id: ProductId,
    pub uom: Unit,
    pub quantity: Decimal,
    pub rate: Decimal,
}

/// Aggregate root: ProformaInvoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProformaInvoice {
    id: ProformaInvoiceId,
    tenant_id: Option<TenantId>,
    customer: Option<PartyId>,
    currency: String,
    valid_until: Option<NaiveDate>,
    lines: Vec<ProformaLine>,
    sales_order: Option<AggregateId>,
    status: ProformaStatus,
    version: u64,
    created: bool,
}

impl ProformaInvoice {
    pub fn empty(id: ProformaInvoiceId) -> Self {
        Self {
            id,
            tenant_id: None,
            customer: None,
            currency: String::new(),
            valid_until: None,
            lines: Vec::new(),
            sales_order: None,
            status: ProformaStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProformaInvoiceId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn customer(&self) -> Option<PartyId> {
        self.customer
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn valid_until(&self) -> Option<NaiveDate> {
        self.valid_until
    }

    pub fn lines(&self) -> &[ProformaLine] {
        &self.lines
    }

    pub fn status(&self) -> ProformaStatus {
        self.status
    }

    /// The sales order this proforma converted into, once converted.
    pub fn sales_order(&self) -> Option<AggregateId> {
        self.sales_order
    }

    pub fn total_quantity(&self) -> Decimal {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn total_amount(&self) -> Decimal {
        self.lines.iter().map(|l| l.amount).sum()
    }

    pub fn total_vat(&self) -> Decimal {
        self.lines.iter().map(|l| l.vat_amount).sum()
    }

    pub fn total_gross_amount(&self) -> Decimal {
        self.lines.iter().map(|l| l.gross_amount).sum()
    }

    /// Sales order line inputs at the VAT-inclusive rate, unpinned. The
    /// order picks its lots at submit time.
    pub fn order_line_inputs(&self) -> Vec<SalesOrderLineInput> {
        let gross_factor = Decimal::ONE + vat_rate();
        self.lines
            .iter()
            .map(|l| SalesOrderLineInput {
                product_id: l.product_id,
                uom: l.uom.clone(),
                quantity: l.quantity,
                rate: l.rate * gross_factor,
                batch: None,
                warehouse: None,
            })
            .collect()
    }
}

impl AggregateRoot for ProformaInvoice {
    type Id = ProformaInvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProformaInvoice (draft quotation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProformaInvoice {
    pub tenant_id: TenantId,
    pub proforma_id: ProformaInvoiceId,
    pub customer: PartyId,
    pub currency: String,
    pub valid_until: Option<NaiveDate>,
    pub lines: Vec<ProformaLineInput>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitProformaInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitProformaInvoice {
    pub tenant_id: TenantId,
    pub proforma_id: ProformaInvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkProformaConverted.
///
/// The workflow layer creates the sales order first and dispatches this with
/// its id; the aggregate only guards the status machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkProformaConverted {
    pub tenant_id: TenantId,
    pub proforma_id: ProformaInvoiceId,
    pub sales_order: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelProformaInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelProformaInvoice {
    pub tenant_id: TenantId,
    pub proforma_id: ProformaInvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProformaInvoiceCommand {
    CreateProformaInvoice(CreateProformaInvoice),
    SubmitProformaInvoice(SubmitProformaInvoice),
    MarkProformaConverted(MarkProformaConverted),
    CancelProformaInvoice(CancelProformaInvoice),
}

/// Event: ProformaInvoiceCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProformaInvoiceCreated {
    pub tenant_id: TenantId,
    pub proforma_id: ProformaInvoiceId,
    pub customer: PartyId,
    pub currency: String,
    pub valid_until: Option<NaiveDate>,
    pub lines: Vec<ProformaLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProformaInvoiceSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProformaInvoiceSubmitted {
    pub tenant_id: TenantId,
    pub proforma_id: ProformaInvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProformaInvoiceConverted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProformaInvoiceConverted {
    pub tenant_id: TenantId,
    pub proforma_id: ProformaInvoiceId,
    pub sales_order: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProformaInvoiceCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProformaInvoiceCancelled {
    pub tenant_id: TenantId,
    pub proforma_id: ProformaInvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProformaInvoiceEvent {
    ProformaInvoiceCreated(ProformaInvoiceCreated),
    ProformaInvoiceSubmitted(ProformaInvoiceSubmitted),
    ProformaInvoiceConverted(ProformaInvoiceConverted),
    ProformaInvoiceCancelled(ProformaInvoiceCancelled),
}

impl Event for ProformaInvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProformaInvoiceEvent::ProformaInvoiceCreated(_) => "sales.proforma.created",
            ProformaInvoiceEvent::ProformaInvoiceSubmitted(_) => "sales.proforma.submitted",
            ProformaInvoiceEvent::ProformaInvoiceConverted(_) => "sales.proforma.converted",
            ProformaInvoiceEvent::ProformaInvoiceCancelled(_) => "sales.proforma.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProformaInvoiceEvent::ProformaInvoiceCreated(e) => e.occurred_at,
            ProformaInvoiceEvent::ProformaInvoiceSubmitted(e) => e.occurred_at,
            ProformaInvoiceEvent::ProformaInvoiceConverted(e) => e.occurred_at,
            ProformaInvoiceEvent::ProformaInvoiceCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProformaInvoice {
    type Command = ProformaInvoiceCommand;
    type Event = ProformaInvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProformaInvoiceEvent::ProformaInvoiceCreated(e) => {
                self.id = e.proforma_id;
                self.tenant_id = Some(e.tenant_id);
                self.customer = Some(e.customer);
                self.currency = e.currency.clone();
                self.valid_until = e.valid_until;
                self.lines = e.lines.clone();
                self.status = ProformaStatus::Draft;
                self.created = true;
            }
            ProformaInvoiceEvent::ProformaInvoiceSubmitted(_) => {
                self.status = ProformaStatus::Submitted;
            }
            ProformaInvoiceEvent::ProformaInvoiceConverted(e) => {
                self.sales_order = Some(e.sales_order);
                self.status = ProformaStatus::Converted;
            }
            ProformaInvoiceEvent::ProformaInvoiceCancelled(_) => {
                self.status = ProformaStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProformaInvoiceCommand::CreateProformaInvoice(cmd) => self.handle_create(cmd),
            ProformaInvoiceCommand::SubmitProformaInvoice(cmd) => self.handle_submit(cmd),
            ProformaInvoiceCommand::MarkProformaConverted(cmd) => self.handle_converted(cmd),
            ProformaInvoiceCommand::CancelProformaInvoice(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl ProformaInvoice {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_proforma_id(&self, proforma_id: ProformaInvoiceId) -> Result<(), DomainError> {
        if self.id != proforma_id {
            return Err(DomainError::invariant("proforma_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(
        &self,
        cmd: &CreateProformaInvoice,
    ) -> Result<Vec<ProformaInvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("proforma invoice already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "proforma invoice needs at least one line",
            ));
        }
        let currency = cmd.currency.trim().to_uppercase();
        if currency.is_empty() {
            return Err(DomainError::validation("currency cannot be empty"));
        }

        let rate = vat_rate();
        let mut lines = Vec::with_capacity(cmd.lines.len());
        for input in &cmd.lines {
            if input.quantity <= Decimal::ZERO {
                return Err(DomainError::validation("line quantities must be positive"));
            }
            if input.rate < Decimal::ZERO {
                return Err(DomainError::validation("line rates cannot be negative"));
            }
            let amount = input.quantity * input.rate;
            let vat_amount = amount * rate;
            lines.push(ProformaLine {
                product_id: input.product_id,
                uom: input.uom.clone(),
                quantity: input.quantity,
                rate: input.rate,
                amount,
                vat_amount,
                gross_amount: amount + vat_amount,
            });
        }

        Ok(vec![ProformaInvoiceEvent::ProformaInvoiceCreated(
            ProformaInvoiceCreated {
                tenant_id: cmd.tenant_id,
                proforma_id: cmd.proforma_id,
                customer: cmd.customer,
                currency,
                valid_until: cmd.valid_until,
                lines,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_submit(
        &self,
        cmd: &SubmitProformaInvoice,
    ) -> Result<Vec<ProformaInvoiceEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_proforma_id(cmd.proforma_id)?;

        if self.status != ProformaStatus::Draft {
            return Err(DomainError::conflict(
                "only draft proforma invoices can be submitted",
            ));
        }

        Ok(vec![ProformaInvoiceEvent::ProformaInvoiceSubmitted(
            ProformaInvoiceSubmitted {
                tenant_id: cmd.tenant_id,
                proforma_id: cmd.proforma_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_converted(
        &self,
        cmd: &MarkProformaConverted,
    ) -> Result<Vec<ProformaInvoiceEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_proforma_id(cmd.proforma_id)?;

        match self.status {
            ProformaStatus::Converted => {
                return Err(DomainError::conflict(
                    "proforma invoice has already been converted",
                ));
            }
            ProformaStatus::Submitted => {}
            _ => {
                return Err(DomainError::invariant(
                    "submit the proforma invoice before converting it",
                ));
            }
        }

        Ok(vec![ProformaInvoiceEvent::ProformaInvoiceConverted(
            ProformaInvoiceConverted {
                tenant_id: cmd.tenant_id,
                proforma_id: cmd.proforma_id,
                sales_order: cmd.sales_order,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_cancel(
        &self,
        cmd: &CancelProformaInvoice,
    ) -> Result<Vec<ProformaInvoiceEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_proforma_id(cmd.proforma_id)?;

        match self.status {
            ProformaStatus::Cancelled => {
                return Err(DomainError::conflict("proforma invoice is already cancelled"));
            }
            ProformaStatus::Converted => {
                return Err(DomainError::invariant(
                    "converted proforma invoices cannot be cancelled",
                ));
            }
            _ => {}
        }

        Ok(vec![ProformaInvoiceEvent::ProformaInvoiceCancelled(
            ProformaInvoiceCancelled {
                tenant_id: cmd.tenant_id,
                proforma_id: cmd.proforma_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
