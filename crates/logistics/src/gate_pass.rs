//! Gate pass aggregate.
//!
//! A gate pass is generated for a fully invoiced sales order and authorizes
//! the vehicle to leave the yard. The workflow layer checks the order's
//! invoicing status and attaches the pass back onto the order after dispatch.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plasticflow_catalog::{ProductId, Unit, WarehouseId};
use plasticflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use plasticflow_events::Event;
use plasticflow_invoicing::InvoiceId;
use plasticflow_parties::PartyId;
use plasticflow_sales::{BatchRef, SalesOrderId};

/// Gate pass identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GatePassId(pub AggregateId);

impl GatePassId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for GatePassId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePassStatus {
    Pending,
    Issued,
    Closed,
    Cancelled,
}

/// One dispatched line, carried over from the sales order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePassLine {
    pub product_id: ProductId,
    pub uom: Unit,
    pub quantity: Decimal,
    pub batch: Option<BatchRef>,
    pub warehouse: Option<WarehouseId>,
}

/// Aggregate root: GatePass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePass {
    id: GatePassId,
    tenant_id: Option<TenantId>,
    sales_order: Option<SalesOrderId>,
    invoice: Option<InvoiceId>,
    customer: Option<PartyId>,
    driver_name: String,
    vehicle_number: String,
    lines: Vec<GatePassLine>,
    issued_on: Option<NaiveDate>,
    status: GatePassStatus,
    version: u64,
    created: bool,
}

impl GatePass {
    pub fn empty(id: GatePassId) -> Self {
        Self {
            id,
            tenant_id: None,
            sales_order: None,
            invoice: None,
            customer: None,
            driver_name: String::new(),
            vehicle_number: String::new(),
            lines: Vec::new(),
            issued_on: None,
            status: GatePassStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> GatePassId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn sales_order(&self) -> Option<SalesOrderId> {
        self.sales_order
    }

    pub fn invoice(&self) -> Option<InvoiceId> {
        self.invoice
    }

    pub fn lines(&self) -> &[GatePassLine] {
        &self.lines
    }

    pub fn status(&self) -> GatePassStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.created && self.status != GatePassStatus::Cancelled
    }
}

impl AggregateRoot for GatePass {
    type Id = GatePassId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateGatePass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGatePass {
    pub tenant_id: TenantId,
    pub gate_pass_id: GatePassId,
    pub sales_order: SalesOrderId,
    /// Latest invoice on the order; the workflow layer resolves it and checks
    /// the order is fully invoiced before dispatch.
    pub invoice: InvoiceId,
    pub customer: PartyId,
    pub driver_name: String,
    pub vehicle_number: String,
    pub lines: Vec<GatePassLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: IssueGatePass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueGatePass {
    pub tenant_id: TenantId,
    pub gate_pass_id: GatePassId,
    pub issued_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseGatePass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseGatePass {
    pub tenant_id: TenantId,
    pub gate_pass_id: GatePassId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReopenGatePass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReopenGatePass {
    pub tenant_id: TenantId,
    pub gate_pass_id: GatePassId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelGatePass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelGatePass {
    pub tenant_id: TenantId,
    pub gate_pass_id: GatePassId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatePassCommand {
    CreateGatePass(CreateGatePass),
    IssueGatePass(IssueGatePass),
    CloseGatePass(CloseGatePass),
    ReopenGatePass(ReopenGatePass),
    CancelGatePass(CancelGatePass),
}

/// Event: GatePassCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePassCreated {
    pub tenant_id: TenantId,
    pub gate_pass_id: GatePassId,
    pub sales_order: SalesOrderId,
    pub invoice: InvoiceId,
    pub customer: PartyId,
    pub driver_name: String,
    pub vehicle_number: String,
    pub lines: Vec<GatePassLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GatePassIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePassIssued {
    pub tenant_id: TenantId,
    pub gate_pass_id: GatePassId,
    pub issued_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GatePassClosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePassClosed {
    pub tenant_id: TenantId,
    pub gate_pass_id: GatePassId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GatePassReopened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePassReopened {
    pub tenant_id: TenantId,
    pub gate_pass_id: GatePassId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GatePassCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePassCancelled {
    pub tenant_id: TenantId,
    pub gate_pass_id: GatePassId,
    pub sales_order: Option<SalesOrderId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatePassEvent {
    GatePassCreated(GatePassCreated),
    GatePassIssued(GatePassIssued),
    GatePassClosed(GatePassClosed),
    GatePassReopened(GatePassReopened),
    GatePassCancelled(GatePassCancelled),
}

impl Event for GatePassEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GatePassEvent::GatePassCreated(_) => "logistics.gate_pass.created",
            GatePassEvent::GatePassIssued(_) => "logistics.gate_pass.issued",
            GatePassEvent::GatePassClosed(_) => "logistics.gate_pass.closed",
            GatePassEvent::GatePassReopened(_) => "logistics.gate_pass.reopened",
            GatePassEvent::GatePassCancelled(_) => "logistics.gate_pass.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GatePassEvent::GatePassCreated(e) => e.occurred_at,
            GatePassEvent::GatePassIssued(e) => e.occurred_at,
            GatePassEvent::GatePassClosed(e) => e.occurred_at,
            GatePassEvent::GatePassReopened(e) => e.occurred_at,
            GatePassEvent::GatePassCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for GatePass {
    type Command = GatePassCommand;
    type Event = GatePassEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            GatePassEvent::GatePassCreated(e) => {
                self.id = e.gate_pass_id;
                self.tenant_id = Some(e.tenant_id);
                self.sales_order = Some(e.sales_order);
                self.invoice = Some(e.invoice);
                self.customer = Some(e.customer);
                self.driver_name = e.driver_name.clone();
                self.vehicle_number = e.vehicle_number.clone();
                self.lines = e.lines.clone();
                self.status = GatePassStatus::Pending;
                self.created = true;
            }
            GatePassEvent::GatePassIssued(e) => {
                self.issued_on = Some(e.issued_on);
                self.status = GatePassStatus::Issued;
            }
            GatePassEvent::GatePassClosed(_) => {
                self.status = GatePassStatus::Closed;
            }
            GatePassEvent::GatePassReopened(_) => {
                self.status = GatePassStatus::Issued;
            }
            GatePassEvent::GatePassCancelled(_) => {
                self.status = GatePassStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GatePassCommand::CreateGatePass(cmd) => self.handle_create(cmd),
            GatePassCommand::IssueGatePass(cmd) => self.handle_issue(cmd),
            GatePassCommand::CloseGatePass(cmd) => self.handle_close(cmd),
            GatePassCommand::ReopenGatePass(cmd) => self.handle_reopen(cmd),
            GatePassCommand::CancelGatePass(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl GatePass {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_gate_pass_id(&self, gate_pass_id: GatePassId) -> Result<(), DomainError> {
        if self.id != gate_pass_id {
            return Err(DomainError::invariant("gate_pass_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateGatePass) -> Result<Vec<GatePassEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("gate pass already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("gate pass needs at least one line"));
        }
        let driver_name = cmd.driver_name.trim().to_string();
        let vehicle_number = cmd.vehicle_number.trim().to_string();
        if driver_name.is_empty() {
            return Err(DomainError::validation("driver name cannot be empty"));
        }
        if vehicle_number.is_empty() {
            return Err(DomainError::validation("vehicle number cannot be empty"));
        }

        Ok(vec![GatePassEvent::GatePassCreated(GatePassCreated {
            tenant_id: cmd.tenant_id,
            gate_pass_id: cmd.gate_pass_id,
            sales_order: cmd.sales_order,
            invoice: cmd.invoice,
            customer: cmd.customer,
            driver_name,
            vehicle_number,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_issue(&self, cmd: &IssueGatePass) -> Result<Vec<GatePassEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_gate_pass_id(cmd.gate_pass_id)?;

        if self.status != GatePassStatus::Pending {
            return Err(DomainError::invariant(
                "only a pending gate pass can be issued",
            ));
        }

        Ok(vec![GatePassEvent::GatePassIssued(GatePassIssued {
            tenant_id: cmd.tenant_id,
            gate_pass_id: cmd.gate_pass_id,
            issued_on: cmd.issued_on,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &CloseGatePass) -> Result<Vec<GatePassEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_gate_pass_id(cmd.gate_pass_id)?;

        if self.status != GatePassStatus::Issued {
            return Err(DomainError::invariant(
                "only an issued gate pass can be closed",
            ));
        }

        Ok(vec![GatePassEvent::GatePassClosed(GatePassClosed {
            tenant_id: cmd.tenant_id,
            gate_pass_id: cmd.gate_pass_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reopen(&self, cmd: &ReopenGatePass) -> Result<Vec<GatePassEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_gate_pass_id(cmd.gate_pass_id)?;

        if self.status != GatePassStatus::Closed {
            return Err(DomainError::invariant(
                "only a closed gate pass can be reopened",
            ));
        }

        Ok(vec![GatePassEvent::GatePassReopened(GatePassReopened {
            tenant_id: cmd.tenant_id,
            gate_pass_id: cmd.gate_pass_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelGatePass) -> Result<Vec<GatePassEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_gate_pass_id(cmd.gate_pass_id)?;

        match self.status {
            GatePassStatus::Closed => {
                return Err(DomainError::invariant(
                    "a closed gate pass cannot be cancelled",
                ));
            }
            GatePassStatus::Cancelled => {
                return Err(DomainError::conflict("gate pass is already cancelled"));
            }
            GatePassStatus::Pending | GatePassStatus::Issued => {}
        }

        Ok(vec![GatePassEvent::GatePassCancelled(GatePassCancelled {
            tenant_id: cmd.tenant_id,
            gate_pass_id: cmd.gate_pass_id,
            sales_order: self.sales_order,
            occurred_at: cmd.occurred_at,
        })])
    }
}
