//! Delivery note aggregate.
//!
//! The delivery note is the final issuance document: submitting it turns the
//! reserved quantities on the referenced batches into issued stock, completes
//! the sales order, and closes the gate pass. The aggregate emits the issuance
//! list; the workflow layer applies it to the stock entries and the ledger.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plasticflow_catalog::{ProductId, Unit, WarehouseId};
use plasticflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use plasticflow_events::Event;
use plasticflow_sales::{BatchRef, SalesOrderId};

use crate::gate_pass::GatePassId;

/// Delivery note identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryNoteId(pub AggregateId);

impl DeliveryNoteId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DeliveryNoteId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Draft,
    InTransit,
    Delivered,
    Cancelled,
}

/// One delivered line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryNoteLine {
    pub product_id: ProductId,
    pub uom: Unit,
    pub quantity: Decimal,
    pub batch: Option<BatchRef>,
    pub warehouse: Option<WarehouseId>,
}

/// Reserved quantity on a batch line that submit turns into issued stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryIssuance {
    pub batch: BatchRef,
    pub product_id: ProductId,
    pub warehouse: Option<WarehouseId>,
    pub quantity: Decimal,
}

/// Aggregate root: DeliveryNote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryNote {
    id: DeliveryNoteId,
    tenant_id: Option<TenantId>,
    sales_order: Option<SalesOrderId>,
    gate_pass: Option<GatePassId>,
    lines: Vec<DeliveryNoteLine>,
    delivery_date: Option<NaiveDate>,
    status: DeliveryStatus,
    version: u64,
    created: bool,
}

impl DeliveryNote {
    pub fn empty(id: DeliveryNoteId) -> Self {
        Self {
            id,
            tenant_id: None,
            sales_order: None,
            gate_pass: None,
            lines: Vec::new(),
            delivery_date: None,
            status: DeliveryStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> DeliveryNoteId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn sales_order(&self) -> Option<SalesOrderId> {
        self.sales_order
    }

    pub fn gate_pass(&self) -> Option<GatePassId> {
        self.gate_pass
    }

    pub fn lines(&self) -> &[DeliveryNoteLine] {
        &self.lines
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    fn issuances(&self) -> Vec<DeliveryIssuance> {
        self.lines
            .iter()
            .filter_map(|line| {
                line.batch.map(|batch| DeliveryIssuance {
                    batch,
                    product_id: line.product_id,
                    warehouse: line.warehouse,
                    quantity: line.quantity,
                })
            })
            .collect()
    }
}

impl AggregateRoot for DeliveryNote {
    type Id = DeliveryNoteId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateDeliveryNote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDeliveryNote {
    pub tenant_id: TenantId,
    pub delivery_note_id: DeliveryNoteId,
    pub sales_order: SalesOrderId,
    pub gate_pass: GatePassId,
    pub lines: Vec<DeliveryNoteLine>,
    pub delivery_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitDeliveryNote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitDeliveryNote {
    pub tenant_id: TenantId,
    pub delivery_note_id: DeliveryNoteId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmDelivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmDelivery {
    pub tenant_id: TenantId,
    pub delivery_note_id: DeliveryNoteId,
    pub delivered_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelDeliveryNote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelDeliveryNote {
    pub tenant_id: TenantId,
    pub delivery_note_id: DeliveryNoteId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryNoteCommand {
    CreateDeliveryNote(CreateDeliveryNote),
    SubmitDeliveryNote(SubmitDeliveryNote),
    ConfirmDelivery(ConfirmDelivery),
    CancelDeliveryNote(CancelDeliveryNote),
}

/// Event: DeliveryNoteCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryNoteCreated {
    pub tenant_id: TenantId,
    pub delivery_note_id: DeliveryNoteId,
    pub sales_order: SalesOrderId,
    pub gate_pass: GatePassId,
    pub lines: Vec<DeliveryNoteLine>,
    pub delivery_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryNoteSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryNoteSubmitted {
    pub tenant_id: TenantId,
    pub delivery_note_id: DeliveryNoteId,
    pub sales_order: SalesOrderId,
    pub gate_pass: GatePassId,
    /// Applied by the workflow layer: reserved -> issued on each batch line.
    pub issuances: Vec<DeliveryIssuance>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfirmed {
    pub tenant_id: TenantId,
    pub delivery_note_id: DeliveryNoteId,
    pub delivered_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryNoteCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryNoteCancelled {
    pub tenant_id: TenantId,
    pub delivery_note_id: DeliveryNoteId,
    pub sales_order: Option<SalesOrderId>,
    pub gate_pass: Option<GatePassId>,
    /// Applied by the workflow layer: issued -> reserved on each batch line.
    /// Empty when the note was never submitted.
    pub reversed_issuances: Vec<DeliveryIssuance>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryNoteEvent {
    DeliveryNoteCreated(DeliveryNoteCreated),
    DeliveryNoteSubmitted(DeliveryNoteSubmitted),
    DeliveryConfirmed(DeliveryConfirmed),
    DeliveryNoteCancelled(DeliveryNoteCancelled),
}

impl Event for DeliveryNoteEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DeliveryNoteEvent::DeliveryNoteCreated(_) => "logistics.delivery_note.created",
            DeliveryNoteEvent::DeliveryNoteSubmitted(_) => "logistics.delivery_note.submitted",
            DeliveryNoteEvent::DeliveryConfirmed(_) => "logistics.delivery_note.confirmed",
            DeliveryNoteEvent::DeliveryNoteCancelled(_) => "logistics.delivery_note.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DeliveryNoteEvent::DeliveryNoteCreated(e) => e.occurred_at,
            DeliveryNoteEvent::DeliveryNoteSubmitted(e) => e.occurred_at,
            DeliveryNoteEvent::DeliveryConfirmed(e) => e.occurred_at,
            DeliveryNoteEvent::DeliveryNoteCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for DeliveryNote {
    type Command = DeliveryNoteCommand;
    type Event = DeliveryNoteEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DeliveryNoteEvent::DeliveryNoteCreated(e) => {
                self.id = e.delivery_note_id;
                self.tenant_id = Some(e.tenant_id);
                self.sales_order = Some(e.sales_order);
                self.gate_pass = Some(e.gate_pass);
                self.lines = e.lines.clone();
                self.delivery_date = e.delivery_date;
                self.status = DeliveryStatus::Draft;
                self.created = true;
            }
            DeliveryNoteEvent::DeliveryNoteSubmitted(_) => {
                self.status = DeliveryStatus::InTransit;
            }
            DeliveryNoteEvent::DeliveryConfirmed(e) => {
                self.delivery_date = Some(e.delivered_on);
                self.status = DeliveryStatus::Delivered;
            }
            DeliveryNoteEvent::DeliveryNoteCancelled(_) => {
                self.status = DeliveryStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DeliveryNoteCommand::CreateDeliveryNote(cmd) => self.handle_create(cmd),
            DeliveryNoteCommand::SubmitDeliveryNote(cmd) => self.handle_submit(cmd),
            DeliveryNoteCommand::ConfirmDelivery(cmd) => self.handle_confirm(cmd),
            DeliveryNoteCommand::CancelDeliveryNote(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl DeliveryNote {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_delivery_note_id(&self, delivery_note_id: DeliveryNoteId) -> Result<(), DomainError> {
        if self.id != delivery_note_id {
            return Err(DomainError::invariant("delivery_note_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateDeliveryNote) -> Result<Vec<DeliveryNoteEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("delivery note already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "delivery note needs at least one line",
            ));
        }
        for line in &cmd.lines {
            if line.quantity <= Decimal::ZERO {
                return Err(DomainError::validation(
                    "delivery quantity must be greater than zero",
                ));
            }
        }

        Ok(vec![DeliveryNoteEvent::DeliveryNoteCreated(
            DeliveryNoteCreated {
                tenant_id: cmd.tenant_id,
                delivery_note_id: cmd.delivery_note_id,
                sales_order: cmd.sales_order,
                gate_pass: cmd.gate_pass,
                lines: cmd.lines.clone(),
                delivery_date: cmd.delivery_date,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_submit(&self, cmd: &SubmitDeliveryNote) -> Result<Vec<DeliveryNoteEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_delivery_note_id(cmd.delivery_note_id)?;

        if self.status != DeliveryStatus::Draft {
            return Err(DomainError::invariant(
                "only a draft delivery note can be submitted",
            ));
        }
        let (Some(sales_order), Some(gate_pass)) = (self.sales_order, self.gate_pass) else {
            return Err(DomainError::invariant(
                "delivery note is missing its sales order or gate pass",
            ));
        };

        Ok(vec![DeliveryNoteEvent::DeliveryNoteSubmitted(
            DeliveryNoteSubmitted {
                tenant_id: cmd.tenant_id,
                delivery_note_id: cmd.delivery_note_id,
                sales_order,
                gate_pass,
                issuances: self.issuances(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_confirm(&self, cmd: &ConfirmDelivery) -> Result<Vec<DeliveryNoteEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_delivery_note_id(cmd.delivery_note_id)?;

        if self.status != DeliveryStatus::InTransit {
            return Err(DomainError::invariant(
                "only a delivery in transit can be confirmed",
            ));
        }

        Ok(vec![DeliveryNoteEvent::DeliveryConfirmed(DeliveryConfirmed {
            tenant_id: cmd.tenant_id,
            delivery_note_id: cmd.delivery_note_id,
            delivered_on: cmd.delivered_on,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelDeliveryNote) -> Result<Vec<DeliveryNoteEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_delivery_note_id(cmd.delivery_note_id)?;

        if self.status == DeliveryStatus::Cancelled {
            return Err(DomainError::conflict("delivery note is already cancelled"));
        }

        let reversed_issuances = match self.status {
            DeliveryStatus::InTransit | DeliveryStatus::Delivered => self.issuances(),
            DeliveryStatus::Draft => Vec::new(),
            DeliveryStatus::Cancelled => unreachable!(),
        };

        Ok(vec![DeliveryNoteEvent::DeliveryNoteCancelled(
            DeliveryNoteCancelled {
                tenant_id: cmd.tenant_id,
                delivery_note_id: cmd.delivery_note_id,
                sales_order: self.sales_order,
                gate_pass: self.gate_pass,
                reversed_issuances,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
