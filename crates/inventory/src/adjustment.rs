//! Manual stock adjustments allocated across a product's batches.
//!
//! Increases fill the newest batches first, each capped by the quantity
//! originally shipped for that batch line; decreases drain the oldest batches
//! first, capped by availability. A shortfall in either direction is an
//! error. Cancelling applies the inverse allocations.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plasticflow_catalog::{ProductId, WarehouseId};
use plasticflow_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, QTY_TOLERANCE, TenantId,
    clamp_non_negative,
};
use plasticflow_events::Event;

use crate::entry::StockEntryId;
use crate::ledger::LocationKind;

/// One batch line eligible for adjustment, oldest-first ordering inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentBatch {
    pub entry_id: StockEntryId,
    pub line_index: usize,
    pub arrival_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub received_qty: Decimal,
    pub available_qty: Decimal,
    /// Quantity on the originating shipment item; `None` means uncapped.
    pub original_shipped_qty: Option<Decimal>,
}

impl AdjustmentBatch {
    fn arrival_marker(&self) -> NaiveDate {
        self.arrival_date.unwrap_or(self.created_at.date_naive())
    }

    fn remaining_capacity(&self) -> Option<Decimal> {
        self.original_shipped_qty
            .map(|original| clamp_non_negative(original - self.received_qty))
    }
}

/// Planned delta against one batch line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentAllocation {
    pub entry_id: StockEntryId,
    pub line_index: usize,
    pub quantity_delta: Decimal,
}

/// Allocate a signed quantity across batches.
///
/// Batches may arrive in any order; they are sorted oldest-first internally.
pub fn plan_adjustment(
    batches: &[AdjustmentBatch],
    quantity_delta: Decimal,
) -> DomainResult<Vec<AdjustmentAllocation>> {
    if quantity_delta.is_zero() {
        return Err(DomainError::validation("adjustment quantity cannot be zero"));
    }
    if batches.is_empty() {
        return Err(DomainError::validation(
            "no stock entry lines found for the adjustment",
        ));
    }

    let mut ordered: Vec<&AdjustmentBatch> = batches.iter().collect();
    ordered.sort_by(|a, b| {
        a.arrival_marker()
            .cmp(&b.arrival_marker())
            .then(a.created_at.cmp(&b.created_at))
    });

    let mut allocations = Vec::new();

    if quantity_delta > Decimal::ZERO {
        // Top up newest batches first, within original shipped capacity.
        let mut remaining = quantity_delta;
        for batch in ordered.iter().rev() {
            let apply = match batch.remaining_capacity() {
                Some(capacity) if capacity <= Decimal::ZERO => continue,
                Some(capacity) => capacity.min(remaining),
                None => remaining,
            };
            if apply <= Decimal::ZERO {
                continue;
            }
            allocations.push(AdjustmentAllocation {
                entry_id: batch.entry_id,
                line_index: batch.line_index,
                quantity_delta: apply,
            });
            remaining -= apply;
            if remaining <= QTY_TOLERANCE {
                return Ok(allocations);
            }
        }
        return Err(DomainError::validation(format!(
            "insufficient shipment capacity for the increase; short by {remaining}"
        )));
    }

    // Drain oldest batches first, capped by availability.
    let mut remaining = quantity_delta.abs();
    for batch in &ordered {
        let available = clamp_non_negative(batch.available_qty);
        if available <= Decimal::ZERO {
            continue;
        }
        let reduce = available.min(remaining);
        allocations.push(AdjustmentAllocation {
            entry_id: batch.entry_id,
            line_index: batch.line_index,
            quantity_delta: -reduce,
        });
        remaining -= reduce;
        if remaining <= QTY_TOLERANCE {
            return Ok(allocations);
        }
    }
    Err(DomainError::validation(format!(
        "insufficient available stock for the reduction; short by {remaining}"
    )))
}

/// Stock adjustment identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockAdjustmentId(pub AggregateId);

impl StockAdjustmentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for StockAdjustmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentStatus {
    Applied,
    Cancelled,
}

/// Aggregate root: StockAdjustment.
///
/// The aggregate records what was applied; the workflow layer plans the
/// allocations against the batch read model and pushes the resulting deltas
/// to the affected stock entries and ledger slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    id: StockAdjustmentId,
    tenant_id: Option<TenantId>,
    product_id: Option<ProductId>,
    location_kind: LocationKind,
    warehouse: Option<WarehouseId>,
    quantity_delta: Decimal,
    posting_date: Option<NaiveDate>,
    allocations: Vec<AdjustmentAllocation>,
    status: AdjustmentStatus,
    version: u64,
    created: bool,
}

impl StockAdjustment {
    pub fn empty(id: StockAdjustmentId) -> Self {
        Self {
            id,
            tenant_id: None,
            product_id: None,
            location_kind: LocationKind::Warehouse,
            warehouse: None,
            quantity_delta: Decimal::ZERO,
            posting_date: None,
            allocations: Vec::new(),
            status: AdjustmentStatus::Applied,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> StockAdjustmentId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn status(&self) -> AdjustmentStatus {
        self.status
    }

    pub fn allocations(&self) -> &[AdjustmentAllocation] {
        &self.allocations
    }

    pub fn quantity_delta(&self) -> Decimal {
        self.quantity_delta
    }
}

impl AggregateRoot for StockAdjustment {
    type Id = StockAdjustmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ApplyStockAdjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyStockAdjustment {
    pub tenant_id: TenantId,
    pub adjustment_id: StockAdjustmentId,
    pub product_id: ProductId,
    pub location_kind: LocationKind,
    pub warehouse: Option<WarehouseId>,
    pub quantity_delta: Decimal,
    pub posting_date: Option<NaiveDate>,
    pub allocations: Vec<AdjustmentAllocation>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelStockAdjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelStockAdjustment {
    pub tenant_id: TenantId,
    pub adjustment_id: StockAdjustmentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockAdjustmentCommand {
    ApplyStockAdjustment(ApplyStockAdjustment),
    CancelStockAdjustment(CancelStockAdjustment),
}

/// Event: AdjustmentApplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentApplied {
    pub tenant_id: TenantId,
    pub adjustment_id: StockAdjustmentId,
    pub product_id: ProductId,
    pub location_kind: LocationKind,
    pub warehouse: Option<WarehouseId>,
    pub quantity_delta: Decimal,
    pub posting_date: Option<NaiveDate>,
    pub allocations: Vec<AdjustmentAllocation>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AdjustmentCancelled.
///
/// Carries the inverse allocations (reverse order, negated deltas) so
/// consumers can undo without re-planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentCancelled {
    pub tenant_id: TenantId,
    pub adjustment_id: StockAdjustmentId,
    pub inverse_allocations: Vec<AdjustmentAllocation>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockAdjustmentEvent {
    AdjustmentApplied(AdjustmentApplied),
    AdjustmentCancelled(AdjustmentCancelled),
}

impl Event for StockAdjustmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockAdjustmentEvent::AdjustmentApplied(_) => "inventory.adjustment.applied",
            StockAdjustmentEvent::AdjustmentCancelled(_) => "inventory.adjustment.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockAdjustmentEvent::AdjustmentApplied(e) => e.occurred_at,
            StockAdjustmentEvent::AdjustmentCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockAdjustment {
    type Command = StockAdjustmentCommand;
    type Event = StockAdjustmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockAdjustmentEvent::AdjustmentApplied(e) => {
                self.id = e.adjustment_id;
                self.tenant_id = Some(e.tenant_id);
                self.product_id = Some(e.product_id);
                self.location_kind = e.location_kind;
                self.warehouse = e.warehouse;
                self.quantity_delta = e.quantity_delta;
                self.posting_date = e.posting_date;
                self.allocations = e.allocations.clone();
                self.status = AdjustmentStatus::Applied;
                self.created = true;
            }
            StockAdjustmentEvent::AdjustmentCancelled(_) => {
                self.status = AdjustmentStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockAdjustmentCommand::ApplyStockAdjustment(cmd) => self.handle_apply(cmd),
            StockAdjustmentCommand::CancelStockAdjustment(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl StockAdjustment {
    fn handle_apply(
        &self,
        cmd: &ApplyStockAdjustment,
    ) -> Result<Vec<StockAdjustmentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("adjustment already applied"));
        }
        if cmd.quantity_delta.is_zero() {
            return Err(DomainError::validation("adjustment quantity cannot be zero"));
        }
        if cmd.allocations.is_empty() {
            return Err(DomainError::validation("adjustment has no allocations"));
        }
        if cmd.location_kind == LocationKind::Warehouse && cmd.warehouse.is_none() {
            return Err(DomainError::validation(
                "warehouse adjustments must name a warehouse",
            ));
        }
        let allocated: Decimal = cmd.allocations.iter().map(|a| a.quantity_delta).sum();
        if (allocated - cmd.quantity_delta).abs() > QTY_TOLERANCE {
            return Err(DomainError::invariant(
                "allocations do not sum to the adjustment quantity",
            ));
        }

        Ok(vec![StockAdjustmentEvent::AdjustmentApplied(AdjustmentApplied {
            tenant_id: cmd.tenant_id,
            adjustment_id: cmd.adjustment_id,
            product_id: cmd.product_id,
            location_kind: cmd.location_kind,
            warehouse: cmd.warehouse,
            quantity_delta: cmd.quantity_delta,
            posting_date: cmd.posting_date,
            allocations: cmd.allocations.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(
        &self,
        cmd: &CancelStockAdjustment,
    ) -> Result<Vec<StockAdjustmentEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(cmd.tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != cmd.adjustment_id {
            return Err(DomainError::invariant("adjustment_id mismatch"));
        }
        if self.status == AdjustmentStatus::Cancelled {
            return Err(DomainError::conflict("adjustment is already cancelled"));
        }

        let inverse_allocations = self
            .allocations
            .iter()
            .rev()
            .map(|a| AdjustmentAllocation {
                entry_id: a.entry_id,
                line_index: a.line_index,
                quantity_delta: -a.quantity_delta,
            })
            .collect();

        Ok(vec![StockAdjustmentEvent::AdjustmentCancelled(
            AdjustmentCancelled {
                tenant_id: cmd.tenant_id,
                adjustment_id: cmd.adjustment_id,
                inverse_allocations,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
