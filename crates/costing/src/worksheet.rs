use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plasticflow_catalog::ProductId;
use plasticflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use plasticflow_events::Event;
use plasticflow_shipping::{ImportShipmentId, LandedCostAllocation};

use crate::allocation::{AllocationItem, CostBreakdown, allocate_costs};
use crate::component::{AllocationMethod, CostComponent};
use crate::summary::ProfitAssumptions;

/// Landing cost worksheet identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandingCostWorksheetId(pub AggregateId);

impl LandingCostWorksheetId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for LandingCostWorksheetId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Worksheet lifecycle.
///
/// `Draft` until costs are first allocated, `InReview` while editable with an
/// allocation present, `Locked` once the allocation is pushed to the shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorksheetStatus {
    Draft,
    InReview,
    Locked,
    Cancelled,
}

/// One shipment item as captured when the worksheet was drafted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotItem {
    pub item_index: usize,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub base_amount_import: Decimal,
}

/// Frozen view of the shipment the worksheet costs against.
///
/// The workflow layer refreshes the snapshot (by recreating the worksheet)
/// when shipment quantities change before lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentSnapshot {
    pub shipment_id: ImportShipmentId,
    pub shipment_currency: String,
    pub worksheet_currency: String,
    pub shipment_exchange_rate: Decimal,
    pub items: Vec<SnapshotItem>,
}

/// Aggregate root: LandingCostWorksheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandingCostWorksheet {
    id: LandingCostWorksheetId,
    tenant_id: Option<TenantId>,
    snapshot: Option<ShipmentSnapshot>,
    allocation_method: AllocationMethod,
    components: Vec<CostComponent>,
    breakdown: Option<CostBreakdown>,
    default_assumptions: ProfitAssumptions,
    status: WorksheetStatus,
    locked_on: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl LandingCostWorksheet {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: LandingCostWorksheetId) -> Self {
        Self {
            id,
            tenant_id: None,
            snapshot: None,
            allocation_method: AllocationMethod::ByValue,
            components: Vec::new(),
            breakdown: None,
            default_assumptions: ProfitAssumptions::default(),
            status: WorksheetStatus::Draft,
            locked_on: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> LandingCostWorksheetId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn shipment_id(&self) -> Option<ImportShipmentId> {
        self.snapshot.as_ref().map(|s| s.shipment_id)
    }

    pub fn status(&self) -> WorksheetStatus {
        self.status
    }

    pub fn components(&self) -> &[CostComponent] {
        &self.components
    }

    pub fn breakdown(&self) -> Option<&CostBreakdown> {
        self.breakdown.as_ref()
    }

    pub fn default_assumptions(&self) -> ProfitAssumptions {
        self.default_assumptions
    }

    pub fn locked_on(&self) -> Option<DateTime<Utc>> {
        self.locked_on
    }

    /// Current allocation in the shape the shipment aggregate consumes.
    pub fn shipment_allocations(&self) -> Vec<LandedCostAllocation> {
        self.breakdown
            .as_ref()
            .map(|b| {
                b.items
                    .iter()
                    .map(|item| LandedCostAllocation {
                        item_index: item.item_index,
                        amount: item.landed_cost_import(),
                        amount_local: item.landed_cost_local(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl AggregateRoot for LandingCostWorksheet {
    type Id = LandingCostWorksheetId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateWorksheet.
///
/// One active worksheet per shipment: enforced by the workflow layer against
/// the read model before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWorksheet {
    pub tenant_id: TenantId,
    pub worksheet_id: LandingCostWorksheetId,
    pub snapshot: ShipmentSnapshot,
    pub allocation_method: AllocationMethod,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateCostComponents (recalculates the allocation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCostComponents {
    pub tenant_id: TenantId,
    pub worksheet_id: LandingCostWorksheetId,
    pub components: Vec<CostComponent>,
    pub default_assumptions: ProfitAssumptions,
    pub occurred_at: DateTime<Utc>,
}

/// Command: LockWorksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockWorksheet {
    pub tenant_id: TenantId,
    pub worksheet_id: LandingCostWorksheetId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UnlockWorksheet (reopen for revision).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockWorksheet {
    pub tenant_id: TenantId,
    pub worksheet_id: LandingCostWorksheetId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelWorksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelWorksheet {
    pub tenant_id: TenantId,
    pub worksheet_id: LandingCostWorksheetId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorksheetCommand {
    CreateWorksheet(CreateWorksheet),
    UpdateCostComponents(UpdateCostComponents),
    LockWorksheet(LockWorksheet),
    UnlockWorksheet(UnlockWorksheet),
    CancelWorksheet(CancelWorksheet),
}

/// Event: WorksheetCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorksheetCreated {
    pub tenant_id: TenantId,
    pub worksheet_id: LandingCostWorksheetId,
    pub snapshot: ShipmentSnapshot,
    pub allocation_method: AllocationMethod,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CostComponentsUpdated.
///
/// Carries the recalculated breakdown so projections never re-run the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostComponentsUpdated {
    pub tenant_id: TenantId,
    pub worksheet_id: LandingCostWorksheetId,
    pub components: Vec<CostComponent>,
    pub default_assumptions: ProfitAssumptions,
    pub breakdown: CostBreakdown,
    pub occurred_at: DateTime<Utc>,
}

/// Event: WorksheetLocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorksheetLocked {
    pub tenant_id: TenantId,
    pub worksheet_id: LandingCostWorksheetId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: WorksheetUnlocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorksheetUnlocked {
    pub tenant_id: TenantId,
    pub worksheet_id: LandingCostWorksheetId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: WorksheetCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorksheetCancelled {
    pub tenant_id: TenantId,
    pub worksheet_id: LandingCostWorksheetId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorksheetEvent {
    WorksheetCreated(WorksheetCreated),
    CostComponentsUpdated(CostComponentsUpdated),
    WorksheetLocked(WorksheetLocked),
    WorksheetUnlocked(WorksheetUnlocked),
    WorksheetCancelled(WorksheetCancelled),
}

impl Event for WorksheetEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WorksheetEvent::WorksheetCreated(_) => "costing.worksheet.created",
            WorksheetEvent::CostComponentsUpdated(_) => "costing.worksheet.components_updated",
            WorksheetEvent::WorksheetLocked(_) => "costing.worksheet.locked",
            WorksheetEvent::WorksheetUnlocked(_) => "costing.worksheet.unlocked",
            WorksheetEvent::WorksheetCancelled(_) => "costing.worksheet.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            WorksheetEvent::WorksheetCreated(e) => e.occurred_at,
            WorksheetEvent::CostComponentsUpdated(e) => e.occurred_at,
            WorksheetEvent::WorksheetLocked(e) => e.occurred_at,
            WorksheetEvent::WorksheetUnlocked(e) => e.occurred_at,
            WorksheetEvent::WorksheetCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for LandingCostWorksheet {
    type Command = WorksheetCommand;
    type Event = WorksheetEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            WorksheetEvent::WorksheetCreated(e) => {
                self.id = e.worksheet_id;
                self.tenant_id = Some(e.tenant_id);
                self.snapshot = Some(e.snapshot.clone());
                self.allocation_method = e.allocation_method;
                self.status = WorksheetStatus::Draft;
                self.created = true;
            }
            WorksheetEvent::CostComponentsUpdated(e) => {
                self.components = e.components.clone();
                self.default_assumptions = e.default_assumptions;
                self.breakdown = Some(e.breakdown.clone());
                self.status = WorksheetStatus::InReview;
            }
            WorksheetEvent::WorksheetLocked(e) => {
                self.status = WorksheetStatus::Locked;
                self.locked_on = Some(e.occurred_at);
            }
            WorksheetEvent::WorksheetUnlocked(_) => {
                self.status = WorksheetStatus::InReview;
                self.locked_on = None;
            }
            WorksheetEvent::WorksheetCancelled(_) => {
                self.status = WorksheetStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            WorksheetCommand::CreateWorksheet(cmd) => self.handle_create(cmd),
            WorksheetCommand::UpdateCostComponents(cmd) => self.handle_update_components(cmd),
            WorksheetCommand::LockWorksheet(cmd) => self.handle_lock(cmd),
            WorksheetCommand::UnlockWorksheet(cmd) => self.handle_unlock(cmd),
            WorksheetCommand::CancelWorksheet(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl LandingCostWorksheet {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_worksheet_id(&self, worksheet_id: LandingCostWorksheetId) -> Result<(), DomainError> {
        if self.id != worksheet_id {
            return Err(DomainError::invariant("worksheet_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateWorksheet) -> Result<Vec<WorksheetEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("worksheet already exists"));
        }

        if cmd.snapshot.items.is_empty() {
            return Err(DomainError::validation(
                "worksheet shipment snapshot has no items",
            ));
        }

        Ok(vec![WorksheetEvent::WorksheetCreated(WorksheetCreated {
            tenant_id: cmd.tenant_id,
            worksheet_id: cmd.worksheet_id,
            snapshot: cmd.snapshot.clone(),
            allocation_method: cmd.allocation_method,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_components(
        &self,
        cmd: &UpdateCostComponents,
    ) -> Result<Vec<WorksheetEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_worksheet_id(cmd.worksheet_id)?;

        match self.status {
            WorksheetStatus::Draft | WorksheetStatus::InReview => {}
            WorksheetStatus::Locked => {
                return Err(DomainError::invariant(
                    "unlock the worksheet before editing cost components",
                ));
            }
            WorksheetStatus::Cancelled => {
                return Err(DomainError::invariant("worksheet is cancelled"));
            }
        }

        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| DomainError::invariant("worksheet has no shipment snapshot"))?;

        let allocation_items: Vec<AllocationItem> = snapshot
            .items
            .iter()
            .map(|item| AllocationItem {
                item_index: item.item_index,
                quantity: item.quantity,
                base_amount_import: item.base_amount_import,
            })
            .collect();

        let breakdown = allocate_costs(
            &allocation_items,
            &cmd.components,
            self.allocation_method,
            &snapshot.shipment_currency,
            &snapshot.worksheet_currency,
            snapshot.shipment_exchange_rate,
        )?;

        Ok(vec![WorksheetEvent::CostComponentsUpdated(
            CostComponentsUpdated {
                tenant_id: cmd.tenant_id,
                worksheet_id: cmd.worksheet_id,
                components: cmd.components.clone(),
                default_assumptions: cmd.default_assumptions,
                breakdown,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_lock(&self, cmd: &LockWorksheet) -> Result<Vec<WorksheetEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_worksheet_id(cmd.worksheet_id)?;

        match self.status {
            WorksheetStatus::InReview => {}
            WorksheetStatus::Draft => {
                return Err(DomainError::invariant(
                    "allocate cost components before locking the worksheet",
                ));
            }
            WorksheetStatus::Locked => {
                return Err(DomainError::conflict("worksheet is already locked"));
            }
            WorksheetStatus::Cancelled => {
                return Err(DomainError::invariant("worksheet is cancelled"));
            }
        }

        Ok(vec![WorksheetEvent::WorksheetLocked(WorksheetLocked {
            tenant_id: cmd.tenant_id,
            worksheet_id: cmd.worksheet_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_unlock(&self, cmd: &UnlockWorksheet) -> Result<Vec<WorksheetEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_worksheet_id(cmd.worksheet_id)?;

        if self.status != WorksheetStatus::Locked {
            return Err(DomainError::invariant("only locked worksheets can be unlocked"));
        }

        Ok(vec![WorksheetEvent::WorksheetUnlocked(WorksheetUnlocked {
            tenant_id: cmd.tenant_id,
            worksheet_id: cmd.worksheet_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelWorksheet) -> Result<Vec<WorksheetEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_worksheet_id(cmd.worksheet_id)?;

        match self.status {
            WorksheetStatus::Cancelled => {
                return Err(DomainError::conflict("worksheet is already cancelled"));
            }
            WorksheetStatus::Locked => {
                return Err(DomainError::invariant(
                    "unlock the worksheet before cancelling it",
                ));
            }
            WorksheetStatus::Draft | WorksheetStatus::InReview => {}
        }

        Ok(vec![WorksheetEvent::WorksheetCancelled(WorksheetCancelled {
            tenant_id: cmd.tenant_id,
            worksheet_id: cmd.worksheet_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{CostBucket, CostScope};

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_worksheet_id() -> LandingCostWorksheetId {
        LandingCostWorksheetId::new(AggregateId::new())
    }

    fn snapshot() -> ShipmentSnapshot {
        ShipmentSnapshot {
            shipment_id: ImportShipmentId::new(AggregateId::new()),
            shipment_currency: "USD".to_string(),
            worksheet_currency: "BDT".to_string(),
            shipment_exchange_rate: Decimal::new(100, 0),
            items: vec![
                SnapshotItem {
                    item_index: 0,
                    product_id: ProductId::new(AggregateId::new()),
                    quantity: Decimal::new(60, 0),
                    base_amount_import: Decimal::new(60_000, 0),
                },
                SnapshotItem {
                    item_index: 1,
                    product_id: ProductId::new(AggregateId::new()),
                    quantity: Decimal::new(40, 0),
                    base_amount_import: Decimal::new(40_000, 0),
                },
            ],
        }
    }

    fn freight() -> CostComponent {
        CostComponent {
            name: "sea freight".to_string(),
            bucket: CostBucket::Foreign,
            scope: CostScope::TotalAmount,
            amount: Decimal::new(5_000, 0),
            percent: None,
            currency: "USD".to_string(),
            exchange_rate: None,
            apply_to_item: None,
        }
    }

    fn created_worksheet(
        tenant_id: TenantId,
        worksheet_id: LandingCostWorksheetId,
    ) -> LandingCostWorksheet {
        let mut worksheet = LandingCostWorksheet::empty(worksheet_id);
        let events = worksheet
            .handle(&WorksheetCommand::CreateWorksheet(CreateWorksheet {
                tenant_id,
                worksheet_id,
                snapshot: snapshot(),
                allocation_method: AllocationMethod::ByValue,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        worksheet.apply(&events[0]);
        worksheet
    }

    fn worksheet_with_costs(
        tenant_id: TenantId,
        worksheet_id: LandingCostWorksheetId,
    ) -> LandingCostWorksheet {
        let mut worksheet = created_worksheet(tenant_id, worksheet_id);
        let events = worksheet
            .handle(&WorksheetCommand::UpdateCostComponents(UpdateCostComponents {
                tenant_id,
                worksheet_id,
                components: vec![freight()],
                default_assumptions: ProfitAssumptions::default(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        worksheet.apply(&events[0]);
        worksheet
    }

    #[test]
    fn update_components_recalculates_and_moves_to_in_review() {
        let tenant_id = test_tenant_id();
        let worksheet_id = test_worksheet_id();
        let worksheet = worksheet_with_costs(tenant_id, worksheet_id);

        assert_eq!(worksheet.status(), WorksheetStatus::InReview);
        let breakdown = worksheet.breakdown().unwrap();
        assert_eq!(breakdown.totals.foreign_import, Decimal::new(5_000, 0));

        let allocations = worksheet.shipment_allocations();
        assert_eq!(allocations.len(), 2);
        // Item 0: 60,000 goods + 3,000 freight.
        assert_eq!(allocations[0].amount, Decimal::new(63_000, 0));
        assert_eq!(allocations[0].amount_local, Decimal::new(6_300_000, 0));
    }

    #[test]
    fn update_components_propagates_engine_errors() {
        let tenant_id = test_tenant_id();
        let worksheet_id = test_worksheet_id();
        let worksheet = created_worksheet(tenant_id, worksheet_id);

        let mut bad = freight();
        bad.currency = "EUR".to_string(); // no rate provided
        let err = worksheet
            .handle(&WorksheetCommand::UpdateCostComponents(UpdateCostComponents {
                tenant_id,
                worksheet_id,
                components: vec![bad],
                default_assumptions: ProfitAssumptions::default(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error from the allocation engine"),
        }
    }

    #[test]
    fn lock_requires_an_allocation() {
        let tenant_id = test_tenant_id();
        let worksheet_id = test_worksheet_id();
        let worksheet = created_worksheet(tenant_id, worksheet_id);

        let err = worksheet
            .handle(&WorksheetCommand::LockWorksheet(LockWorksheet {
                tenant_id,
                worksheet_id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation error for draft lock"),
        }
    }

    #[test]
    fn locked_worksheet_rejects_component_edits_until_unlocked() {
        let tenant_id = test_tenant_id();
        let worksheet_id = test_worksheet_id();
        let mut worksheet = worksheet_with_costs(tenant_id, worksheet_id);

        let events = worksheet
            .handle(&WorksheetCommand::LockWorksheet(LockWorksheet {
                tenant_id,
                worksheet_id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        worksheet.apply(&events[0]);
        assert_eq!(worksheet.status(), WorksheetStatus::Locked);
        assert!(worksheet.locked_on().is_some());

        let update = UpdateCostComponents {
            tenant_id,
            worksheet_id,
            components: vec![freight()],
            default_assumptions: ProfitAssumptions::default(),
            occurred_at: Utc::now(),
        };
        let err = worksheet
            .handle(&WorksheetCommand::UpdateCostComponents(update.clone()))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation error while locked"),
        }

        let events = worksheet
            .handle(&WorksheetCommand::UnlockWorksheet(UnlockWorksheet {
                tenant_id,
                worksheet_id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        worksheet.apply(&events[0]);
        assert_eq!(worksheet.status(), WorksheetStatus::InReview);
        assert!(worksheet.locked_on().is_none());

        assert!(worksheet
            .handle(&WorksheetCommand::UpdateCostComponents(update))
            .is_ok());
    }

    #[test]
    fn cancel_rejected_while_locked() {
        let tenant_id = test_tenant_id();
        let worksheet_id = test_worksheet_id();
        let mut worksheet = worksheet_with_costs(tenant_id, worksheet_id);

        let events = worksheet
            .handle(&WorksheetCommand::LockWorksheet(LockWorksheet {
                tenant_id,
                worksheet_id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        worksheet.apply(&events[0]);

        let err = worksheet
            .handle(&WorksheetCommand::CancelWorksheet(CancelWorksheet {
                tenant_id,
                worksheet_id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation error for cancel while locked"),
        }
    }
}
