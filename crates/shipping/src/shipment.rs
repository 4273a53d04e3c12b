use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plasticflow_catalog::{ProductId, Unit, WarehouseId};
use plasticflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use plasticflow_events::Event;
use plasticflow_parties::PartyId;
use plasticflow_purchasing::PurchaseOrderId;

/// Import shipment identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportShipmentId(pub AggregateId);

impl ImportShipmentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ImportShipmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Customs clearance state machine.
///
/// `InTransit -> Cleared -> AtWarehouse`, with rollback to `InTransit`
/// allowed from either final state (amended declarations happen).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearanceStatus {
    InTransit,
    Cleared,
    AtWarehouse,
}

impl ClearanceStatus {
    pub fn is_final(self) -> bool {
        matches!(self, ClearanceStatus::Cleared | ClearanceStatus::AtWarehouse)
    }
}

/// One shipped line, tied back to a purchase order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub po_line_index: usize,
    pub product_id: ProductId,
    pub uom: Unit,
    pub quantity: Decimal,
    /// Rate per UOM in the shipment (purchase) currency.
    pub base_rate: Decimal,
    /// quantity * base_rate, in the shipment currency.
    pub base_amount: Decimal,
    /// Landed cost allocated by the worksheet, shipment currency.
    pub landed_cost_amount: Decimal,
    /// Landed cost allocated by the worksheet, local currency.
    pub landed_cost_amount_local: Decimal,
}

impl ShipmentItem {
    pub fn landed_cost_rate(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.landed_cost_amount / self.quantity
        }
    }

    pub fn landed_cost_rate_local(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.landed_cost_amount_local / self.quantity
        }
    }
}

/// Line input when drafting a shipment from a purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentItemInput {
    pub po_line_index: usize,
    pub product_id: ProductId,
    pub uom: Unit,
    pub quantity: Decimal,
    pub base_rate: Decimal,
}

/// Landed cost figures for one shipment item, produced by the worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandedCostAllocation {
    pub item_index: usize,
    pub amount: Decimal,
    pub amount_local: Decimal,
}

/// Aggregate root: ImportShipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportShipment {
    id: ImportShipmentId,
    tenant_id: Option<TenantId>,
    purchase_order_id: Option<PurchaseOrderId>,
    supplier_id: Option<PartyId>,
    currency: String,
    local_currency: String,
    exchange_rate: Decimal,
    shipment_date: Option<NaiveDate>,
    expected_arrival: Option<NaiveDate>,
    arrival_date: Option<NaiveDate>,
    destination_warehouse: Option<WarehouseId>,
    clearance_status: ClearanceStatus,
    cleared_on: Option<NaiveDate>,
    items: Vec<ShipmentItem>,
    /// Worksheet currently holding the landed cost allocation, if locked.
    landed_cost_worksheet: Option<AggregateId>,
    cancelled: bool,
    version: u64,
    created: bool,
}

impl ImportShipment {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ImportShipmentId) -> Self {
        Self {
            id,
            tenant_id: None,
            purchase_order_id: None,
            supplier_id: None,
            currency: String::new(),
            local_currency: String::new(),
            exchange_rate: Decimal::ONE,
            shipment_date: None,
            expected_arrival: None,
            arrival_date: None,
            destination_warehouse: None,
            clearance_status: ClearanceStatus::InTransit,
            cleared_on: None,
            items: Vec::new(),
            landed_cost_worksheet: None,
            cancelled: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ImportShipmentId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn purchase_order_id(&self) -> Option<PurchaseOrderId> {
        self.purchase_order_id
    }

    pub fn supplier_id(&self) -> Option<PartyId> {
        self.supplier_id
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn local_currency(&self) -> &str {
        &self.local_currency
    }

    pub fn exchange_rate(&self) -> Decimal {
        self.exchange_rate
    }

    pub fn arrival_date(&self) -> Option<NaiveDate> {
        self.arrival_date
    }

    pub fn destination_warehouse(&self) -> Option<WarehouseId> {
        self.destination_warehouse
    }

    pub fn clearance_status(&self) -> ClearanceStatus {
        self.clearance_status
    }

    pub fn cleared_on(&self) -> Option<NaiveDate> {
        self.cleared_on
    }

    pub fn items(&self) -> &[ShipmentItem] {
        &self.items
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn landed_cost_worksheet(&self) -> Option<AggregateId> {
        self.landed_cost_worksheet
    }

    pub fn landed_costs_locked(&self) -> bool {
        self.landed_cost_worksheet.is_some()
    }

    pub fn total_quantity(&self) -> Decimal {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Declared goods value in the shipment currency (CIF basis).
    pub fn total_shipment_amount(&self) -> Decimal {
        self.items.iter().map(|i| i.base_amount).sum()
    }

    pub fn total_landed_cost(&self) -> Decimal {
        self.items.iter().map(|i| i.landed_cost_amount).sum()
    }

    pub fn total_landed_cost_local(&self) -> Decimal {
        self.items.iter().map(|i| i.landed_cost_amount_local).sum()
    }

    pub fn per_unit_landed_cost(&self) -> Decimal {
        let qty = self.total_quantity();
        if qty.is_zero() {
            Decimal::ZERO
        } else {
            self.total_landed_cost() / qty
        }
    }

    pub fn per_unit_landed_cost_local(&self) -> Decimal {
        let qty = self.total_quantity();
        if qty.is_zero() {
            Decimal::ZERO
        } else {
            self.total_landed_cost_local() / qty
        }
    }
}

impl AggregateRoot for ImportShipment {
    type Id = ImportShipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateImportShipment.
///
/// The workflow layer drafts items from the purchase order's pending lines
/// and guards against over-allocation across sibling shipments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateImportShipment {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    pub purchase_order_id: PurchaseOrderId,
    pub supplier_id: PartyId,
    pub currency: String,
    pub local_currency: String,
    pub exchange_rate: Decimal,
    pub shipment_date: Option<NaiveDate>,
    pub expected_arrival: Option<NaiveDate>,
    pub items: Vec<ShipmentItemInput>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetDestinationWarehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDestinationWarehouse {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkCleared (customs released the goods).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkCleared {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    pub cleared_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkAtWarehouse (goods moved into the destination warehouse).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkAtWarehouse {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    /// Overrides the stored destination when provided.
    pub warehouse_id: Option<WarehouseId>,
    pub arrival_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RollbackClearance (declaration amended; goods back at customs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackClearance {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyLandedCosts (worksheet locks its allocation in).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyLandedCosts {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    pub worksheet_id: AggregateId,
    pub allocations: Vec<LandedCostAllocation>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseLandedCosts (worksheet unlocked for revision).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseLandedCosts {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    pub worksheet_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelImportShipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelImportShipment {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportShipmentCommand {
    CreateImportShipment(CreateImportShipment),
    SetDestinationWarehouse(SetDestinationWarehouse),
    MarkCleared(MarkCleared),
    MarkAtWarehouse(MarkAtWarehouse),
    RollbackClearance(RollbackClearance),
    ApplyLandedCosts(ApplyLandedCosts),
    ReleaseLandedCosts(ReleaseLandedCosts),
    CancelImportShipment(CancelImportShipment),
}

/// Event: ImportShipmentCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportShipmentCreated {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    pub purchase_order_id: PurchaseOrderId,
    pub supplier_id: PartyId,
    pub currency: String,
    pub local_currency: String,
    pub exchange_rate: Decimal,
    pub shipment_date: Option<NaiveDate>,
    pub expected_arrival: Option<NaiveDate>,
    pub items: Vec<ShipmentItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DestinationWarehouseSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationWarehouseSet {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ShipmentCleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentCleared {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    pub cleared_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ShipmentAtWarehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentAtWarehouse {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    pub warehouse_id: WarehouseId,
    pub arrival_date: NaiveDate,
    /// Stamped here when the shipment skipped the explicit Cleared step.
    pub cleared_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ClearanceRolledBack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearanceRolledBack {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LandedCostsApplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandedCostsApplied {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    pub worksheet_id: AggregateId,
    pub allocations: Vec<LandedCostAllocation>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LandedCostsReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandedCostsReleased {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    pub worksheet_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ImportShipmentCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportShipmentCancelled {
    pub tenant_id: TenantId,
    pub shipment_id: ImportShipmentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportShipmentEvent {
    ImportShipmentCreated(ImportShipmentCreated),
    DestinationWarehouseSet(DestinationWarehouseSet),
    ShipmentCleared(ShipmentCleared),
    ShipmentAtWarehouse(ShipmentAtWarehouse),
    ClearanceRolledBack(ClearanceRolledBack),
    LandedCostsApplied(LandedCostsApplied),
    LandedCostsReleased(LandedCostsReleased),
    ImportShipmentCancelled(ImportShipmentCancelled),
}

impl Event for ImportShipmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ImportShipmentEvent::ImportShipmentCreated(_) => "shipping.shipment.created",
            ImportShipmentEvent::DestinationWarehouseSet(_) => "shipping.shipment.destination_set",
            ImportShipmentEvent::ShipmentCleared(_) => "shipping.shipment.cleared",
            ImportShipmentEvent::ShipmentAtWarehouse(_) => "shipping.shipment.at_warehouse",
            ImportShipmentEvent::ClearanceRolledBack(_) => "shipping.shipment.clearance_rolled_back",
            ImportShipmentEvent::LandedCostsApplied(_) => "shipping.shipment.landed_costs_applied",
            ImportShipmentEvent::LandedCostsReleased(_) => "shipping.shipment.landed_costs_released",
            ImportShipmentEvent::ImportShipmentCancelled(_) => "shipping.shipment.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ImportShipmentEvent::ImportShipmentCreated(e) => e.occurred_at,
            ImportShipmentEvent::DestinationWarehouseSet(e) => e.occurred_at,
            ImportShipmentEvent::ShipmentCleared(e) => e.occurred_at,
            ImportShipmentEvent::ShipmentAtWarehouse(e) => e.occurred_at,
            ImportShipmentEvent::ClearanceRolledBack(e) => e.occurred_at,
            ImportShipmentEvent::LandedCostsApplied(e) => e.occurred_at,
            ImportShipmentEvent::LandedCostsReleased(e) => e.occurred_at,
            ImportShipmentEvent::ImportShipmentCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ImportShipment {
    type Command = ImportShipmentCommand;
    type Event = ImportShipmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ImportShipmentEvent::ImportShipmentCreated(e) => {
                self.id = e.shipment_id;
                self.tenant_id = Some(e.tenant_id);
                self.purchase_order_id = Some(e.purchase_order_id);
                self.supplier_id = Some(e.supplier_id);
                self.currency = e.currency.clone();
                self.local_currency = e.local_currency.clone();
                self.exchange_rate = e.exchange_rate;
                self.shipment_date = e.shipment_date;
                self.expected_arrival = e.expected_arrival;
                self.items = e.items.clone();
                self.clearance_status = ClearanceStatus::InTransit;
                self.created = true;
            }
            ImportShipmentEvent::DestinationWarehouseSet(e) => {
                self.destination_warehouse = Some(e.warehouse_id);
            }
            ImportShipmentEvent::ShipmentCleared(e) => {
                self.clearance_status = ClearanceStatus::Cleared;
                self.cleared_on = Some(e.cleared_on);
            }
            ImportShipmentEvent::ShipmentAtWarehouse(e) => {
                self.clearance_status = ClearanceStatus::AtWarehouse;
                self.destination_warehouse = Some(e.warehouse_id);
                self.arrival_date = Some(e.arrival_date);
                if self.cleared_on.is_none() {
                    self.cleared_on = Some(e.cleared_on);
                }
            }
            ImportShipmentEvent::ClearanceRolledBack(_) => {
                self.clearance_status = ClearanceStatus::InTransit;
                self.cleared_on = None;
                self.arrival_date = None;
            }
            ImportShipmentEvent::LandedCostsApplied(e) => {
                for allocation in &e.allocations {
                    if let Some(item) = self.items.get_mut(allocation.item_index) {
                        item.landed_cost_amount = allocation.amount;
                        item.landed_cost_amount_local = allocation.amount_local;
                    }
                }
                self.landed_cost_worksheet = Some(e.worksheet_id);
            }
            ImportShipmentEvent::LandedCostsReleased(_) => {
                for item in &mut self.items {
                    item.landed_cost_amount = Decimal::ZERO;
                    item.landed_cost_amount_local = Decimal::ZERO;
                }
                self.landed_cost_worksheet = None;
            }
            ImportShipmentEvent::ImportShipmentCancelled(_) => {
                self.cancelled = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ImportShipmentCommand::CreateImportShipment(cmd) => self.handle_create(cmd),
            ImportShipmentCommand::SetDestinationWarehouse(cmd) => self.handle_set_destination(cmd),
            ImportShipmentCommand::MarkCleared(cmd) => self.handle_mark_cleared(cmd),
            ImportShipmentCommand::MarkAtWarehouse(cmd) => self.handle_mark_at_warehouse(cmd),
            ImportShipmentCommand::RollbackClearance(cmd) => self.handle_rollback(cmd),
            ImportShipmentCommand::ApplyLandedCosts(cmd) => self.handle_apply_landed_costs(cmd),
            ImportShipmentCommand::ReleaseLandedCosts(cmd) => self.handle_release_landed_costs(cmd),
            ImportShipmentCommand::CancelImportShipment(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl ImportShipment {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_shipment_id(&self, shipment_id: ImportShipmentId) -> Result<(), DomainError> {
        if self.id != shipment_id {
            return Err(DomainError::invariant("shipment_id mismatch"));
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.cancelled {
            return Err(DomainError::invariant("shipment is cancelled"));
        }
        Ok(())
    }

    fn handle_create(
        &self,
        cmd: &CreateImportShipment,
    ) -> Result<Vec<ImportShipmentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("import shipment already exists"));
        }

        if cmd.items.is_empty() {
            return Err(DomainError::validation(
                "import shipment must have at least one item",
            ));
        }

        if cmd.exchange_rate <= Decimal::ZERO {
            return Err(DomainError::validation("exchange rate must be positive"));
        }

        let mut items = Vec::with_capacity(cmd.items.len());
        for input in &cmd.items {
            if input.quantity <= Decimal::ZERO {
                return Err(DomainError::validation("item quantity must be positive"));
            }
            if input.base_rate < Decimal::ZERO {
                return Err(DomainError::validation("item rate cannot be negative"));
            }
            items.push(ShipmentItem {
                po_line_index: input.po_line_index,
                product_id: input.product_id,
                uom: input.uom.clone(),
                quantity: input.quantity,
                base_rate: input.base_rate,
                base_amount: input.quantity * input.base_rate,
                landed_cost_amount: Decimal::ZERO,
                landed_cost_amount_local: Decimal::ZERO,
            });
        }

        Ok(vec![ImportShipmentEvent::ImportShipmentCreated(
            ImportShipmentCreated {
                tenant_id: cmd.tenant_id,
                shipment_id: cmd.shipment_id,
                purchase_order_id: cmd.purchase_order_id,
                supplier_id: cmd.supplier_id,
                currency: cmd.currency.trim().to_uppercase(),
                local_currency: cmd.local_currency.trim().to_uppercase(),
                exchange_rate: cmd.exchange_rate,
                shipment_date: cmd.shipment_date,
                expected_arrival: cmd.expected_arrival,
                items,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_set_destination(
        &self,
        cmd: &SetDestinationWarehouse,
    ) -> Result<Vec<ImportShipmentEvent>, DomainError> {
        self.ensure_active()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        if self.destination_warehouse == Some(cmd.warehouse_id) {
            return Err(DomainError::conflict("destination warehouse is unchanged"));
        }

        Ok(vec![ImportShipmentEvent::DestinationWarehouseSet(
            DestinationWarehouseSet {
                tenant_id: cmd.tenant_id,
                shipment_id: cmd.shipment_id,
                warehouse_id: cmd.warehouse_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_mark_cleared(
        &self,
        cmd: &MarkCleared,
    ) -> Result<Vec<ImportShipmentEvent>, DomainError> {
        self.ensure_active()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        match self.clearance_status {
            ClearanceStatus::InTransit => {}
            ClearanceStatus::Cleared => {
                return Err(DomainError::conflict("shipment is already cleared"));
            }
            ClearanceStatus::AtWarehouse => {
                return Err(DomainError::invariant(
                    "shipment is already at the warehouse",
                ));
            }
        }

        Ok(vec![ImportShipmentEvent::ShipmentCleared(ShipmentCleared {
            tenant_id: cmd.tenant_id,
            shipment_id: cmd.shipment_id,
            cleared_on: cmd.cleared_on,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_at_warehouse(
        &self,
        cmd: &MarkAtWarehouse,
    ) -> Result<Vec<ImportShipmentEvent>, DomainError> {
        self.ensure_active()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        if self.clearance_status == ClearanceStatus::AtWarehouse {
            return Err(DomainError::conflict(
                "shipment is already at the warehouse",
            ));
        }

        let warehouse_id = cmd
            .warehouse_id
            .or(self.destination_warehouse)
            .ok_or_else(|| {
                DomainError::invariant(
                    "destination warehouse is required before marking the shipment at warehouse",
                )
            })?;

        Ok(vec![ImportShipmentEvent::ShipmentAtWarehouse(
            ShipmentAtWarehouse {
                tenant_id: cmd.tenant_id,
                shipment_id: cmd.shipment_id,
                warehouse_id,
                arrival_date: cmd.arrival_date,
                cleared_on: self.cleared_on.unwrap_or(cmd.arrival_date),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_rollback(
        &self,
        cmd: &RollbackClearance,
    ) -> Result<Vec<ImportShipmentEvent>, DomainError> {
        self.ensure_active()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        if !self.clearance_status.is_final() {
            return Err(DomainError::invariant(
                "only cleared shipments can be rolled back",
            ));
        }

        Ok(vec![ImportShipmentEvent::ClearanceRolledBack(
            ClearanceRolledBack {
                tenant_id: cmd.tenant_id,
                shipment_id: cmd.shipment_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_apply_landed_costs(
        &self,
        cmd: &ApplyLandedCosts,
    ) -> Result<Vec<ImportShipmentEvent>, DomainError> {
        self.ensure_active()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        if let Some(current) = self.landed_cost_worksheet {
            if current != cmd.worksheet_id {
                return Err(DomainError::conflict(
                    "another worksheet already holds the landed cost allocation",
                ));
            }
        }

        for allocation in &cmd.allocations {
            if allocation.item_index >= self.items.len() {
                return Err(DomainError::validation(
                    "allocation references unknown shipment item",
                ));
            }
            if allocation.amount < Decimal::ZERO || allocation.amount_local < Decimal::ZERO {
                return Err(DomainError::validation(
                    "landed cost amounts cannot be negative",
                ));
            }
        }

        Ok(vec![ImportShipmentEvent::LandedCostsApplied(
            LandedCostsApplied {
                tenant_id: cmd.tenant_id,
                shipment_id: cmd.shipment_id,
                worksheet_id: cmd.worksheet_id,
                allocations: cmd.allocations.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_release_landed_costs(
        &self,
        cmd: &ReleaseLandedCosts,
    ) -> Result<Vec<ImportShipmentEvent>, DomainError> {
        self.ensure_active()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        match self.landed_cost_worksheet {
            None => {
                return Err(DomainError::invariant("no landed cost allocation to release"));
            }
            Some(current) if current != cmd.worksheet_id => {
                return Err(DomainError::conflict(
                    "a different worksheet holds the landed cost allocation",
                ));
            }
            Some(_) => {}
        }

        Ok(vec![ImportShipmentEvent::LandedCostsReleased(
            LandedCostsReleased {
                tenant_id: cmd.tenant_id,
                shipment_id: cmd.shipment_id,
                worksheet_id: cmd.worksheet_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_cancel(
        &self,
        cmd: &CancelImportShipment,
    ) -> Result<Vec<ImportShipmentEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_shipment_id(cmd.shipment_id)?;

        if self.cancelled {
            return Err(DomainError::conflict("shipment is already cancelled"));
        }

        if self.landed_costs_locked() {
            return Err(DomainError::invariant(
                "release the landed cost worksheet before cancelling the shipment",
            ));
        }

        Ok(vec![ImportShipmentEvent::ImportShipmentCancelled(
            ImportShipmentCancelled {
                tenant_id: cmd.tenant_id,
                shipment_id: cmd.shipment_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
