//! Shipping domain module (import shipments, event-sourced).
//!
//! An import shipment tracks goods from the supplier through customs
//! clearance to a destination warehouse. Its clearance transitions drive
//! stock entry creation and ledger updates in the workflow layer.

pub mod shipment;

pub use shipment::{
    ApplyLandedCosts, CancelImportShipment, ClearanceRolledBack, ClearanceStatus,
    CreateImportShipment, DestinationWarehouseSet, ImportShipment, ImportShipmentCancelled,
    ImportShipmentCommand, ImportShipmentCreated, ImportShipmentEvent, ImportShipmentId,
    LandedCostAllocation, LandedCostsApplied, LandedCostsReleased, MarkAtWarehouse, MarkCleared,
    ReleaseLandedCosts, RollbackClearance, SetDestinationWarehouse, ShipmentAtWarehouse,
    ShipmentCleared, ShipmentItem, ShipmentItemInput,
};
