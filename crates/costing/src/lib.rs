//! Costing domain module (landed cost worksheets, event-sourced).
//!
//! The worksheet aggregates logistics cost components against an import
//! shipment and allocates a landed cost to every shipped item. Foreign and
//! local costs are spread first; percentage taxes then apply on top of the
//! accumulated base, so a percent-of-landed-cost tax sees goods value plus
//! all non-tax costs.

pub mod allocation;
pub mod component;
pub mod summary;
pub mod worksheet;

pub use allocation::{
    AllocationItem, CostBreakdown, CostTotals, ItemCostBreakdown, allocate_costs,
};
pub use component::{
    AllocationMethod, CostBucket, CostComponent, CostScope, default_tax_components,
    tax_percent_for,
};
pub use summary::{ProfitAssumptions, ProductProfitSummary, build_product_summaries};
pub use worksheet::{
    CancelWorksheet, CostComponentsUpdated, CreateWorksheet, LandingCostWorksheet,
    LandingCostWorksheetId, LockWorksheet, ShipmentSnapshot, SnapshotItem, UnlockWorksheet,
    UpdateCostComponents, WorksheetCancelled, WorksheetCommand, WorksheetCreated, WorksheetEvent,
    WorksheetLocked, WorksheetStatus, WorksheetUnlocked,
};
