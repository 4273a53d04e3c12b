//! Inventory domain module: the stock ledger, stock entry lots, FIFO
//! reservation policy, and manual adjustments.
//!
//! The ledger is the balance book (per-slot available/reserved/issued);
//! stock entries are the event-sourced lot records that feed it. Cross-lot
//! rules (availability checks, FIFO, adjustment planning) are pure functions
//! the workflow layer runs against the read model before dispatching.

pub mod adjustment;
pub mod entry;
pub mod fifo;
pub mod ledger;

pub use adjustment::{
    AdjustmentAllocation, AdjustmentApplied, AdjustmentBatch, AdjustmentCancelled,
    AdjustmentStatus, ApplyStockAdjustment, CancelStockAdjustment, StockAdjustment,
    StockAdjustmentCommand, StockAdjustmentEvent, StockAdjustmentId, plan_adjustment,
};
pub use entry::{
    AdjustReceivedQty, CancelStockEntry, EntryItemInput, EntryStatus, IssueReversed, IssueStock,
    LandedCostLine, LandedCostsUpdated, MoveToWarehouse, MovedToWarehouse, ReceiveFromShipment,
    ReceivedQtyAdjusted, ReleaseStock, ReserveStock, ReverseIssue, StockEntry,
    StockEntryCancelled, StockEntryCommand, StockEntryEvent, StockEntryId, StockEntryItem,
    StockEntryReceived, StockIssued, StockReleased, StockReserved, UpdateLandedCosts,
};
pub use fifo::{BatchSummary, FifoPolicy, ensure_fifo};
pub use ledger::{
    BalanceDelta, LocationKind, SlotBalances, SlotKey, SlotUpdate, StockLedger, StockLocation,
};
