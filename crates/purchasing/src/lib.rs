//! Purchasing domain module (purchase orders, event-sourced).
//!
//! A purchase order is the upstream commercial agreement that import
//! shipments draw down against. Receipts flow back from shipment clearance
//! and drive the order's fulfilment status.

pub mod order;

pub use order::{
    CancelPurchaseOrder, CreatePurchaseOrder, LineReceipt, PendingLine, PoStatus, PurchaseOrder,
    PurchaseOrderCancelled, PurchaseOrderCommand, PurchaseOrderCreated, PurchaseOrderEvent,
    PurchaseOrderId, PurchaseOrderLine, PurchaseOrderSubmitted, ReceiptRecorded, ReceiptReverted,
    RecordReceipt, RevertReceipt, SubmitPurchaseOrder,
};
