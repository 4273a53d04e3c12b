//! Logistics domain module (gate passes, loading orders, delivery notes).
//!
//! These documents close out the sales pipeline: a gate pass authorizes the
//! vehicle, a loading order tracks the physical loading, and the delivery
//! note issues the reserved stock and completes the order.

pub mod delivery_note;
pub mod gate_pass;
pub mod loading_order;

pub use delivery_note::{
    CancelDeliveryNote, ConfirmDelivery, CreateDeliveryNote, DeliveryConfirmed, DeliveryIssuance,
    DeliveryNote, DeliveryNoteCancelled, DeliveryNoteCommand, DeliveryNoteCreated,
    DeliveryNoteEvent, DeliveryNoteId, DeliveryNoteLine, DeliveryNoteSubmitted, DeliveryStatus,
    SubmitDeliveryNote,
};
pub use gate_pass::{
    CancelGatePass, CloseGatePass, CreateGatePass, GatePass, GatePassCancelled, GatePassClosed,
    GatePassCommand, GatePassCreated, GatePassEvent, GatePassId, GatePassIssued, GatePassLine,
    GatePassReopened, GatePassStatus, IssueGatePass, ReopenGatePass,
};
pub use loading_order::{
    CancelLoadingOrder, CompleteLoading, CreateLoadingOrder, LoadingCompleted, LoadingOrder,
    LoadingOrderCancelled, LoadingOrderCommand, LoadingOrderCreated, LoadingOrderEvent,
    LoadingOrderId, LoadingStarted, LoadingStatus, StartLoading,
};
