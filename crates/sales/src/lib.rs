//! Sales domain module (sales orders and proforma invoices, event-sourced).
//!
//! A sales order reserves stock against batches, tracks cash payment slips,
//! accumulates invoicing progress, and gates delivery behind a gate pass. A
//! proforma invoice is a VAT-bearing quotation that converts into a draft
//! sales order.

pub mod order;
pub mod proforma;

pub use order::{
    AddPaymentSlip, AttachGatePass, BatchRef, CancelSalesOrder, CompleteDelivery,
    CreateSalesOrder, DeliveryCompleted, DeliveryReversed, DeliverySource, GatePassAttached,
    InvoicingProgressRecorded, OrderStatus, PaymentSlip, PaymentSlipAdded,
    RecordInvoicingProgress, ReverseDelivery, SalesOrder, SalesOrderCancelled, SalesOrderCommand,
    SalesOrderCreated, SalesOrderEvent, SalesOrderId, SalesOrderLine, SalesOrderLineInput,
    SalesOrderSubmitted, SalesType, SubmitSalesOrder,
};
pub use proforma::{
    CancelProformaInvoice, CreateProformaInvoice, MarkProformaConverted, ProformaInvoice,
    ProformaInvoiceCancelled, ProformaInvoiceCommand, ProformaInvoiceConverted,
    ProformaInvoiceCreated, ProformaInvoiceEvent, ProformaInvoiceId, ProformaInvoiceSubmitted,
    ProformaLine, ProformaLineInput, ProformaStatus, SubmitProformaInvoice,
};
