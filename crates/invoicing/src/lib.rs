//! Invoicing domain module (invoices, event-sourced).
//!
//! Invoices are issued against submitted sales orders for at most the order's
//! outstanding amount, with lines built proportionally from the order lines.

pub mod invoice;
pub mod lines;

pub use invoice::{
    CancelInvoice, Invoice, InvoiceCancelled, InvoiceCommand, InvoiceEvent, InvoiceId,
    InvoiceIssued, InvoicePaymentRecorded, InvoiceStatus, IssueInvoice, RecordInvoicePayment,
};
pub use lines::{InvoiceLine, build_invoice_lines};
