//! Projections (read model builders).
//!
//! Projections consume published envelopes and maintain query-optimized,
//! tenant-isolated read models. They are idempotent under at-least-once
//! delivery and can always be rebuilt from the event store.

pub mod cursor_store;
pub mod daily_sales;
pub mod dashboard;
pub mod import_shipments;
pub mod sales_orders;
pub mod stock_balance;

pub use cursor_store::StreamCursors;
pub use daily_sales::{DailySalesProjection, DailySalesRow, InvoiceRow};
pub use dashboard::{DashboardQuery, DashboardSummary};
pub use import_shipments::{ImportShipmentsProjection, ShipmentRow};
pub use sales_orders::{SalesOrderSummary, SalesOrdersProjection};
pub use stock_balance::{
    EntryBalances, EntryLineBalance, StockBalanceFilter, StockBalanceProjection, StockBalanceRow,
};

use thiserror::Error;

/// Shared failure type for projection appliers.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    /// A panic while a lock was held left shared projection state unusable.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}
