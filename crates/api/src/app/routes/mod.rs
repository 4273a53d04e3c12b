use axum::{routing::get, Router};

pub mod catalog;
pub mod common;
pub mod invoices;
pub mod logistics;
pub mod parties;
pub mod purchases;
pub mod reports;
pub mod sales;
pub mod shipments;
pub mod stock;
pub mod system;
pub mod worksheets;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/parties", parties::router())
        .nest("/products", catalog::products_router())
        .nest("/warehouses", catalog::warehouses_router())
        .nest("/purchase-orders", purchases::router())
        .nest("/shipments", shipments::router())
        .nest("/worksheets", worksheets::router())
        .nest("/stock", stock::router())
        .nest("/sales", sales::router())
        .nest("/invoices", invoices::router())
        .nest("/logistics", logistics::router())
        .nest("/reports", reports::router())
}
