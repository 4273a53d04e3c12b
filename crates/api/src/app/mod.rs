//! Router assembly and service wiring.
//!
//! Layout: `services.rs` builds the store/bus/engine/projection graph,
//! `routes/` holds one handler module per domain area, `dto.rs` the request
//! bodies and JSON mappers, `errors.rs` the dispatch-error-to-status mapping.

use std::sync::Arc;

use axum::{Extension, Router, routing::get};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Assemble the full application router. `/health` stays open; everything
/// else requires a tenant header.
pub fn build_app() -> Router {
    let services = Arc::new(services::build_services());

    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::tenant_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
