use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use plasticflow_catalog::ProductId;
use plasticflow_core::AggregateId;
use plasticflow_parties::PartyId;
use plasticflow_purchasing::{CreatePurchaseOrder, PurchaseOrder, PurchaseOrderId};

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_purchase_order))
        .route("/:id", get(get_purchase_order))
        .route("/:id/submit", post(submit_purchase_order))
        .route("/:id/cancel", post(cancel_purchase_order))
}

pub async fn create_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreatePurchaseOrderRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let supplier = match common::parse_id(&body.supplier_id, "supplier") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let mut lines = Vec::with_capacity(body.lines.len());
    for line in &body.lines {
        let product = match common::parse_id(&line.product_id, "product") {
            Ok(v) => v,
            Err(r) => return r,
        };
        lines.push((ProductId::new(product), line.uom.clone(), line.quantity, line.rate));
    }

    let cmd = CreatePurchaseOrder {
        tenant_id: tenant.tenant_id(),
        purchase_order_id: PurchaseOrderId::new(agg),
        supplier_id: PartyId::new(supplier),
        purchase_currency: body.purchase_currency,
        local_currency: body.local_currency,
        exchange_rate: body.exchange_rate,
        order_date: body.order_date,
        expected_shipment: body.expected_shipment,
        lines,
        occurred_at: Utc::now(),
    };

    let committed = match services.engine().create_purchase_order(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn get_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "purchase order") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let po = match services.engine().dispatcher().load(
        tenant.tenant_id(),
        agg,
        |_t, aggregate_id| PurchaseOrder::empty(PurchaseOrderId::new(aggregate_id)),
    ) {
        Ok(p) => p,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    if po.tenant_id().is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "purchase order not found");
    }

    Json(dto::purchase_order_to_json(&po)).into_response()
}

pub async fn submit_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "purchase order") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let committed = match services
        .engine()
        .submit_purchase_order(tenant.tenant_id(), PurchaseOrderId::new(agg))
    {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn cancel_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "purchase order") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let committed = match services
        .engine()
        .cancel_purchase_order(tenant.tenant_id(), PurchaseOrderId::new(agg))
    {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}
