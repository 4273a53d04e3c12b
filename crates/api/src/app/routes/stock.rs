use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use plasticflow_catalog::{ProductId, WarehouseId};
use plasticflow_core::AggregateId;
use plasticflow_infra::projections::StockBalanceFilter;
use plasticflow_infra::workflow::AdjustmentRequest;
use plasticflow_inventory::{StockAdjustmentId, StockEntryId};

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/balance", get(stock_balance))
        .route("/entries", get(list_entries))
        .route("/entries/:id", get(get_entry))
        .route("/adjustments", post(apply_adjustment))
        .route("/adjustments/:id/cancel", post(cancel_adjustment))
}

#[derive(Debug, Deserialize)]
pub struct StockBalanceParams {
    pub product: Option<String>,
    pub warehouse: Option<String>,
    pub at_customs: Option<bool>,
}

pub async fn stock_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Query(params): Query<StockBalanceParams>,
) -> axum::response::Response {
    let product = match params.product.as_deref() {
        Some(raw) => match common::parse_id(raw, "product") {
            Ok(v) => Some(ProductId::new(v)),
            Err(r) => return r,
        },
        None => None,
    };
    let warehouse = match params.warehouse.as_deref() {
        Some(raw) => match common::parse_id(raw, "warehouse") {
            Ok(v) => Some(WarehouseId::new(v)),
            Err(r) => return r,
        },
        None => None,
    };

    let filter = StockBalanceFilter {
        product,
        warehouse,
        at_customs: params.at_customs,
    };

    let rows = services.stock().stock_balance(tenant.tenant_id(), &filter);

    Json(serde_json::json!({
        "rows": rows.iter().map(dto::stock_balance_row_to_json).collect::<Vec<_>>(),
    }))
    .into_response()
}

pub async fn list_entries(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let entries = services.stock().list(tenant.tenant_id());

    Json(serde_json::json!({
        "entries": entries.iter().map(dto::entry_balances_to_json).collect::<Vec<_>>(),
    }))
    .into_response()
}

pub async fn get_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "stock entry") {
        Ok(v) => v,
        Err(r) => return r,
    };

    match services
        .stock()
        .get(tenant.tenant_id(), &StockEntryId::new(agg))
    {
        Some(entry) => Json(dto::entry_balances_to_json(&entry)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "stock entry not found"),
    }
}

pub async fn apply_adjustment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::StockAdjustmentRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let product = match common::parse_id(&body.product_id, "product") {
        Ok(v) => v,
        Err(r) => return r,
    };
    let warehouse = match body.warehouse_id.as_deref() {
        Some(raw) => match common::parse_id(raw, "warehouse") {
            Ok(v) => Some(WarehouseId::new(v)),
            Err(r) => return r,
        },
        None => None,
    };

    let request = AdjustmentRequest {
        tenant_id: tenant.tenant_id(),
        adjustment_id: StockAdjustmentId::new(agg),
        product_id: ProductId::new(product),
        location_kind: body.location,
        warehouse,
        quantity_delta: body.quantity_delta,
        posting_date: body.posting_date,
    };

    let allocations = match services.engine().apply_stock_adjustment(request) {
        Ok(a) => a,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "allocations": allocations.iter().map(|a| serde_json::json!({
                "entry_id": a.entry_id.to_string(),
                "line_index": a.line_index,
                "quantity_delta": a.quantity_delta,
            })).collect::<Vec<_>>(),
        })),
    )
        .into_response()
}

pub async fn cancel_adjustment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "adjustment") {
        Ok(v) => v,
        Err(r) => return r,
    };

    if let Err(e) = services
        .engine()
        .cancel_stock_adjustment(tenant.tenant_id(), StockAdjustmentId::new(agg))
    {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string()})),
    )
        .into_response()
}
