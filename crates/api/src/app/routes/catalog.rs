use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use plasticflow_catalog::{
    ArchiveProduct, CreateProduct, CreateWarehouse, Product, ProductId, Warehouse, WarehouseId,
};
use plasticflow_core::AggregateId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn products_router() -> Router {
    Router::new()
        .route("/", post(create_product))
        .route("/:id", get(get_product))
        .route("/:id/archive", post(archive_product))
}

pub fn warehouses_router() -> Router {
    Router::new()
        .route("/", post(create_warehouse))
        .route("/:id", get(get_warehouse))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let cmd = CreateProduct {
        tenant_id: tenant.tenant_id(),
        product_id: ProductId::new(agg),
        item_code: body.item_code,
        name: body.name,
        uom: body.uom,
        occurred_at: Utc::now(),
    };

    let committed = match services.engine().create_product(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "product") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let product = match services.engine().dispatcher().load(
        tenant.tenant_id(),
        agg,
        |_t, aggregate_id| Product::empty(ProductId::new(aggregate_id)),
    ) {
        Ok(p) => p,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    if product.tenant_id().is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found");
    }

    Json(dto::product_to_json(&product)).into_response()
}

pub async fn archive_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "product") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let cmd = ArchiveProduct {
        tenant_id: tenant.tenant_id(),
        product_id: ProductId::new(agg),
        occurred_at: Utc::now(),
    };

    let committed = match services.engine().archive_product(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn create_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreateWarehouseRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let cmd = CreateWarehouse {
        tenant_id: tenant.tenant_id(),
        warehouse_id: WarehouseId::new(agg),
        name: body.name,
        location: body.location,
        occurred_at: Utc::now(),
    };

    let committed = match services.engine().create_warehouse(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn get_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "warehouse") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let warehouse = match services.engine().dispatcher().load(
        tenant.tenant_id(),
        agg,
        |_t, aggregate_id| Warehouse::empty(WarehouseId::new(aggregate_id)),
    ) {
        Ok(w) => w,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    if warehouse.tenant_id().is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "warehouse not found");
    }

    Json(dto::warehouse_to_json(&warehouse)).into_response()
}
