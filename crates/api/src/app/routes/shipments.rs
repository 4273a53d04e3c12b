use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use plasticflow_catalog::WarehouseId;
use plasticflow_core::AggregateId;
use plasticflow_purchasing::PurchaseOrderId;
use plasticflow_shipping::{ImportShipment, ImportShipmentId};

use plasticflow_infra::workflow::{ShipmentDraft, ShipmentDraftLine};

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_shipment))
        .route("/:id", get(get_shipment))
        .route("/:id/destination", post(set_destination))
        .route("/:id/clear", post(clear_shipment))
        .route("/:id/at-warehouse", post(mark_at_warehouse))
        .route("/:id/rollback-clearance", post(rollback_clearance))
        .route("/:id/cancel", post(cancel_shipment))
}

pub async fn create_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreateShipmentRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let po = match common::parse_id(&body.purchase_order_id, "purchase order") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let draft = ShipmentDraft {
        tenant_id: tenant.tenant_id(),
        shipment_id: ImportShipmentId::new(agg),
        purchase_order_id: PurchaseOrderId::new(po),
        shipment_date: body.shipment_date,
        expected_arrival: body.expected_arrival,
        lines: body
            .lines
            .iter()
            .map(|l| ShipmentDraftLine {
                po_line_index: l.po_line_index,
                quantity: l.quantity,
            })
            .collect(),
    };

    let committed = match services.engine().create_import_shipment(draft) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn get_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "shipment") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let shipment = match services.engine().dispatcher().load(
        tenant.tenant_id(),
        agg,
        |_t, aggregate_id| ImportShipment::empty(ImportShipmentId::new(aggregate_id)),
    ) {
        Ok(s) => s,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    if shipment.tenant_id().is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "shipment not found");
    }

    Json(dto::shipment_to_json(&shipment)).into_response()
}

pub async fn set_destination(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetDestinationRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "shipment") {
        Ok(v) => v,
        Err(r) => return r,
    };
    let warehouse = match common::parse_id(&body.warehouse_id, "warehouse") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let committed = match services.engine().set_destination_warehouse(
        tenant.tenant_id(),
        ImportShipmentId::new(agg),
        WarehouseId::new(warehouse),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn clear_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ClearShipmentRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "shipment") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let entry_id = match services.engine().clear_shipment(
        tenant.tenant_id(),
        ImportShipmentId::new(agg),
        body.cleared_on,
    ) {
        Ok(e) => e,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "stock_entry_id": entry_id.to_string(),
        })),
    )
        .into_response()
}

pub async fn mark_at_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AtWarehouseRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "shipment") {
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

    if let Err(e) = services.engine().mark_shipment_at_warehouse(
        tenant.tenant_id(),
        ImportShipmentId::new(agg),
        warehouse,
        body.arrival_date,
    ) {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string()})),
    )
        .into_response()
}

pub async fn rollback_clearance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "shipment") {
        Ok(v) => v,
        Err(r) => return r,
    };

    if let Err(e) = services
        .engine()
        .rollback_clearance(tenant.tenant_id(), ImportShipmentId::new(agg))
    {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string()})),
    )
        .into_response()
}

pub async fn cancel_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "shipment") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let committed = match services
        .engine()
        .cancel_import_shipment(tenant.tenant_id(), ImportShipmentId::new(agg))
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
