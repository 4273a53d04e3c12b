use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use plasticflow_core::AggregateId;
use plasticflow_costing::{LandingCostWorksheet, LandingCostWorksheetId};
use plasticflow_shipping::ImportShipmentId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_worksheet))
        .route("/:id", get(get_worksheet))
        .route("/:id/components", post(update_components))
        .route("/:id/lock", post(lock_worksheet))
        .route("/:id/unlock", post(unlock_worksheet))
        .route("/:id/cancel", post(cancel_worksheet))
}

pub async fn create_worksheet(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreateWorksheetRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let shipment = match common::parse_id(&body.shipment_id, "shipment") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let committed = match services.engine().create_worksheet(
        tenant.tenant_id(),
        LandingCostWorksheetId::new(agg),
        ImportShipmentId::new(shipment),
        body.allocation_method,
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn get_worksheet(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "worksheet") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let worksheet = match services.engine().dispatcher().load(
        tenant.tenant_id(),
        agg,
        |_t, aggregate_id| LandingCostWorksheet::empty(LandingCostWorksheetId::new(aggregate_id)),
    ) {
        Ok(w) => w,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    if worksheet.tenant_id().is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "worksheet not found");
    }

    Json(dto::worksheet_to_json(&worksheet)).into_response()
}

pub async fn update_components(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateWorksheetRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "worksheet") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let committed = match services.engine().update_cost_components(
        tenant.tenant_id(),
        LandingCostWorksheetId::new(agg),
        body.components,
        body.assumptions.unwrap_or_default(),
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

pub async fn lock_worksheet(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "worksheet") {
        Ok(v) => v,
        Err(r) => return r,
    };

    if let Err(e) = services
        .engine()
        .lock_worksheet(tenant.tenant_id(), LandingCostWorksheetId::new(agg))
    {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string()})),
    )
        .into_response()
}

pub async fn unlock_worksheet(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "worksheet") {
        Ok(v) => v,
        Err(r) => return r,
    };

    if let Err(e) = services
        .engine()
        .unlock_worksheet(tenant.tenant_id(), LandingCostWorksheetId::new(agg))
    {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string()})),
    )
        .into_response()
}

pub async fn cancel_worksheet(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "worksheet") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let committed = match services
        .engine()
        .cancel_worksheet(tenant.tenant_id(), LandingCostWorksheetId::new(agg))
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
