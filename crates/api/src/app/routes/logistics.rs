use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use plasticflow_core::AggregateId;
use plasticflow_infra::workflow::GatePassRequest;
use plasticflow_logistics::{
    CancelLoadingOrder, CompleteLoading, ConfirmDelivery, CreateLoadingOrder, DeliveryNote,
    DeliveryNoteId, GatePass, GatePassId, IssueGatePass, LoadingOrder, LoadingOrderId,
    StartLoading,
};
use plasticflow_sales::SalesOrderId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .nest("/gate-passes", gate_passes_router())
        .nest("/loading-orders", loading_orders_router())
        .nest("/delivery-notes", delivery_notes_router())
}

fn gate_passes_router() -> Router {
    Router::new()
        .route("/", post(create_gate_pass))
        .route("/:id", get(get_gate_pass))
        .route("/:id/issue", post(issue_gate_pass))
}

fn loading_orders_router() -> Router {
    Router::new()
        .route("/", post(create_loading_order))
        .route("/:id", get(get_loading_order))
        .route("/:id/start", post(start_loading))
        .route("/:id/complete", post(complete_loading))
        .route("/:id/cancel", post(cancel_loading_order))
}

fn delivery_notes_router() -> Router {
    Router::new()
        .route("/", post(create_delivery_note))
        .route("/:id", get(get_delivery_note))
        .route("/:id/submit", post(submit_delivery_note))
        .route("/:id/confirm", post(confirm_delivery))
        .route("/:id/cancel", post(cancel_delivery_note))
}

pub async fn create_gate_pass(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreateGatePassRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let order = match common::parse_id(&body.sales_order_id, "sales order") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let request = GatePassRequest {
        tenant_id: tenant.tenant_id(),
        gate_pass_id: GatePassId::new(agg),
        order_id: SalesOrderId::new(order),
        driver_name: body.driver_name,
        vehicle_number: body.vehicle_number,
    };

    let committed = match services.engine().create_gate_pass(request) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn get_gate_pass(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "gate pass") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let gate_pass = match services.engine().dispatcher().load(
        tenant.tenant_id(),
        agg,
        |_t, aggregate_id| GatePass::empty(GatePassId::new(aggregate_id)),
    ) {
        Ok(g) => g,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    if gate_pass.tenant_id().is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "gate pass not found");
    }

    Json(dto::gate_pass_to_json(&gate_pass)).into_response()
}

pub async fn issue_gate_pass(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::IssueGatePassRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "gate pass") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let cmd = IssueGatePass {
        tenant_id: tenant.tenant_id(),
        gate_pass_id: GatePassId::new(agg),
        issued_on: body.issued_on,
        occurred_at: Utc::now(),
    };

    let committed = match services.engine().issue_gate_pass(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn create_loading_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreateLoadingOrderRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let order = match common::parse_id(&body.sales_order_id, "sales order") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let cmd = CreateLoadingOrder {
        tenant_id: tenant.tenant_id(),
        loading_order_id: LoadingOrderId::new(agg),
        sales_order: SalesOrderId::new(order),
        driver_name: body.driver_name,
        vehicle_plate: body.vehicle_plate,
        driver_phone: body.driver_phone,
        destination: body.destination,
        occurred_at: Utc::now(),
    };

    let committed = match services.engine().create_loading_order(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn get_loading_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "loading order") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let order = match services.engine().dispatcher().load(
        tenant.tenant_id(),
        agg,
        |_t, aggregate_id| LoadingOrder::empty(LoadingOrderId::new(aggregate_id)),
    ) {
        Ok(o) => o,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    if order.tenant_id().is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "loading order not found");
    }

    Json(dto::loading_order_to_json(&order)).into_response()
}

pub async fn start_loading(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "loading order") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let cmd = StartLoading {
        tenant_id: tenant.tenant_id(),
        loading_order_id: LoadingOrderId::new(agg),
        occurred_at: Utc::now(),
    };

    let committed = match services.engine().start_loading(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn complete_loading(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "loading order") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let cmd = CompleteLoading {
        tenant_id: tenant.tenant_id(),
        loading_order_id: LoadingOrderId::new(agg),
        occurred_at: Utc::now(),
    };

    let committed = match services.engine().complete_loading(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn cancel_loading_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "loading order") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let cmd = CancelLoadingOrder {
        tenant_id: tenant.tenant_id(),
        loading_order_id: LoadingOrderId::new(agg),
        occurred_at: Utc::now(),
    };

    let committed = match services.engine().cancel_loading_order(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn create_delivery_note(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreateDeliveryNoteRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let order = match common::parse_id(&body.sales_order_id, "sales order") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let committed = match services.engine().create_delivery_note(
        tenant.tenant_id(),
        DeliveryNoteId::new(agg),
        SalesOrderId::new(order),
        body.delivery_date,
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

pub async fn get_delivery_note(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "delivery note") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let note = match services.engine().dispatcher().load(
        tenant.tenant_id(),
        agg,
        |_t, aggregate_id| DeliveryNote::empty(DeliveryNoteId::new(aggregate_id)),
    ) {
        Ok(n) => n,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    if note.tenant_id().is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "delivery note not found");
    }

    Json(dto::delivery_note_to_json(&note)).into_response()
}

pub async fn submit_delivery_note(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "delivery note") {
        Ok(v) => v,
        Err(r) => return r,
    };

    if let Err(e) = services
        .engine()
        .submit_delivery_note(tenant.tenant_id(), DeliveryNoteId::new(agg))
    {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string()})),
    )
        .into_response()
}

pub async fn confirm_delivery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ConfirmDeliveryRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "delivery note") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let cmd = ConfirmDelivery {
        tenant_id: tenant.tenant_id(),
        delivery_note_id: DeliveryNoteId::new(agg),
        delivered_on: body.delivered_on,
        occurred_at: Utc::now(),
    };

    let committed = match services.engine().confirm_delivery(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn cancel_delivery_note(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "delivery note") {
        Ok(v) => v,
        Err(r) => return r,
    };

    if let Err(e) = services
        .engine()
        .cancel_delivery_note(tenant.tenant_id(), DeliveryNoteId::new(agg))
    {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string()})),
    )
        .into_response()
}
