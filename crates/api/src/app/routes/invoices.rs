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
use plasticflow_infra::workflow::InvoiceRequest;
use plasticflow_invoicing::{InvoiceId, RecordInvoicePayment};
use plasticflow_sales::SalesOrderId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(issue_invoice).get(list_invoices))
        .route("/:id", get(get_invoice))
        .route("/:id/payments", post(record_payment))
        .route("/:id/cancel", post(cancel_invoice))
}

pub async fn issue_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::IssueInvoiceRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let order = match common::parse_id(&body.sales_order_id, "sales order") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let request = InvoiceRequest {
        tenant_id: tenant.tenant_id(),
        invoice_id: InvoiceId::new(agg),
        order_id: SalesOrderId::new(order),
        amount: body.amount,
        invoice_date: body.invoice_date,
        due_date: body.due_date,
    };

    let committed = match services.engine().issue_invoice(request) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let invoices = services.invoices().list(tenant.tenant_id());

    Json(serde_json::json!({
        "invoices": invoices.iter().map(dto::invoice_row_to_json).collect::<Vec<_>>(),
    }))
    .into_response()
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "invoice") {
        Ok(v) => v,
        Err(r) => return r,
    };

    match services
        .invoices()
        .get(tenant.tenant_id(), &InvoiceId::new(agg))
    {
        Some(invoice) => Json(dto::invoice_row_to_json(&invoice)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found"),
    }
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "invoice") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let cmd = RecordInvoicePayment {
        tenant_id: tenant.tenant_id(),
        invoice_id: InvoiceId::new(agg),
        amount: body.amount,
        occurred_at: Utc::now(),
    };

    let committed = match services.engine().record_invoice_payment(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn cancel_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "invoice") {
        Ok(v) => v,
        Err(r) => return r,
    };

    if let Err(e) = services
        .engine()
        .cancel_invoice(tenant.tenant_id(), InvoiceId::new(agg))
    {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string()})),
    )
        .into_response()
}
