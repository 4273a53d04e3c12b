use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use plasticflow_catalog::{ProductId, WarehouseId};
use plasticflow_core::AggregateId;
use plasticflow_inventory::StockEntryId;
use plasticflow_parties::PartyId;
use plasticflow_infra::workflow::{ProformaConversion, ProformaDraft};
use plasticflow_sales::{
    AddPaymentSlip, BatchRef, CreateSalesOrder, OrderStatus, PaymentSlip, ProformaInvoice,
    ProformaInvoiceId, ProformaLineInput, SalesOrderId, SalesOrderLineInput,
};

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .nest("/orders", orders_router())
        .nest("/proformas", proformas_router())
}

fn proformas_router() -> Router {
    Router::new()
        .route("/", post(create_proforma))
        .route("/:id", get(get_proforma))
        .route("/:id/submit", post(submit_proforma))
        .route("/:id/convert", post(convert_proforma))
        .route("/:id/cancel", post(cancel_proforma))
}

fn orders_router() -> Router {
    Router::new()
        .route("/", post(create_sales_order).get(list_sales_orders))
        .route("/:id", get(get_sales_order))
        .route("/:id/submit", post(submit_sales_order))
        .route("/:id/payment-slips", post(add_payment_slip))
        .route("/:id/cancel", post(cancel_sales_order))
}

pub async fn create_proforma(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreateProformaRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let customer = match common::parse_id(&body.customer_id, "customer") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let mut lines = Vec::with_capacity(body.lines.len());
    for line in &body.lines {
        let product = match common::parse_id(&line.product_id, "product") {
            Ok(v) => v,
            Err(r) => return r,
        };
        lines.push(ProformaLineInput {
            product_id: ProductId::new(product),
            uom: line.uom.clone(),
            quantity: line.quantity,
            rate: line.rate,
        });
    }

    let committed = match services.engine().create_proforma_invoice(ProformaDraft {
        tenant_id: tenant.tenant_id(),
        proforma_id: ProformaInvoiceId::new(agg),
        customer: PartyId::new(customer),
        currency: body.currency,
        valid_until: body.valid_until,
        lines,
    }) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn get_proforma(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "proforma invoice") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let proforma = match services.engine().dispatcher().load(
        tenant.tenant_id(),
        agg,
        |_t, aggregate_id| ProformaInvoice::empty(ProformaInvoiceId::new(aggregate_id)),
    ) {
        Ok(p) => p,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    if proforma.tenant_id().is_none() {
        return errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            "proforma invoice not found",
        );
    }

    Json(dto::proforma_to_json(&proforma)).into_response()
}

pub async fn submit_proforma(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "proforma invoice") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let committed = match services
        .engine()
        .submit_proforma_invoice(tenant.tenant_id(), ProformaInvoiceId::new(agg))
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

pub async fn convert_proforma(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ConvertProformaRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "proforma invoice") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let order_id = SalesOrderId::new(AggregateId::new());
    match services.engine().convert_proforma_invoice(ProformaConversion {
        tenant_id: tenant.tenant_id(),
        proforma_id: ProformaInvoiceId::new(agg),
        order_id,
        sales_type: body.sales_type,
        delivery_source: body.delivery_source,
    }) {
        Ok(order) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id": agg.to_string(),
                "sales_order_id": order.to_string(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn cancel_proforma(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "proforma invoice") {
        Ok(v) => v,
        Err(r) => return r,
    };

    if let Err(e) = services
        .engine()
        .cancel_proforma_invoice(tenant.tenant_id(), ProformaInvoiceId::new(agg))
    {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string()})),
    )
        .into_response()
}

pub async fn create_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreateSalesOrderRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let customer = match common::parse_id(&body.customer_id, "customer") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let mut lines = Vec::with_capacity(body.lines.len());
    for line in &body.lines {
        let product = match common::parse_id(&line.product_id, "product") {
            Ok(v) => v,
            Err(r) => return r,
        };
        let batch = match line.entry_id.as_deref() {
            Some(raw) => match common::parse_id(raw, "stock entry") {
                Ok(v) => Some(BatchRef {
                    entry_id: StockEntryId::new(v),
                    line_index: line.line_index.unwrap_or(0),
                }),
                Err(r) => return r,
            },
            None => None,
        };
        let warehouse = match line.warehouse_id.as_deref() {
            Some(raw) => match common::parse_id(raw, "warehouse") {
                Ok(v) => Some(WarehouseId::new(v)),
                Err(r) => return r,
            },
            None => None,
        };

        lines.push(SalesOrderLineInput {
            product_id: ProductId::new(product),
            uom: line.uom.clone(),
            quantity: line.quantity,
            rate: line.rate,
            batch,
            warehouse,
        });
    }

    let cmd = CreateSalesOrder {
        tenant_id: tenant.tenant_id(),
        order_id: SalesOrderId::new(agg),
        customer: PartyId::new(customer),
        sales_type: body.sales_type,
        delivery_source: body.delivery_source,
        currency: body.currency,
        lines,
        occurred_at: Utc::now(),
    };

    let committed = match services.engine().create_sales_order(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<OrderStatus>,
}

pub async fn list_sales_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Query(params): Query<ListOrdersParams>,
) -> axum::response::Response {
    let orders = match params.status {
        Some(status) => services.sales_orders().by_status(tenant.tenant_id(), status),
        None => services.sales_orders().list(tenant.tenant_id()),
    };

    Json(serde_json::json!({
        "orders": orders.iter().map(dto::sales_order_summary_to_json).collect::<Vec<_>>(),
    }))
    .into_response()
}

pub async fn get_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "sales order") {
        Ok(v) => v,
        Err(r) => return r,
    };

    match services
        .sales_orders()
        .get(tenant.tenant_id(), &SalesOrderId::new(agg))
    {
        Some(order) => Json(dto::sales_order_summary_to_json(&order)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "sales order not found"),
    }
}

pub async fn submit_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "sales order") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let committed = match services
        .engine()
        .submit_sales_order(tenant.tenant_id(), SalesOrderId::new(agg))
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

pub async fn add_payment_slip(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PaymentSlipRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "sales order") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let cmd = AddPaymentSlip {
        tenant_id: tenant.tenant_id(),
        order_id: SalesOrderId::new(agg),
        slip: PaymentSlip {
            reference: body.reference,
            amount_paid: body.amount_paid,
            paid_on: body.paid_on,
        },
        occurred_at: Utc::now(),
    };

    let committed = match services.engine().add_payment_slip(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn cancel_sales_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "sales order") {
        Ok(v) => v,
        Err(r) => return r,
    };

    if let Err(e) = services
        .engine()
        .cancel_sales_order(tenant.tenant_id(), SalesOrderId::new(agg))
    {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string()})),
    )
        .into_response()
}
