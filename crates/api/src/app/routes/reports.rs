use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::app::dto;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/daily-sales", get(daily_sales))
        .route("/receivables", get(receivables))
}

pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let summary = services
        .dashboard()
        .summarize(tenant.tenant_id(), Utc::now().date_naive());

    Json(dto::dashboard_to_json(&summary)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct DailySalesParams {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

pub async fn daily_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Query(params): Query<DailySalesParams>,
) -> axum::response::Response {
    let rows = services
        .invoices()
        .daily_sales(tenant.tenant_id(), params.from, params.to);

    Json(serde_json::json!({
        "days": rows.iter().map(dto::daily_sales_row_to_json).collect::<Vec<_>>(),
    }))
    .into_response()
}

pub async fn receivables(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let outstanding = services.invoices().outstanding_receivables(tenant.tenant_id());

    Json(serde_json::json!({
        "outstanding_receivables": outstanding,
    }))
    .into_response()
}
