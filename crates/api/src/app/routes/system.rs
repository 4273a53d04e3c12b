use axum::{Json, extract::Extension, response::IntoResponse};

/// Liveness probe; sits outside the tenant middleware.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Echo the tenant the middleware resolved for this request.
pub async fn whoami(
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "tenant_id": tenant.tenant_id().to_string(),
    }))
}
