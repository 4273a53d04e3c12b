use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use plasticflow_core::TenantId;

use crate::context::TenantContext;

/// Header carrying the tenant for the request.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Resolve the tenant context from the `x-tenant-id` header.
///
/// Every domain route requires a tenant; a missing or malformed header is
/// rejected before any handler runs.
pub async fn tenant_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let tenant_id = extract_tenant(req.headers())?;

    req.extensions_mut().insert(TenantContext::new(tenant_id));

    Ok(next.run(req).await)
}

fn extract_tenant(headers: &HeaderMap) -> Result<TenantId, StatusCode> {
    let header = headers
        .get(TENANT_HEADER)
        .ok_or(StatusCode::BAD_REQUEST)?;

    let header = header.to_str().map_err(|_| StatusCode::BAD_REQUEST)?;

    header
        .trim()
        .parse::<TenantId>()
        .map_err(|_| StatusCode::BAD_REQUEST)
}
