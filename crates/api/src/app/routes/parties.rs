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
use plasticflow_parties::{Party, PartyId, RegisterParty, SuspendParty, UpdateDetails};

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_party))
        .route("/:id", get(get_party).put(update_party))
        .route("/:id/suspend", post(suspend_party))
}

pub async fn register_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::RegisterPartyRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let cmd = RegisterParty {
        tenant_id: tenant.tenant_id(),
        party_id: PartyId::new(agg),
        kind: body.kind,
        name: body.name,
        contact: body.contact,
        tax_id: body.tax_id,
        credit_approved: body.credit_approved,
        occurred_at: Utc::now(),
    };

    let committed = match services.engine().register_party(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn get_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "party") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let party = match services.engine().dispatcher().load(
        tenant.tenant_id(),
        agg,
        |_t, aggregate_id| Party::empty(PartyId::new(aggregate_id)),
    ) {
        Ok(p) => p,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    if party.tenant_id().is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "party not found");
    }

    Json(dto::party_to_json(&party)).into_response()
}

pub async fn update_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdatePartyRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "party") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let cmd = UpdateDetails {
        tenant_id: tenant.tenant_id(),
        party_id: PartyId::new(agg),
        name: body.name,
        contact: body.contact,
        tax_id: body.tax_id,
        occurred_at: Utc::now(),
    };

    let committed = match services.engine().update_party_details(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn suspend_party(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SuspendPartyRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "party") {
        Ok(v) => v,
        Err(r) => return r,
    };

    let cmd = SuspendParty {
        tenant_id: tenant.tenant_id(),
        party_id: PartyId::new(agg),
        reason: body.reason,
        occurred_at: Utc::now(),
    };

    let committed = match services.engine().suspend_party(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}
