//! Dispatch errors mapped onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use plasticflow_infra::command_dispatcher::DispatchError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    let (status, code, message) = match err {
        DispatchError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::NotFound => (StatusCode::NOT_FOUND, "not_found", "not found".into()),
        DispatchError::InvariantViolation(msg) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::Concurrency(msg) => (StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Unauthorized => {
            (StatusCode::FORBIDDEN, "unauthorized", "unauthorized".into())
        }
        DispatchError::TenantIsolation(msg) => (StatusCode::FORBIDDEN, "tenant_isolation", msg),
        DispatchError::Deserialize(msg) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::LockPoisoned(msg) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "lock_poisoned", msg)
        }
        DispatchError::Store(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
        DispatchError::Publish(msg) => (StatusCode::BAD_GATEWAY, "publish_error", msg),
    };

    json_error(status, code, message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
