use axum::http::StatusCode;

use plasticflow_core::AggregateId;

use crate::app::errors;

/// Parse a path segment as an aggregate id, or produce a 400 response.
pub fn parse_id(id: &str, what: &'static str) -> Result<AggregateId, axum::response::Response> {
    id.parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("{what} id is not a valid uuid"),
        )
    })
}
