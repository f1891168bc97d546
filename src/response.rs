//! Response helpers. Controllers return bare JSON mappings; handlers pick the status.

use axum::{http::StatusCode, Json};
use serde_json::Value;

pub fn ok(data: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(data))
}

pub fn created(data: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(data))
}

/// Empty success body (delete, link, unlink).
pub fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}
