//! Generic axum handlers, one per controller operation.
//!
//! A path id that cannot be decoded is answered as NotFound: no row can carry it.

pub mod link;
pub mod resource;

pub use link::*;
pub use resource::*;

use crate::error::AppError;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Json, Path};
use serde_json::Value;

pub(crate) fn path_or_not_found<T>(path: Result<Path<T>, PathRejection>, what: &str) -> Result<T, AppError> {
    match path {
        Ok(Path(v)) => Ok(v),
        Err(rejection) => {
            tracing::debug!(%rejection, "undecodable path");
            Err(AppError::NotFound(what.to_string()))
        }
    }
}

pub(crate) fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    body.map(|Json(v)| v).map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}
