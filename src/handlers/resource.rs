//! Read, update, delete and owned create of a single resource.

use super::{json_body, path_or_not_found};
use crate::error::AppError;
use crate::identity::CallerId;
use crate::resource::Resource;
use crate::response::{created, no_content, ok};
use crate::service::{OwnedCreate, SingleResource};
use crate::session::Database;
use crate::state::ControllerState;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Json, Path, State};
use axum::response::IntoResponse;
use serde_json::Value;

pub async fn read<D, R>(
    State(state): State<ControllerState<D, SingleResource<R>>>,
    path: Result<Path<R::Selector>, PathRejection>,
) -> Result<impl IntoResponse, AppError>
where
    D: Database,
    R: Resource,
{
    let selector = path_or_not_found(path, &R::table().name)?;
    let session = state.db.begin().await?;
    let data = state.controller.read(session, &selector).await?;
    Ok(ok(data))
}

pub async fn update<D, R>(
    State(state): State<ControllerState<D, SingleResource<R>>>,
    path: Result<Path<R::Selector>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError>
where
    D: Database,
    R: Resource,
{
    let selector = path_or_not_found(path, &R::table().name)?;
    let body = json_body(body)?;
    let session = state.db.begin().await?;
    let data = state.controller.update(session, &selector, &body).await?;
    Ok(ok(data))
}

pub async fn delete<D, R>(
    State(state): State<ControllerState<D, SingleResource<R>>>,
    path: Result<Path<R::Selector>, PathRejection>,
) -> Result<impl IntoResponse, AppError>
where
    D: Database,
    R: Resource,
{
    let selector = path_or_not_found(path, &R::table().name)?;
    let session = state.db.begin().await?;
    state.controller.delete(session, &selector).await?;
    Ok(no_content())
}

pub async fn create<D, R>(
    State(state): State<ControllerState<D, OwnedCreate<R>>>,
    caller: CallerId,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError>
where
    D: Database,
    R: Resource,
{
    let body = json_body(body)?;
    let session = state.db.begin().await?;
    let data = state.controller.create(session, &caller, &body).await?;
    Ok(created(data))
}
