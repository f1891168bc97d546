//! Child collections and many-to-many links.

use super::{json_body, path_or_not_found};
use crate::error::AppError;
use crate::identity::CallerId;
use crate::resource::Resource;
use crate::response::{created, no_content, ok};
use crate::service::{ChildLink, JoinLink};
use crate::session::Database;
use crate::state::ControllerState;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Json, Path, State};
use axum::response::IntoResponse;
use serde_json::Value;

pub async fn create_child<D, C>(
    State(state): State<ControllerState<D, ChildLink<C>>>,
    path: Result<Path<String>, PathRejection>,
    caller: CallerId,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError>
where
    D: Database,
    C: Resource,
{
    let parent_id = path_or_not_found(path, state.controller.collection())?;
    let body = json_body(body)?;
    let session = state.db.begin().await?;
    let data = state.controller.create(session, &caller, &parent_id, &body).await?;
    Ok(created(data))
}

pub async fn list_children<D, C>(
    State(state): State<ControllerState<D, ChildLink<C>>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, AppError>
where
    D: Database,
    C: Resource,
{
    let parent_id = path_or_not_found(path, state.controller.collection())?;
    let session = state.db.begin().await?;
    let data = state.controller.list(session, &parent_id).await?;
    Ok(ok(data))
}

pub async fn link<D: Database>(
    State(state): State<ControllerState<D, JoinLink>>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let (left_id, right_id) = path_or_not_found(path, &state.controller.table().name)?;
    let session = state.db.begin().await?;
    state.controller.link(session, &left_id, &right_id).await?;
    Ok(no_content())
}

pub async fn unlink<D: Database>(
    State(state): State<ControllerState<D, JoinLink>>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let (left_id, right_id) = path_or_not_found(path, &state.controller.table().name)?;
    let session = state.db.begin().await?;
    state.controller.unlink(session, &left_id, &right_id).await?;
    Ok(no_content())
}
