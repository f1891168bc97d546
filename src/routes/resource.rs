//! `/<res>/:id` read/update/delete and `POST /<res>` owned create.

use crate::handlers::resource::{create, delete, read, update};
use crate::resource::Resource;
use crate::service::{OwnedCreate, SingleResource};
use crate::session::Database;
use crate::state::ControllerState;
use axum::{routing::get, routing::post, Router};

/// GET, PUT and DELETE on `{base}/:id`, e.g. `single_resource_routes(db, "/projects", c)`.
pub fn single_resource_routes<D, R>(db: D, base: &str, controller: SingleResource<R>) -> Router
where
    D: Database,
    R: Resource,
{
    Router::new()
        .route(
            &format!("{}/:id", base),
            get(read::<D, R>).put(update::<D, R>).delete(delete::<D, R>),
        )
        .with_state(ControllerState::new(db, controller))
}

/// POST on `base`.
pub fn owned_create_routes<D, R>(db: D, base: &str, controller: OwnedCreate<R>) -> Router
where
    D: Database,
    R: Resource,
{
    Router::new()
        .route(base, post(create::<D, R>))
        .with_state(ControllerState::new(db, controller))
}
