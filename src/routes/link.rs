//! Child collection and association routes.

use crate::handlers::link::{create_child, link, list_children, unlink};
use crate::resource::Resource;
use crate::service::{ChildLink, JoinLink};
use crate::session::Database;
use crate::state::ControllerState;
use axum::{routing::put, routing::post, Router};

/// GET and POST on `{parent}/:id/{children}`; the child collection name doubles as the
/// last path segment.
pub fn child_link_routes<D, C>(db: D, parent: &str, controller: ChildLink<C>) -> Router
where
    D: Database,
    C: Resource,
{
    let path = format!("{}/:id/{}", parent, controller.collection());
    Router::new()
        .route(&path, post(create_child::<D, C>).get(list_children::<D, C>))
        .with_state(ControllerState::new(db, controller))
}

/// PUT (link) and DELETE (unlink) on `{left}/:id/{right}/:right_id`.
pub fn join_link_routes<D: Database>(db: D, left: &str, right: &str, controller: JoinLink) -> Router {
    let path = format!("{}/:id/{}/:right_id", left, right);
    Router::new()
        .route(&path, put(link::<D>).delete(unlink::<D>))
        .with_state(ControllerState::new(db, controller))
}
