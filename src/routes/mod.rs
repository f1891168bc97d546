//! Router builders. Each returns a stateless `Router` so route groups for different
//! resources can be merged into one application.
//!
//! Id segments directly under a resource path are all named `:id`; the router does
//! not allow different parameter names at the same position.

pub mod common;
pub mod link;
pub mod resource;

pub use common::{common_routes, common_routes_with_ready};
pub use link::{child_link_routes, join_link_routes};
pub use resource::{owned_create_routes, single_resource_routes};

use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

/// Cap request bodies at `limit` bytes across every merged route group.
pub fn with_body_limit(router: Router, limit: usize) -> Router {
    router.layer(RequestBodyLimitLayer::new(limit))
}
