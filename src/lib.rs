//! restlink: generic REST resource controllers over transactional sessions.
//!
//! A resource type implements [`Resource`]; the controllers in [`service`] turn it into
//! read/update/delete, owned creation, child collections and many-to-many links, and
//! [`routes`] mounts them on an axum router.

pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod migration;
pub mod model;
pub mod parser;
pub mod resource;
pub mod response;
pub mod routes;
pub mod service;
pub mod session;
pub mod sql;
pub mod state;
pub mod store;

pub use config::Settings;
pub use error::{AppError, ConfigError, ConstraintKind, ConstraintViolation};
pub use identity::{CallerId, IdentityProvider, StaticIdentity, USER_ID_HEADER};
pub use migration::{apply_migrations, plan_migrations};
pub use model::{ChildCollection, Column, Query, Table};
pub use parser::{convert, wrap_optional, wrap_required, Argument, Record, RequestParser};
pub use resource::{field_value, unknown_field, Resource, CREATOR_ID};
pub use routes::{
    child_link_routes, common_routes, common_routes_with_ready, join_link_routes, owned_create_routes,
    single_resource_routes, with_body_limit,
};
pub use service::{ChildLink, JoinLink, OwnedCreate, SingleResource};
pub use session::{commit_if_ok, Database, MemorySession, MemoryStore, PgDatabase, PgSession, Session};
pub use state::ControllerState;
pub use store::{connect, ensure_database_exists};
