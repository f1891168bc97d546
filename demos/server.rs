//! Demo server: projects owned by their creator, tasks under a project, tags linked to
//! projects. Creates the database and tables if missing, then serves on `LISTEN_ADDR`.
//!
//! `cargo run --example server`, with `DATABASE_URL` pointing at a PostgreSQL server.

use axum::Router;
use restlink::parser::convert;
use restlink::{
    apply_migrations, child_link_routes, common_routes_with_ready, connect, field_value, join_link_routes,
    owned_create_routes, single_resource_routes, unknown_field, with_body_limit, AppError, Argument, ChildLink,
    Column, JoinLink, OwnedCreate, Query, RequestParser, Resource, Settings, SingleResource, Table,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tokio::net::TcpListener;

fn projects() -> &'static Table {
    static T: OnceLock<Table> = OnceLock::new();
    T.get_or_init(|| {
        Table::new("projects")
            .in_schema("app")
            .column(Column::id("id"))
            .column(Column::new("name", "text").not_null())
            .column(Column::new("description", "text"))
            .column(Column::new("creator_id", "bigint").not_null())
            .column(Column::new("created_at", "timestamptz").not_null().default_expr("NOW()"))
    })
}

fn tasks() -> &'static Table {
    static T: OnceLock<Table> = OnceLock::new();
    T.get_or_init(|| {
        Table::new("tasks")
            .in_schema("app")
            .column(Column::id("id"))
            .column(Column::new("project_id", "bigint").not_null())
            .column(Column::new("title", "text").not_null())
            .column(Column::new("done", "boolean").not_null().default_expr("false"))
            .column(Column::new("creator_id", "bigint").not_null())
            .references_cascade("project_id", projects(), "id")
    })
}

fn tags() -> &'static Table {
    static T: OnceLock<Table> = OnceLock::new();
    T.get_or_init(|| {
        Table::new("tags")
            .in_schema("app")
            .column(Column::id("id"))
            .column(Column::new("label", "text").not_null())
            .column(Column::new("creator_id", "bigint").not_null())
            .unique(&["label"])
    })
}

fn project_tags() -> &'static Table {
    static T: OnceLock<Table> = OnceLock::new();
    T.get_or_init(|| {
        Table::new("project_tags")
            .in_schema("app")
            .column(Column::new("project_id", "bigint").primary_key())
            .column(Column::new("tag_id", "bigint").primary_key())
            .references_cascade("project_id", projects(), "id")
            .references_cascade("tag_id", tags(), "id")
    })
}

#[derive(Serialize, Deserialize)]
struct Project {
    id: i64,
    name: String,
    description: Option<String>,
    creator_id: i64,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize, Deserialize)]
struct NewProject {
    name: String,
    description: Option<String>,
    creator_id: i64,
}

impl Resource for Project {
    type Selector = i64;
    type New = NewProject;

    fn table() -> &'static Table {
        projects()
    }

    fn query(id: &i64) -> Query<'static> {
        Query::by_pk(projects(), *id)
    }

    fn assign(&mut self, field: &str, value: Value) -> Result<(), AppError> {
        match field {
            "name" => self.name = field_value(field, value)?,
            "description" => self.description = field_value(field, value)?,
            _ => return Err(unknown_field(field)),
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct Task {
    id: i64,
    project_id: i64,
    title: String,
    done: bool,
    creator_id: i64,
}

#[derive(Serialize, Deserialize)]
struct NewTask {
    project_id: i64,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    done: Option<bool>,
    creator_id: i64,
}

impl Resource for Task {
    type Selector = i64;
    type New = NewTask;

    fn table() -> &'static Table {
        tasks()
    }

    fn query(id: &i64) -> Query<'static> {
        Query::by_pk(tasks(), *id)
    }

    fn assign(&mut self, field: &str, value: Value) -> Result<(), AppError> {
        match field {
            "title" => self.title = field_value(field, value)?,
            "done" => self.done = field_value(field, value)?,
            _ => return Err(unknown_field(field)),
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct Tag {
    id: i64,
    label: String,
    creator_id: i64,
}

#[derive(Serialize, Deserialize)]
struct NewTag {
    label: String,
    creator_id: i64,
}

impl Resource for Tag {
    type Selector = i64;
    type New = NewTag;

    fn table() -> &'static Table {
        tags()
    }

    fn query(id: &i64) -> Query<'static> {
        Query::by_pk(tags(), *id)
    }

    fn assign(&mut self, field: &str, value: Value) -> Result<(), AppError> {
        match field {
            "label" => self.label = field_value(field, value)?,
            _ => return Err(unknown_field(field)),
        }
        Ok(())
    }
}

fn project_fields() -> RequestParser {
    RequestParser::new()
        .add_argument(
            Argument::new("name")
                .convert(convert::and_then(convert::string, convert::max_length(200)))
                .required(),
        )
        .add_argument(Argument::new("description").convert(convert::string))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("restlink=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let db = connect(&settings).await?;
    apply_migrations(db.pool(), &[projects(), tasks(), tags(), project_tags()]).await?;

    let task_fields = RequestParser::new()
        .add_argument(Argument::new("title").convert(convert::string).required())
        .add_argument(Argument::new("done").convert(convert::boolean));
    // An update assigns every declared field, so both task fields are required there.
    let task_update_fields = RequestParser::new()
        .argument("title", convert::string, true)
        .argument("done", convert::boolean, true);
    let tag_fields = RequestParser::new().add_argument(
        Argument::new("label")
            .convert(convert::and_then(convert::string, convert::pattern("[a-z0-9-]{1,32}")))
            .required(),
    );

    let api = Router::new()
        .merge(single_resource_routes(db.clone(), "/projects", SingleResource::<Project>::new(project_fields())))
        .merge(owned_create_routes(db.clone(), "/projects", OwnedCreate::<Project>::new(project_fields())))
        .merge(single_resource_routes(db.clone(), "/tasks", SingleResource::<Task>::new(task_update_fields)))
        .merge(child_link_routes(
            db.clone(),
            "/projects",
            ChildLink::<Task>::new(task_fields, projects(), "project_id", "tasks"),
        ))
        .merge(single_resource_routes(db.clone(), "/tags", SingleResource::<Tag>::new(tag_fields.clone())))
        .merge(owned_create_routes(db.clone(), "/tags", OwnedCreate::<Tag>::new(tag_fields)))
        .merge(join_link_routes(
            db.clone(),
            "/projects",
            "tags",
            JoinLink::new(project_tags(), "project_id", "tag_id"),
        ));

    let app = Router::new()
        .merge(common_routes_with_ready(db))
        .nest("/api/v1", with_body_limit(api, settings.body_limit_bytes));

    let listener = TcpListener::bind(settings.listen_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
