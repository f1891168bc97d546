//! Shared fixtures: a projects / tasks / tags model over the in-memory store.

#![allow(dead_code)]

use restlink::parser::convert;
use restlink::{
    field_value, unknown_field, AppError, Argument, ChildLink, Column, JoinLink, MemoryStore, OwnedCreate, Query,
    RequestParser, Resource, SingleResource, Table,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

pub fn projects() -> &'static Table {
    static T: OnceLock<Table> = OnceLock::new();
    T.get_or_init(|| {
        Table::new("projects")
            .column(Column::id("id"))
            .column(Column::new("name", "text").not_null())
            .column(Column::new("description", "text"))
            .column(Column::new("creator_id", "bigint").not_null())
    })
}

pub fn tasks() -> &'static Table {
    static T: OnceLock<Table> = OnceLock::new();
    T.get_or_init(|| {
        Table::new("tasks")
            .column(Column::id("id"))
            .column(Column::new("project_id", "bigint").not_null())
            .column(Column::new("title", "text").not_null())
            .column(Column::new("done", "boolean").not_null().default_expr("false"))
            .column(Column::new("creator_id", "bigint").not_null())
            .references_cascade("project_id", projects(), "id")
    })
}

pub fn tags() -> &'static Table {
    static T: OnceLock<Table> = OnceLock::new();
    T.get_or_init(|| {
        Table::new("tags")
            .column(Column::id("id"))
            .column(Column::new("label", "text").not_null())
            .column(Column::new("creator_id", "bigint").not_null())
            .unique(&["label"])
    })
}

pub fn project_tags() -> &'static Table {
    static T: OnceLock<Table> = OnceLock::new();
    T.get_or_init(|| {
        Table::new("project_tags")
            .column(Column::new("project_id", "bigint").primary_key())
            .column(Column::new("tag_id", "bigint").primary_key())
            .references_cascade("project_id", projects(), "id")
            .references_cascade("tag_id", tags(), "id")
    })
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub creator_id: i64,
}

#[derive(Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub creator_id: i64,
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

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub done: bool,
    pub creator_id: i64,
}

#[derive(Serialize, Deserialize)]
pub struct NewTask {
    pub project_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    pub creator_id: i64,
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

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub label: String,
    pub creator_id: i64,
}

#[derive(Serialize, Deserialize)]
pub struct NewTag {
    pub label: String,
    pub creator_id: i64,
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

pub fn store() -> MemoryStore {
    MemoryStore::new(&[projects(), tasks(), tags(), project_tags()]).expect("valid model")
}

pub fn project_parser() -> RequestParser {
    RequestParser::new()
        .add_argument(
            Argument::new("name")
                .convert(convert::and_then(convert::string, convert::min_length(1)))
                .required(),
        )
        .add_argument(Argument::new("description").convert(convert::string))
}

pub fn project_update_parser() -> RequestParser {
    RequestParser::new()
        .add_argument(Argument::new("name").convert(convert::string).required())
}

pub fn task_parser() -> RequestParser {
    RequestParser::new()
        .add_argument(Argument::new("title").convert(convert::string).required())
        .add_argument(Argument::new("done").convert(convert::boolean))
}

pub fn tag_parser() -> RequestParser {
    RequestParser::new().add_argument(Argument::new("label").convert(convert::string).required())
}

pub fn projects_controller() -> SingleResource<Project> {
    SingleResource::new(project_update_parser())
}

pub fn project_creator() -> OwnedCreate<Project> {
    OwnedCreate::new(project_parser())
}

pub fn tag_creator() -> OwnedCreate<Tag> {
    OwnedCreate::new(tag_parser())
}

pub fn project_tasks() -> ChildLink<Task> {
    ChildLink::new(task_parser(), projects(), "project_id", "tasks")
}

pub fn project_tag_links() -> JoinLink {
    JoinLink::new(project_tags(), "project_id", "tag_id")
}
