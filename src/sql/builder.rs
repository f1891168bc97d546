//! Builds parameterized SELECT, INSERT, UPDATE, DELETE and DDL from the table model.

use crate::model::{ChildCollection, Column, Query, Table};
use crate::parser::Record;
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from the table model).
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub(crate) fn qualified_table(table: &Table) -> String {
    match &table.schema {
        Some(schema) => format!("{}.{}", quoted(schema), quoted(&table.name)),
        None => quoted(&table.name),
    }
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Push a value and return its placeholder, cast to the column's type when known.
    fn placeholder(&mut self, v: Value, column: Option<&Column>) -> String {
        let n = self.push_param(v);
        match column {
            Some(c) => format!("${}::{}", n, c.sql_type),
            None => format!("${}", n),
        }
    }

    fn where_clause(&mut self, query: &Query<'_>, alias: Option<&str>) -> String {
        let mut parts = Vec::new();
        for (col, val) in &query.filters {
            let ph = self.placeholder(val.clone(), query.table.column_named(col));
            let lhs = match alias {
                Some(a) => format!("{}.{}", a, quoted(col)),
                None => quoted(col),
            };
            parts.push(format!("{} = {}", lhs, ph));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", parts.join(" AND "))
        }
    }
}

/// SELECT list: numeric columns as col::text so sqlx returns String.
fn select_column_list(table: &Table, alias: Option<&str>) -> String {
    table
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            let expr = match alias {
                Some(a) => format!("{}.{}", a, q),
                None => q.clone(),
            };
            if c.sql_type.eq_ignore_ascii_case("numeric") {
                format!("{}::text AS {}", expr, q)
            } else if alias.is_some() {
                format!("{} AS {}", expr, q)
            } else {
                expr
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// First row matching the query, ordered by primary key.
pub fn select_first(query: &Query<'_>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = query.table;
    let where_clause = q.where_clause(query, None);
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} LIMIT 1",
        select_column_list(table, None),
        qualified_table(table),
        where_clause,
        quoted(table.pk())
    );
    q
}

/// First parent row matching the query, with the child collection aggregated into one
/// JSON array column named after the collection (empty array when there are no children).
pub fn select_first_with_children(query: &Query<'_>, children: &ChildCollection<'_>) -> QueryBuf {
    const MAIN_ALIAS: &str = "main";
    let mut q = QueryBuf::new();
    let parent = query.table;
    let child = children.table;
    let sub_from = format!(
        "{} WHERE {} = {}.{} ORDER BY {}",
        qualified_table(child),
        quoted(&children.foreign_key),
        MAIN_ALIAS,
        quoted(parent.pk()),
        quoted(child.pk())
    );
    let subquery = format!(
        "(SELECT COALESCE(json_agg(row_to_json(sub)), '[]'::json) FROM (SELECT {} FROM {}) sub)",
        select_column_list(child, None),
        sub_from
    );
    let where_clause = q.where_clause(query, Some(MAIN_ALIAS));
    q.sql = format!(
        "SELECT {}, {} AS {} FROM {} {}{} ORDER BY {}.{} LIMIT 1",
        select_column_list(parent, Some(MAIN_ALIAS)),
        subquery,
        quoted(&children.name),
        qualified_table(parent),
        MAIN_ALIAS,
        where_clause,
        MAIN_ALIAS,
        quoted(parent.pk())
    );
    q
}

/// INSERT: table columns present in `record`. Omitted columns keep their DB default
/// (or NULL). Undeclared keys in `record` are ignored.
pub fn insert(table: &Table, record: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &table.columns {
        let Some(val) = record.get(&c.name) else { continue };
        if val.is_null() && c.has_default() {
            continue;
        }
        placeholders.push(q.placeholder(val.clone(), Some(c)));
        cols.push(quoted(&c.name));
    }
    let returning = select_column_list(table, None);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", qualified_table(table), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            qualified_table(table),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE rows matching the query: SET only table columns present in `changes`, never
/// primary-key columns. Returns `None` when nothing would be set.
pub fn update(query: &Query<'_>, changes: &Record) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let table = query.table;
    let mut sets = Vec::new();
    for c in &table.columns {
        if c.primary_key {
            continue;
        }
        let Some(v) = changes.get(&c.name) else { continue };
        let rhs = q.placeholder(v.clone(), Some(c));
        sets.push(format!("{} = {}", quoted(&c.name), rhs));
    }
    if sets.is_empty() {
        return None;
    }
    let where_clause = q.where_clause(query, None);
    q.sql = format!("UPDATE {} SET {}{}", qualified_table(table), sets.join(", "), where_clause);
    Some(q)
}

/// DELETE every row matching the query.
pub fn delete(query: &Query<'_>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = q.where_clause(query, None);
    q.sql = format!("DELETE FROM {}{}", qualified_table(query.table), where_clause);
    q
}

/// CREATE TABLE IF NOT EXISTS with primary key, unique and foreign-key constraints.
pub fn create_table(table: &Table) -> String {
    let mut defs: Vec<String> = Vec::new();
    for c in &table.columns {
        let mut def = format!("{} {}", quoted(&c.name), c.sql_type);
        if c.identity {
            def.push_str(" GENERATED BY DEFAULT AS IDENTITY");
        }
        if !c.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(d) = &c.default {
            def.push_str(" DEFAULT ");
            def.push_str(d);
        }
        defs.push(def);
    }
    let pk: Vec<String> = table.primary_key().iter().map(|c| quoted(&c.name)).collect();
    if !pk.is_empty() {
        defs.push(format!("PRIMARY KEY ({})", pk.join(", ")));
    }
    for u in &table.unique {
        let cols: Vec<String> = u.iter().map(|s| quoted(s)).collect();
        defs.push(format!("UNIQUE ({})", cols.join(", ")));
    }
    for fk in &table.foreign_keys {
        let target = match fk.references_table.split_once('.') {
            Some((schema, name)) => format!("{}.{}", quoted(schema), quoted(name)),
            None => quoted(&fk.references_table),
        };
        let mut def = format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            quoted(&fk.column),
            target,
            quoted(&fk.references_column)
        );
        if fk.on_delete_cascade {
            def.push_str(" ON DELETE CASCADE");
        }
        defs.push(def);
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        qualified_table(table),
        defs.join(",\n    ")
    )
}
