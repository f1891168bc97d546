//! Apply the table model to the database: CREATE SCHEMA, then CREATE TABLE in
//! foreign-key order. Idempotent (IF NOT EXISTS); existing tables are not altered.

use crate::error::{AppError, ConfigError};
use crate::model::{validate, Table};
use crate::sql::{create_table, quoted};
use sqlx::PgPool;
use std::collections::{BTreeSet, HashSet};

/// DDL statements in execution order. Validates the model first.
pub fn plan_migrations(tables: &[&Table]) -> Result<Vec<String>, ConfigError> {
    validate(tables)?;

    let schemas: BTreeSet<&str> = tables.iter().filter_map(|t| t.schema.as_deref()).collect();
    let mut statements: Vec<String> = schemas
        .into_iter()
        .map(|s| format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(s)))
        .collect();

    // A table is created once every table it references exists.
    let mut created: HashSet<String> = HashSet::new();
    let mut pending: Vec<&Table> = tables.to_vec();
    while !pending.is_empty() {
        let (ready, blocked): (Vec<&Table>, Vec<&Table>) = pending.into_iter().partition(|t| {
            t.foreign_keys
                .iter()
                .all(|fk| fk.references_table == t.qualified_name() || created.contains(&fk.references_table))
        });
        if ready.is_empty() {
            return Err(ConfigError::MissingReference {
                kind: "table order",
                id: blocked.iter().map(|t| t.qualified_name()).collect::<Vec<_>>().join(", "),
            });
        }
        for t in ready {
            statements.push(create_table(t));
            created.insert(t.qualified_name());
        }
        pending = blocked;
    }
    Ok(statements)
}

pub async fn apply_migrations(pool: &PgPool, tables: &[&Table]) -> Result<(), AppError> {
    for sql in plan_migrations(tables)? {
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(&sql).execute(pool).await?;
    }
    tracing::info!(tables = tables.len(), "migrations applied");
    Ok(())
}
