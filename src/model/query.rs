//! Lazy queries: a table plus equality filters, executed later through a session.

use crate::model::Table;
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct Query<'t> {
    pub table: &'t Table,
    /// `column = value`, combined with AND.
    pub filters: Vec<(String, Value)>,
}

impl<'t> Query<'t> {
    /// Matches every row of `table`.
    pub fn new(table: &'t Table) -> Self {
        Query {
            table,
            filters: Vec::new(),
        }
    }

    /// Row(s) whose primary key equals `id`.
    pub fn by_pk(table: &'t Table, id: impl Into<Value>) -> Self {
        Query::new(table).filter_by(table.pk(), id)
    }

    pub fn filter_by(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    /// Whether `row` satisfies every filter. A missing column never matches.
    pub fn matches(&self, row: &serde_json::Map<String, Value>) -> bool {
        self.filters
            .iter()
            .all(|(col, val)| row.get(col).map(|v| values_equal(v, val)).unwrap_or(false))
    }
}

/// Numbers compare by value so `1` and `1.0` match, as they would in SQL.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => match (n.as_i64(), m.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => n.as_f64() == m.as_f64(),
        },
        (Value::Null, _) | (_, Value::Null) => false,
        _ => a == b,
    }
}

/// A parent's named collection of child rows, joined on `foreign_key = parent.pk`.
#[derive(Clone, Debug)]
pub struct ChildCollection<'t> {
    pub name: String,
    pub table: &'t Table,
    pub foreign_key: String,
}

impl<'t> ChildCollection<'t> {
    pub fn new(name: impl Into<String>, table: &'t Table, foreign_key: impl Into<String>) -> Self {
        ChildCollection {
            name: name.into(),
            table,
            foreign_key: foreign_key.into(),
        }
    }
}
