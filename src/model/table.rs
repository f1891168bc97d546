//! Declarative table description shared by the SQL builder, migrations and the memory store.

use crate::error::AppError;
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct Column {
    pub name: String,
    /// PostgreSQL type name, used for DDL and for `$n::type` parameter casts.
    pub sql_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    /// `GENERATED BY DEFAULT AS IDENTITY`.
    pub identity: bool,
    /// SQL default expression (e.g. `NOW()`, `gen_random_uuid()`).
    pub default: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            primary_key: false,
            identity: false,
            default: None,
        }
    }

    /// Auto-numbered `bigint` primary key.
    pub fn id(name: impl Into<String>) -> Self {
        Column::new(name, "bigint").primary_key().identity()
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Whether the database fills this column when an insert omits it.
    pub fn has_default(&self) -> bool {
        self.identity || self.default.is_some()
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self.sql_type.trim().to_lowercase().as_str(),
            "smallint" | "integer" | "int" | "bigint" | "int2" | "int4" | "int8"
                | "smallserial" | "serial" | "bigserial" | "serial2" | "serial4" | "serial8"
        )
    }

    pub fn is_uuid(&self) -> bool {
        self.sql_type.to_lowercase().contains("uuid")
    }

    pub fn is_bool(&self) -> bool {
        self.sql_type.to_lowercase().starts_with("bool")
    }

    /// Convert a path segment (or header value) into the JSON value stored for this column.
    pub fn parse_value(&self, s: &str) -> Result<Value, AppError> {
        if self.is_integer() {
            let n: i64 = s
                .trim()
                .parse()
                .map_err(|_| AppError::validation(&self.name, "must be an integer"))?;
            return Ok(Value::Number(n.into()));
        }
        if self.is_uuid() {
            let u = uuid::Uuid::parse_str(s.trim()).map_err(|_| AppError::validation(&self.name, "must be a valid UUID"))?;
            return Ok(Value::String(u.to_string()));
        }
        if self.is_bool() {
            if s.eq_ignore_ascii_case("true") {
                return Ok(Value::Bool(true));
            }
            if s.eq_ignore_ascii_case("false") {
                return Ok(Value::Bool(false));
            }
            return Err(AppError::validation(&self.name, "must be a boolean"));
        }
        Ok(Value::String(s.to_string()))
    }
}

#[derive(Clone, Debug)]
pub struct ForeignKey {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
    pub on_delete_cascade: bool,
}

#[derive(Clone, Debug)]
pub struct Table {
    pub schema: Option<String>,
    pub name: String,
    pub columns: Vec<Column>,
    /// Column sets with a uniqueness rule, besides the primary key.
    pub unique: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            schema: None,
            name: name.into(),
            columns: Vec::new(),
            unique: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.unique.push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// `column` references `table.references_column` (restrict on delete).
    pub fn references(mut self, column: &str, table: &Table, references_column: &str) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.to_string(),
            references_table: table.qualified_name(),
            references_column: references_column.to_string(),
            on_delete_cascade: false,
        });
        self
    }

    pub fn references_cascade(mut self, column: &str, table: &Table, references_column: &str) -> Self {
        self = self.references(column, table, references_column);
        if let Some(fk) = self.foreign_keys.last_mut() {
            fk.on_delete_cascade = true;
        }
        self
    }

    /// `schema.name`, or `name` when no schema is set. Used as the table's identity in the model.
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(s) => format!("{}.{}", s, self.name),
            None => self.name.clone(),
        }
    }

    pub fn column_named(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    /// First primary-key column. Tables without one are rejected by [`crate::model::validate`].
    pub fn pk(&self) -> &str {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .unwrap_or("id")
    }

    /// Parse a raw identifier for `column`; unknown columns keep the text as-is.
    pub fn parse_value(&self, column: &str, s: &str) -> Result<Value, AppError> {
        match self.column_named(column) {
            Some(c) => c.parse_value(s),
            None => Ok(Value::String(s.to_string())),
        }
    }
}
