//! Table model validation: referential integrity between declared tables.

use crate::error::ConfigError;
use crate::model::Table;
use std::collections::{HashMap, HashSet};

/// Check that every table has a primary key, unique sets and foreign keys name real
/// columns, and foreign keys point at declared tables.
pub fn validate(tables: &[&Table]) -> Result<(), ConfigError> {
    let mut by_name: HashMap<String, &Table> = HashMap::new();
    for t in tables {
        if by_name.insert(t.qualified_name(), t).is_some() {
            return Err(ConfigError::DuplicateTable(t.qualified_name()));
        }
    }

    for t in tables {
        if t.primary_key().is_empty() {
            return Err(ConfigError::MissingPrimaryKey(t.qualified_name()));
        }
        let columns: HashSet<&str> = t.columns.iter().map(|c| c.name.as_str()).collect();
        for set in &t.unique {
            for col in set {
                if !columns.contains(col.as_str()) {
                    return Err(ConfigError::MissingReference {
                        kind: "column",
                        id: format!("{}.{}", t.qualified_name(), col),
                    });
                }
            }
        }
        for fk in &t.foreign_keys {
            if !columns.contains(fk.column.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", t.qualified_name(), fk.column),
                });
            }
            let target = by_name.get(&fk.references_table).ok_or_else(|| ConfigError::MissingReference {
                kind: "table",
                id: fk.references_table.clone(),
            })?;
            if target.column_named(&fk.references_column).is_none() {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", fk.references_table, fk.references_column),
                });
            }
        }
    }

    Ok(())
}
