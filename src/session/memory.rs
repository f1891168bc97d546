//! In-process storage engine for tests and local development.
//!
//! Enforces the same rules PostgreSQL would for the declared model: NOT NULL, primary
//! key, unique column sets and foreign keys (restrict or cascade on delete). A session
//! reads a snapshot taken at `begin` plus its own writes. `commit` replays the session's
//! writes onto the current shared state, re-checking every rule, so overlapping sessions
//! keep each other's committed work; a replay that breaks a rule fails the commit and
//! changes nothing. Identity values come from the shared table, like a sequence, and
//! are never handed out twice. After a failed statement the session is aborted: further
//! statements fail and `commit` discards its work.

use crate::error::{AppError, ConfigError, ConstraintKind, ConstraintViolation};
use crate::model::{validate, values_equal, ChildCollection, Column, Query, Table};
use crate::parser::Record;
use crate::session::{Database, Session};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug)]
struct MemTable {
    def: Table,
    rows: Vec<Record>,
    next_id: i64,
}

#[derive(Clone, Debug, Default)]
struct State {
    tables: HashMap<String, MemTable>,
}

#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Store holding empty tables for the given (validated) model.
    pub fn new(tables: &[&Table]) -> Result<Self, ConfigError> {
        validate(tables)?;
        let tables = tables
            .iter()
            .map(|t| {
                (
                    t.qualified_name(),
                    MemTable {
                        def: (*t).clone(),
                        rows: Vec::new(),
                        next_id: 1,
                    },
                )
            })
            .collect();
        Ok(MemoryStore {
            state: Arc::new(Mutex::new(State { tables })),
        })
    }

    /// Committed rows of `table`, in insertion order.
    pub fn rows(&self, table: &Table) -> Vec<Record> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.tables.get(&table.qualified_name()).map(|t| t.rows.clone()))
            .unwrap_or_default()
    }

    fn snapshot(&self) -> Result<State, AppError> {
        self.state
            .lock()
            .map(|s| s.clone())
            .map_err(|_| AppError::Storage("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl Database for MemoryStore {
    type Session = MemorySession;

    async fn begin(&self) -> Result<MemorySession, AppError> {
        Ok(MemorySession {
            store: self.state.clone(),
            working: self.snapshot()?,
            writes: Vec::new(),
            aborted: false,
        })
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.snapshot().map(|_| ())
    }
}

/// A statement that changed the working state, replayed at commit.
enum Write {
    Insert { def: Table, row: Record },
    Update { def: Table, filters: Vec<(String, Value)>, changes: Record },
    Delete { def: Table, filters: Vec<(String, Value)> },
}

pub struct MemorySession {
    store: Arc<Mutex<State>>,
    working: State,
    writes: Vec<Write>,
    aborted: bool,
}

impl MemorySession {
    fn guard(&self) -> Result<(), AppError> {
        if self.aborted {
            return Err(AppError::Storage(
                "current transaction is aborted, commands ignored until end of transaction block".into(),
            ));
        }
        Ok(())
    }

    /// Run a statement; any error aborts the session.
    fn run<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, AppError>) -> Result<T, AppError> {
        self.guard()?;
        let out = f(self);
        if out.is_err() {
            self.aborted = true;
        }
        out
    }

    fn shared(&self) -> Result<std::sync::MutexGuard<'_, State>, AppError> {
        self.store
            .lock()
            .map_err(|_| AppError::Storage("memory store lock poisoned".into()))
    }

    /// Next identity value of `def`, taken from the shared table.
    fn next_id(&self, def: &Table) -> Result<i64, AppError> {
        let mut shared = self.shared()?;
        let t = shared.table_mut(def)?;
        let id = t.next_id;
        t.next_id += 1;
        Ok(id)
    }

    /// Keep the shared sequence ahead of an explicitly supplied identity value.
    fn reserve_id(&self, def: &Table, id: i64) -> Result<(), AppError> {
        let mut shared = self.shared()?;
        let t = shared.table_mut(def)?;
        t.next_id = t.next_id.max(id + 1);
        Ok(())
    }

    fn insert_row(&mut self, table: &Table, record: &Record) -> Result<Record, AppError> {
        let def = self.working.table(table)?.def.clone();
        let mut row = Record::new();
        for c in &def.columns {
            let v = match record.get(&c.name).filter(|v| !v.is_null()) {
                Some(v) => {
                    let v = coerce(c, v)?;
                    if let (true, Some(n)) = (c.identity, v.as_i64()) {
                        self.reserve_id(&def, n)?;
                    }
                    v
                }
                None if c.identity => Value::Number(self.next_id(&def)?.into()),
                None => c.default.as_deref().map(eval_default).unwrap_or(Value::Null),
            };
            row.insert(c.name.clone(), v);
        }
        self.working.put(&def, row.clone())?;
        self.writes.push(Write::Insert { def, row: row.clone() });
        Ok(row)
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn first(&mut self, query: &Query<'_>) -> Result<Option<Record>, AppError> {
        self.run(|s| {
            let t = s.working.table(query.table)?;
            Ok(t.sorted_matches(query).into_iter().next().cloned())
        })
    }

    async fn first_with_children(
        &mut self,
        query: &Query<'_>,
        children: &ChildCollection<'_>,
    ) -> Result<Option<(Record, Vec<Record>)>, AppError> {
        self.run(|s| {
            let state = &s.working;
            let parent_table = state.table(query.table)?;
            let Some(parent) = parent_table.sorted_matches(query).into_iter().next().cloned() else {
                return Ok(None);
            };
            let key = parent.get(query.table.pk()).cloned().unwrap_or(Value::Null);
            let child_query = Query::new(children.table).filter_by(&children.foreign_key, key);
            let kids = state
                .table(children.table)?
                .sorted_matches(&child_query)
                .into_iter()
                .cloned()
                .collect();
            Ok(Some((parent, kids)))
        })
    }

    async fn insert(&mut self, table: &Table, record: &Record) -> Result<Record, AppError> {
        self.run(|s| s.insert_row(table, record))
    }

    async fn update(&mut self, query: &Query<'_>, changes: &Record) -> Result<u64, AppError> {
        self.run(|s| {
            let n = s.working.update(query, changes)?;
            s.writes.push(Write::Update {
                def: query.table.clone(),
                filters: query.filters.clone(),
                changes: changes.clone(),
            });
            Ok(n)
        })
    }

    async fn delete(&mut self, query: &Query<'_>) -> Result<u64, AppError> {
        self.run(|s| {
            let n = s.working.delete(query)?;
            s.writes.push(Write::Delete {
                def: query.table.clone(),
                filters: query.filters.clone(),
            });
            Ok(n)
        })
    }

    async fn commit(self) -> Result<(), AppError> {
        if self.aborted || self.writes.is_empty() {
            return Ok(());
        }
        let mut shared = self.shared()?;
        let mut next = shared.clone();
        for w in &self.writes {
            next.apply(w)?;
        }
        *shared = next;
        Ok(())
    }

    async fn rollback(self) -> Result<(), AppError> {
        Ok(())
    }
}

impl MemTable {
    fn sorted_matches(&self, query: &Query<'_>) -> Vec<&Record> {
        let pk = self.def.pk();
        let mut rows: Vec<&Record> = self.rows.iter().filter(|r| query.matches(r)).collect();
        rows.sort_by(|a, b| cmp_values(a.get(pk), b.get(pk)));
        rows
    }

    /// Check NOT NULL and uniqueness for `row`, ignoring the row at `skip`.
    fn check_row(&self, row: &Record, skip: Option<usize>) -> Result<(), AppError> {
        let name = &self.def.name;
        for c in &self.def.columns {
            if !c.nullable && row.get(&c.name).map(Value::is_null).unwrap_or(true) {
                return Err(AppError::Constraint(ConstraintViolation::named(
                    ConstraintKind::NotNull,
                    format!("{}.{}", name, c.name),
                )));
            }
        }
        let pk: Vec<String> = self.def.primary_key().iter().map(|c| c.name.clone()).collect();
        let mut sets = vec![(format!("{}_pkey", name), pk)];
        for u in &self.def.unique {
            sets.push((format!("{}_{}_key", name, u.join("_")), u.clone()));
        }
        for (constraint, cols) in sets {
            let clash = self.rows.iter().enumerate().any(|(i, other)| {
                Some(i) != skip
                    && cols.iter().all(|c| match (row.get(c), other.get(c)) {
                        (Some(a), Some(b)) => values_equal(a, b),
                        _ => false,
                    })
            });
            if clash {
                return Err(AppError::Constraint(ConstraintViolation::named(ConstraintKind::Unique, constraint)));
            }
        }
        Ok(())
    }
}

impl State {
    fn table(&self, def: &Table) -> Result<&MemTable, AppError> {
        self.tables
            .get(&def.qualified_name())
            .ok_or_else(|| AppError::Storage(format!("relation \"{}\" does not exist", def.qualified_name())))
    }

    fn table_mut(&mut self, def: &Table) -> Result<&mut MemTable, AppError> {
        self.tables
            .get_mut(&def.qualified_name())
            .ok_or_else(|| AppError::Storage(format!("relation \"{}\" does not exist", def.qualified_name())))
    }

    /// Every foreign key of `row` must point at an existing row.
    fn check_references(&self, def: &Table, row: &Record) -> Result<(), AppError> {
        for fk in &def.foreign_keys {
            let Some(v) = row.get(&fk.column).filter(|v| !v.is_null()) else {
                continue;
            };
            let target = self
                .tables
                .get(&fk.references_table)
                .ok_or_else(|| AppError::Storage(format!("relation \"{}\" does not exist", fk.references_table)))?;
            let found = target
                .rows
                .iter()
                .any(|r| r.get(&fk.references_column).map(|x| values_equal(x, v)).unwrap_or(false));
            if !found {
                return Err(AppError::Constraint(ConstraintViolation::named(
                    ConstraintKind::ForeignKey,
                    format!("{}_{}_fkey", def.name, fk.column),
                )));
            }
        }
        Ok(())
    }

    /// Add a fully built row after checking every rule against this state.
    fn put(&mut self, def: &Table, row: Record) -> Result<(), AppError> {
        self.table(def)?.check_row(&row, None)?;
        self.check_references(def, &row)?;
        self.table_mut(def)?.rows.push(row);
        Ok(())
    }

    /// Re-run a session's statement against this state.
    fn apply(&mut self, write: &Write) -> Result<(), AppError> {
        match write {
            Write::Insert { def, row } => self.put(def, row.clone()),
            Write::Update { def, filters, changes } => {
                let query = Query {
                    table: def,
                    filters: filters.clone(),
                };
                self.update(&query, changes).map(|_| ())
            }
            Write::Delete { def, filters } => {
                let query = Query {
                    table: def,
                    filters: filters.clone(),
                };
                self.delete(&query).map(|_| ())
            }
        }
    }

    fn update(&mut self, query: &Query<'_>, changes: &Record) -> Result<u64, AppError> {
        let def = query.table;
        let t = self.table(def)?;
        let mut staged = t.clone();
        let mut touched = Vec::new();
        for (i, row) in staged.rows.iter_mut().enumerate() {
            if !query.matches(row) {
                continue;
            }
            for c in def.columns.iter().filter(|c| !c.primary_key) {
                if let Some(v) = changes.get(&c.name) {
                    let v = if v.is_null() { Value::Null } else { coerce(c, v)? };
                    row.insert(c.name.clone(), v);
                }
            }
            touched.push(i);
        }
        for &i in &touched {
            let row = staged.rows[i].clone();
            staged.check_row(&row, Some(i))?;
            self.check_references(def, &row)?;
        }
        *self.table_mut(def)? = staged;
        Ok(touched.len() as u64)
    }

    fn delete(&mut self, query: &Query<'_>) -> Result<u64, AppError> {
        let def = query.table;
        let doomed: BTreeSet<usize> = self
            .table(def)?
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| query.matches(r))
            .map(|(i, _)| i)
            .collect();
        let count = doomed.len() as u64;
        let mut plan: HashMap<String, BTreeSet<usize>> = HashMap::new();
        self.plan_delete(&def.qualified_name(), doomed, &mut plan)?;
        for (name, indices) in plan {
            if let Some(t) = self.tables.get_mut(&name) {
                let mut i = 0;
                t.rows.retain(|_| {
                    let keep = !indices.contains(&i);
                    i += 1;
                    keep
                });
            }
        }
        Ok(count)
    }

    /// Add `indices` of `table` to the plan and follow foreign keys pointing at them:
    /// cascade into referencing rows, or fail when the key restricts deletes.
    fn plan_delete(
        &self,
        table: &str,
        indices: BTreeSet<usize>,
        plan: &mut HashMap<String, BTreeSet<usize>>,
    ) -> Result<(), AppError> {
        let entry = plan.entry(table.to_string()).or_default();
        let fresh: Vec<usize> = indices.into_iter().filter(|i| entry.insert(*i)).collect();
        if fresh.is_empty() {
            return Ok(());
        }
        let Some(parent) = self.tables.get(table) else {
            return Ok(());
        };
        let removed: Vec<&Record> = fresh.iter().filter_map(|&i| parent.rows.get(i)).collect();
        for child in self.tables.values() {
            for fk in child.def.foreign_keys.iter().filter(|fk| fk.references_table == table) {
                let hits: BTreeSet<usize> = child
                    .rows
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| {
                        r.get(&fk.column)
                            .map(|v| {
                                removed.iter().any(|p| {
                                    p.get(&fk.references_column).map(|k| values_equal(k, v)).unwrap_or(false)
                                })
                            })
                            .unwrap_or(false)
                    })
                    .map(|(i, _)| i)
                    .collect();
                if hits.is_empty() {
                    continue;
                }
                if !fk.on_delete_cascade {
                    return Err(AppError::Constraint(ConstraintViolation::named(
                        ConstraintKind::ForeignKey,
                        format!("{}_{}_fkey", child.def.name, fk.column),
                    )));
                }
                self.plan_delete(&child.def.qualified_name(), hits, plan)?;
            }
        }
        Ok(())
    }
}

/// Store values in the column's JSON shape, as a typed database column would.
fn coerce(column: &Column, v: &Value) -> Result<Value, AppError> {
    match v {
        Value::String(s) if column.is_integer() || column.is_bool() || column.is_uuid() => column.parse_value(s),
        Value::Number(n) if column.sql_type.eq_ignore_ascii_case("text") => Ok(Value::String(n.to_string())),
        _ => Ok(v.clone()),
    }
}

/// Evaluate the default expressions the memory engine understands; anything else is NULL.
fn eval_default(expr: &str) -> Value {
    let e = expr.trim();
    match e.to_lowercase().as_str() {
        "now()" | "current_timestamp" => return Value::String(chrono::Utc::now().to_rfc3339()),
        "gen_random_uuid()" => return Value::String(uuid::Uuid::new_v4().to_string()),
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = e.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Some(s) = e.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Value::String(s.replace("''", "'"));
    }
    Value::Null
}

fn cmp_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
