//! Transactional sessions: one per request, consumed by exactly one commit or rollback.
//!
//! Writes that break a storage rule fail with [`AppError::Constraint`]; every other
//! storage failure is a plain error the caller propagates.

mod memory;
mod postgres;

pub use memory::{MemorySession, MemoryStore};
pub use postgres::{PgDatabase, PgSession};

use crate::error::AppError;
use crate::model::{ChildCollection, Query, Table};
use crate::parser::Record;
use async_trait::async_trait;

#[async_trait]
pub trait Session: Send + Sized {
    /// First row matching the query (ordered by primary key).
    async fn first(&mut self, query: &Query<'_>) -> Result<Option<Record>, AppError>;

    /// First row matching the query together with its child rows, loaded in one round-trip.
    async fn first_with_children(
        &mut self,
        query: &Query<'_>,
        children: &ChildCollection<'_>,
    ) -> Result<Option<(Record, Vec<Record>)>, AppError>;

    /// Insert one row; returns the stored row including generated columns.
    async fn insert(&mut self, table: &Table, record: &Record) -> Result<Record, AppError>;

    /// Set `changes` on every matching row. Returns the number of rows affected.
    async fn update(&mut self, query: &Query<'_>, changes: &Record) -> Result<u64, AppError>;

    /// Delete every matching row without loading it. Returns the number of rows deleted.
    async fn delete(&mut self, query: &Query<'_>) -> Result<u64, AppError>;

    async fn commit(self) -> Result<(), AppError>;

    async fn rollback(self) -> Result<(), AppError>;
}

/// Source of sessions, shared across requests.
#[async_trait]
pub trait Database: Clone + Send + Sync + 'static {
    type Session: Session;

    async fn begin(&self) -> Result<Self::Session, AppError>;

    /// Round-trip used by readiness checks.
    async fn ping(&self) -> Result<(), AppError>;
}

/// Commit when `result` is Ok, roll back otherwise. The result passes through; a failed
/// rollback after an error is logged and the original error kept.
pub async fn commit_if_ok<S: Session, T>(session: S, result: Result<T, AppError>) -> Result<T, AppError> {
    match result {
        Ok(v) => {
            session.commit().await?;
            Ok(v)
        }
        Err(e) => {
            if let Err(rb) = session.rollback().await {
                tracing::warn!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}
