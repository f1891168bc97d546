//! Read, update and delete of one resource located by a selector.

use crate::error::AppError;
use crate::model::Query;
use crate::parser::{Record, RequestParser};
use crate::resource::Resource;
use crate::session::{commit_if_ok, Session};
use serde_json::Value;
use std::marker::PhantomData;

pub struct SingleResource<R> {
    parser: RequestParser,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> SingleResource<R> {
    /// `parser` declares the fields an update may change.
    pub fn new(parser: RequestParser) -> Self {
        SingleResource {
            parser,
            _resource: PhantomData,
        }
    }

    pub fn parser(&self) -> &RequestParser {
        &self.parser
    }

    /// Serialized resource, or NotFound.
    pub async fn read<S: Session>(&self, mut session: S, selector: &R::Selector) -> Result<Value, AppError> {
        let row = session.first(&R::query(selector)).await;
        session.rollback().await?;
        let row = row?.ok_or_else(|| not_found::<R>())?;
        R::from_record(row)?.as_dict()
    }

    /// Overwrite the schema's fields on the located resource and commit. The payload is
    /// only parsed once the resource is known to exist.
    pub async fn update<S: Session>(
        &self,
        mut session: S,
        selector: &R::Selector,
        payload: &Value,
    ) -> Result<Value, AppError> {
        let result = self.apply_update(&mut session, selector, payload).await;
        let entity = commit_if_ok(session, result).await?;
        entity.as_dict()
    }

    async fn apply_update<S: Session>(
        &self,
        session: &mut S,
        selector: &R::Selector,
        payload: &Value,
    ) -> Result<R, AppError> {
        let row = session.first(&R::query(selector)).await?.ok_or_else(|| not_found::<R>())?;
        let mut entity = R::from_record(row)?;
        let args = self.parser.parse(payload)?;
        for (field, value) in &args {
            entity.assign(field, value.clone())?;
        }

        let table = R::table();
        let stored = entity.to_record()?;
        let id = stored
            .get(table.pk())
            .cloned()
            .ok_or_else(|| AppError::Storage(format!("{} has no {} field", table.name, table.pk())))?;
        let changes: Record = args
            .keys()
            .filter_map(|k| stored.get(k).map(|v| (k.clone(), v.clone())))
            .collect();
        session.update(&Query::by_pk(table, id), &changes).await?;
        Ok(entity)
    }

    /// Bulk delete of every row the selector matches; commits even when nothing matched.
    pub async fn delete<S: Session>(&self, mut session: S, selector: &R::Selector) -> Result<(), AppError> {
        let deleted = session.delete(&R::query(selector)).await;
        let deleted = commit_if_ok(session, deleted).await?;
        if deleted == 0 {
            return Err(not_found::<R>());
        }
        tracing::debug!(table = %R::table().name, rows = deleted, "deleted");
        Ok(())
    }
}

pub(crate) fn not_found<R: Resource>() -> AppError {
    AppError::NotFound(R::table().name.clone())
}
