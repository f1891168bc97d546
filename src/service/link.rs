//! Parent/child and association-table controllers.

use crate::error::{AppError, ConstraintKind};
use crate::identity::IdentityProvider;
use crate::model::{ChildCollection, Query, Table};
use crate::parser::{Record, RequestParser};
use crate::resource::{Resource, CREATOR_ID};
use crate::service::create::{creator_value, new_record};
use crate::session::{commit_if_ok, Session};
use serde_json::{Map, Value};
use std::marker::PhantomData;

/// Children of type `C` created under, and listed from, a parent row.
pub struct ChildLink<C> {
    parser: RequestParser,
    parent: &'static Table,
    parent_id_name: String,
    collection: ChildCollection<'static>,
    _child: PhantomData<fn() -> C>,
}

impl<C: Resource> ChildLink<C> {
    /// `parent_id_name` is the child column referencing the parent's primary key;
    /// `collection` is the key the listing is returned under.
    pub fn new(
        parser: RequestParser,
        parent: &'static Table,
        parent_id_name: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        let parent_id_name = parent_id_name.into();
        ChildLink {
            parser,
            parent,
            collection: ChildCollection::new(collection, C::table(), parent_id_name.clone()),
            parent_id_name,
            _child: PhantomData,
        }
    }

    pub fn parser(&self) -> &RequestParser {
        &self.parser
    }

    pub fn parent_id_name(&self) -> &str {
        &self.parent_id_name
    }

    pub fn collection(&self) -> &str {
        &self.collection.name
    }

    /// Parsed payload plus the injected `creator_id` and parent reference.
    pub fn build_args<I>(&self, identity: &I, parent_id: &str, payload: &Value) -> Result<Record, AppError>
    where
        I: IdentityProvider + ?Sized,
    {
        let creator = identity.current_identity()?;
        let mut args = self.parser.parse(payload)?;
        args.insert(CREATOR_ID.to_string(), creator_value::<C>(&creator)?);
        let parent_id = C::table()
            .parse_value(&self.parent_id_name, parent_id)
            .map_err(|_| AppError::NotFound(self.parent.name.clone()))?;
        args.insert(self.parent_id_name.clone(), parent_id);
        Ok(args)
    }

    /// Insert the child built from `args`. A reference to a missing parent is NotFound.
    pub async fn create_resource<S: Session>(&self, mut session: S, args: Record) -> Result<Value, AppError> {
        let record = match new_record::<C>(args) {
            Ok(r) => r,
            Err(e) => return commit_if_ok(session, Err(e)).await,
        };
        match session.insert(C::table(), &record).await {
            Ok(row) => {
                session.commit().await?;
                C::from_record(row)?.as_dict()
            }
            Err(e) if e.is_constraint(ConstraintKind::ForeignKey) => {
                tracing::debug!(table = %C::table().name, parent = %self.parent.name, "parent missing");
                session.rollback().await?;
                Err(AppError::NotFound(self.parent.name.clone()))
            }
            Err(e) => commit_if_ok(session, Err(e)).await,
        }
    }

    pub async fn create<S, I>(&self, session: S, identity: &I, parent_id: &str, payload: &Value) -> Result<Value, AppError>
    where
        S: Session,
        I: IdentityProvider + ?Sized,
    {
        let args = match self.build_args(identity, parent_id, payload) {
            Ok(a) => a,
            Err(e) => return commit_if_ok(session, Err(e)).await,
        };
        self.create_resource(session, args).await
    }

    /// `{collection: [child, ...]}` ordered by child primary key, loaded with the parent
    /// in one query.
    pub async fn list<S: Session>(&self, mut session: S, parent_id: &str) -> Result<Value, AppError> {
        let loaded = match self.parent.parse_value(self.parent.pk(), parent_id) {
            Ok(id) => {
                session
                    .first_with_children(&Query::by_pk(self.parent, id), &self.collection)
                    .await
            }
            Err(_) => Ok(None),
        };
        session.rollback().await?;
        let (_, children) = loaded?.ok_or_else(|| AppError::NotFound(self.parent.name.clone()))?;

        let items = children
            .into_iter()
            .map(|row| C::from_record(row)?.as_dict())
            .collect::<Result<Vec<_>, _>>()?;
        let mut body = Map::new();
        body.insert(self.collection.name.clone(), Value::Array(items));
        Ok(Value::Object(body))
    }
}

/// Many-to-many association rows `(left_id, right_id)`, unique on the pair.
pub struct JoinLink {
    table: &'static Table,
    left_id_name: String,
    right_id_name: String,
}

impl JoinLink {
    pub fn new(table: &'static Table, left_id_name: impl Into<String>, right_id_name: impl Into<String>) -> Self {
        JoinLink {
            table,
            left_id_name: left_id_name.into(),
            right_id_name: right_id_name.into(),
        }
    }

    pub fn table(&self) -> &Table {
        self.table
    }

    /// Typed pair record. Ids that do not fit their columns cannot name existing rows.
    pub fn parse_ids(&self, left_id: &str, right_id: &str) -> Result<Record, AppError> {
        let not_found = |_| AppError::NotFound(self.table.name.clone());
        let mut pair = Record::new();
        pair.insert(
            self.left_id_name.clone(),
            self.table.parse_value(&self.left_id_name, left_id).map_err(not_found)?,
        );
        pair.insert(
            self.right_id_name.clone(),
            self.table.parse_value(&self.right_id_name, right_id).map_err(not_found)?,
        );
        Ok(pair)
    }

    /// Idempotent: an existing pair is success and the transaction is rolled back.
    pub async fn link<S: Session>(&self, mut session: S, left_id: &str, right_id: &str) -> Result<(), AppError> {
        let pair = match self.parse_ids(left_id, right_id) {
            Ok(p) => p,
            Err(e) => return commit_if_ok(session, Err(e)).await,
        };
        match session.insert(self.table, &pair).await {
            Ok(_) => session.commit().await,
            Err(e) if e.is_constraint(ConstraintKind::Unique) => {
                tracing::debug!(table = %self.table.name, "already linked");
                session.rollback().await
            }
            Err(e) if e.is_constraint(ConstraintKind::ForeignKey) => {
                tracing::debug!(table = %self.table.name, "link target missing");
                session.rollback().await?;
                Err(AppError::NotFound(self.table.name.clone()))
            }
            Err(e) => commit_if_ok(session, Err(e)).await,
        }
    }

    /// Delete the exact pair. The session is committed even when nothing matched.
    pub async fn unlink<S: Session>(&self, mut session: S, left_id: &str, right_id: &str) -> Result<(), AppError> {
        let pair = match self.parse_ids(left_id, right_id) {
            Ok(p) => p,
            Err(e) => return commit_if_ok(session, Err(e)).await,
        };
        let query = pair
            .into_iter()
            .fold(Query::new(self.table), |q, (col, val)| q.filter_by(&col, val));
        let deleted = session.delete(&query).await;
        let deleted = commit_if_ok(session, deleted).await?;
        if deleted == 0 {
            return Err(AppError::NotFound(self.table.name.clone()));
        }
        Ok(())
    }
}
