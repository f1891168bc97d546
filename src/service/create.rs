//! Creation of a resource attributed to the calling identity.

use crate::error::AppError;
use crate::identity::IdentityProvider;
use crate::parser::{Record, RequestParser};
use crate::resource::{Resource, CREATOR_ID};
use crate::session::{commit_if_ok, Session};
use serde_json::Value;
use std::marker::PhantomData;

pub struct OwnedCreate<R> {
    parser: RequestParser,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> OwnedCreate<R> {
    pub fn new(parser: RequestParser) -> Self {
        OwnedCreate {
            parser,
            _resource: PhantomData,
        }
    }

    pub fn parser(&self) -> &RequestParser {
        &self.parser
    }

    /// Parse, stamp `creator_id`, insert and commit. Unconditional insert: any
    /// constraint violation is returned to the caller as is.
    pub async fn create<S, I>(&self, mut session: S, identity: &I, payload: &Value) -> Result<Value, AppError>
    where
        S: Session,
        I: IdentityProvider + ?Sized,
    {
        let record = match self.build_record(identity, payload) {
            Ok(r) => r,
            Err(e) => return commit_if_ok(session, Err(e)).await,
        };
        let inserted = session.insert(R::table(), &record).await;
        let row = commit_if_ok(session, inserted).await?;
        R::from_record(row)?.as_dict()
    }

    /// Identity first, then the payload, then the resource's constructor.
    fn build_record<I>(&self, identity: &I, payload: &Value) -> Result<Record, AppError>
    where
        I: IdentityProvider + ?Sized,
    {
        let creator = identity.current_identity()?;
        let mut args = self.parser.parse(payload)?;
        args.insert(CREATOR_ID.to_string(), creator_value::<R>(&creator)?);
        new_record::<R>(args)
    }
}

/// Caller id in the shape of the resource's `creator_id` column. An id that does not
/// fit the column cannot belong to a real caller.
pub(crate) fn creator_value<R: Resource>(creator: &str) -> Result<Value, AppError> {
    R::table()
        .parse_value(CREATOR_ID, creator)
        .map_err(|_| AppError::Unauthorized)
}

/// Run the resource's constructor and return the row to insert.
pub(crate) fn new_record<R: Resource>(args: Record) -> Result<Record, AppError> {
    let new = R::new(args)?;
    match serde_json::to_value(&new) {
        Ok(Value::Object(m)) => Ok(m),
        Ok(_) => Err(AppError::Storage("new resource must serialize to an object".into())),
        Err(e) => Err(AppError::Storage(format!("serialize new resource: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{CallerId, StaticIdentity};
    use crate::model::{ChildCollection, Column, Query, Table};
    use crate::resource::field_value;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, OnceLock};

    #[derive(Serialize, Deserialize)]
    struct Note {
        id: i64,
        body: String,
        creator_id: i64,
    }

    #[derive(Serialize, Deserialize)]
    struct NewNote {
        body: String,
        creator_id: i64,
    }

    impl Resource for Note {
        type Selector = i64;
        type New = NewNote;

        fn table() -> &'static Table {
            static T: OnceLock<Table> = OnceLock::new();
            T.get_or_init(|| {
                Table::new("notes")
                    .column(Column::id("id"))
                    .column(Column::new("body", "text").not_null())
                    .column(Column::new("creator_id", "bigint").not_null())
            })
        }

        fn query(id: &i64) -> Query<'static> {
            Query::by_pk(Self::table(), *id)
        }

        fn assign(&mut self, field: &str, value: Value) -> Result<(), AppError> {
            self.body = field_value(field, value)?;
            Ok(())
        }
    }

    /// Session that refuses statements and counts how it was ended.
    #[derive(Default, Clone)]
    struct Ends {
        commits: Arc<AtomicUsize>,
        rollbacks: Arc<AtomicUsize>,
    }

    struct Refusing(Ends);

    #[async_trait]
    impl Session for Refusing {
        async fn first(&mut self, _: &Query<'_>) -> Result<Option<Record>, AppError> {
            Err(AppError::Storage("unexpected statement".into()))
        }

        async fn first_with_children(
            &mut self,
            _: &Query<'_>,
            _: &ChildCollection<'_>,
        ) -> Result<Option<(Record, Vec<Record>)>, AppError> {
            Err(AppError::Storage("unexpected statement".into()))
        }

        async fn insert(&mut self, _: &Table, _: &Record) -> Result<Record, AppError> {
            Err(AppError::Storage("unexpected statement".into()))
        }

        async fn update(&mut self, _: &Query<'_>, _: &Record) -> Result<u64, AppError> {
            Err(AppError::Storage("unexpected statement".into()))
        }

        async fn delete(&mut self, _: &Query<'_>) -> Result<u64, AppError> {
            Err(AppError::Storage("unexpected statement".into()))
        }

        async fn commit(self) -> Result<(), AppError> {
            self.0.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn rollback(self) -> Result<(), AppError> {
            self.0.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn creator() -> OwnedCreate<Note> {
        OwnedCreate::new(RequestParser::new().argument("body", crate::parser::convert::string, true))
    }

    #[tokio::test]
    async fn rejected_request_rolls_back_before_any_statement() {
        let ends = Ends::default();
        let err = creator()
            .create(Refusing(ends.clone()), &CallerId(None), &json!({"body": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        let err = creator()
            .create(Refusing(ends.clone()), &StaticIdentity("3".into()), &json!({"body": null}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        assert_eq!(ends.rollbacks.load(Ordering::SeqCst), 2);
        assert_eq!(ends.commits.load(Ordering::SeqCst), 0);
    }
}
