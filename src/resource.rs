//! Capability trait implemented by each concrete resource type.
//!
//! Controllers are generic over [`Resource`]: the trait says which table the entity
//! lives in, how a selector becomes a query, how the entity is serialized, how a new
//! entity is built from parsed fields and which fields an update may overwrite.

use crate::error::AppError;
use crate::model::{Query, Table};
use crate::parser::Record;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identifying criteria taken from the request path (e.g. a primary key).
    type Selector: DeserializeOwned + Send + Sync + 'static;

    /// Insertable form built from parsed request fields plus injected ownership columns.
    type New: Serialize + DeserializeOwned + Send + Sync;

    fn table() -> &'static Table;

    /// Query selecting the row operated on by read, update and delete.
    fn query(selector: &Self::Selector) -> Query<'static>;

    /// Overwrite one schema field. Implementations match on the finite set of mutable
    /// field names and reject anything else.
    fn assign(&mut self, field: &str, value: Value) -> Result<(), AppError>;

    /// Serializable mapping returned to the client.
    fn as_dict(&self) -> Result<Value, AppError> {
        serde_json::to_value(self).map_err(|e| AppError::Storage(format!("serialize resource: {}", e)))
    }

    /// Build the insertable entity from parsed fields.
    fn new(fields: Record) -> Result<Self::New, AppError> {
        serde_json::from_value(Value::Object(fields)).map_err(|e| AppError::BadRequest(e.to_string()))
    }

    /// Rebuild the entity from a stored row.
    fn from_record(record: Record) -> Result<Self, AppError> {
        serde_json::from_value(Value::Object(record)).map_err(|e| AppError::Storage(format!("decode row: {}", e)))
    }

    /// Column-name form of the entity, used to persist assigned fields.
    fn to_record(&self) -> Result<Record, AppError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(m)) => Ok(m),
            Ok(_) => Err(AppError::Storage("resource must serialize to an object".into())),
            Err(e) => Err(AppError::Storage(format!("serialize resource: {}", e))),
        }
    }
}

/// Decode one assigned value into a field's Rust type, reporting failures against `field`.
pub fn field_value<T: DeserializeOwned>(field: &str, value: Value) -> Result<T, AppError> {
    serde_json::from_value(value).map_err(|e| AppError::validation(field, e.to_string()))
}

/// Error for a field name [`Resource::assign`] does not know.
pub fn unknown_field(field: &str) -> AppError {
    AppError::validation(field, "field cannot be assigned")
}

/// Name of the column that records who created a resource.
pub const CREATOR_ID: &str = "creator_id";
