//! Request argument parsing against a declared field schema.
//!
//! Each argument carries an optional conversion function and a required flag.
//! The conversion function is wrapped when the argument is registered:
//!
//! - required: a null or absent value fails validation before the converter runs;
//! - optional: a null or absent value becomes `null` and the converter is never called.
//!
//! Converters therefore never see `null`, and any `Fn(&Value) -> Result<Value, String>`
//! can be registered as-is.

pub mod convert;

use crate::error::AppError;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Column-name → value form of a row or of parsed arguments.
pub type Record = Map<String, Value>;

/// Conversion function applied to a non-null raw value. The error string is reported
/// against the field the converter is registered for.
pub type Converter = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

pub const NULL_REQUIRED: &str = "required value may not be null";

/// Reject null before delegating to `f`.
pub fn wrap_required(f: Converter) -> Converter {
    Arc::new(move |v: &Value| {
        if v.is_null() {
            Err(NULL_REQUIRED.to_string())
        } else {
            f(v)
        }
    })
}

/// Pass null through without calling `f`.
pub fn wrap_optional(f: Converter) -> Converter {
    Arc::new(move |v: &Value| if v.is_null() { Ok(Value::Null) } else { f(v) })
}

/// One declared field.
#[derive(Clone)]
pub struct Argument {
    name: String,
    convert: Option<Converter>,
    required: bool,
    default: Option<Value>,
}

impl Argument {
    /// Optional argument with no converter.
    pub fn new(name: impl Into<String>) -> Self {
        Argument {
            name: name.into(),
            convert: None,
            required: false,
            default: None,
        }
    }

    pub fn convert<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.convert = Some(Arc::new(f));
        self
    }

    pub fn converter(mut self, f: Converter) -> Self {
        self.convert = Some(f);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value used when the key is absent from the payload. Not passed through the converter.
    /// Ignored for required arguments.
    pub fn default_value(mut self, v: Value) -> Self {
        self.default = Some(v);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    fn resolve(&self, raw: Option<&Value>) -> Result<Value, AppError> {
        let raw = match raw {
            Some(v) => v,
            None if !self.required => {
                if let Some(d) = &self.default {
                    return Ok(d.clone());
                }
                &Value::Null
            }
            None => &Value::Null,
        };
        match &self.convert {
            Some(f) => f(raw).map_err(|msg| AppError::validation(&self.name, msg)),
            None if self.required && raw.is_null() => Err(AppError::validation(&self.name, NULL_REQUIRED)),
            None => Ok(raw.clone()),
        }
    }
}

/// Ordered set of arguments. Registration wraps each converter according to the
/// argument's required flag.
#[derive(Clone, Default)]
pub struct RequestParser {
    args: Vec<Argument>,
}

impl RequestParser {
    pub fn new() -> Self {
        RequestParser { args: Vec::new() }
    }

    pub fn add_argument(mut self, mut arg: Argument) -> Self {
        if let Some(f) = arg.convert.take() {
            arg.convert = Some(if arg.required { wrap_required(f) } else { wrap_optional(f) });
        }
        self.args.retain(|a| a.name != arg.name);
        self.args.push(arg);
        self
    }

    /// Shorthand for `add_argument(Argument::new(name).convert(f))`, optionally required.
    pub fn argument<F>(self, name: &str, f: F, required: bool) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        let arg = Argument::new(name).convert(f);
        self.add_argument(if required { arg.required() } else { arg })
    }

    pub fn arguments(&self) -> impl Iterator<Item = &Argument> {
        self.args.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.args.iter().any(|a| a.name == name)
    }

    /// Parse a JSON body. The body must be an object; undeclared keys are ignored.
    pub fn parse(&self, payload: &Value) -> Result<Record, AppError> {
        match payload {
            Value::Object(map) => self.parse_map(map),
            _ => Err(AppError::BadRequest("body must be a JSON object".into())),
        }
    }

    /// Every declared argument appears in the result.
    pub fn parse_map(&self, payload: &Record) -> Result<Record, AppError> {
        let mut out = Record::new();
        for arg in &self.args {
            let v = arg.resolve(payload.get(&arg.name))?;
            out.insert(arg.name.clone(), v);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn person_parser() -> RequestParser {
        RequestParser::new()
            .argument("name", convert::string, true)
            .argument("age", convert::integer, false)
    }

    #[test]
    fn optional_null_passes_through() {
        let parsed = person_parser().parse(&json!({"name": "Alice", "age": null})).unwrap();
        assert_eq!(parsed.get("name"), Some(&json!("Alice")));
        assert_eq!(parsed.get("age"), Some(&Value::Null));
    }

    #[test]
    fn required_null_fails_on_that_field() {
        let err = person_parser().parse(&json!({"name": null, "age": 5})).unwrap_err();
        match err {
            AppError::Validation { field, message } => {
                assert_eq!(field, "name");
                assert_eq!(message, NULL_REQUIRED);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn required_absent_fails() {
        let err = person_parser().parse(&json!({"age": 5})).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "name"));
    }

    #[test]
    fn required_null_fails_even_if_converter_accepts_null() {
        let parser = RequestParser::new().argument("note", |v: &Value| Ok(v.clone()), true);
        assert!(parser.parse(&json!({"note": null})).is_err());
    }

    #[test]
    fn optional_null_never_calls_converter() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let parser = RequestParser::new().argument(
            "count",
            move |v: &Value| {
                seen.fetch_add(1, Ordering::SeqCst);
                if v.is_null() {
                    panic!("converter called with null");
                }
                convert::integer(v)
            },
            false,
        );
        let parsed = parser.parse(&json!({"count": null})).unwrap();
        assert_eq!(parsed.get("count"), Some(&Value::Null));
        let parsed = parser.parse(&json!({})).unwrap();
        assert_eq!(parsed.get("count"), Some(&Value::Null));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        parser.parse(&json!({"count": 3})).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_converter_passes_raw_value() {
        let parser = RequestParser::new()
            .add_argument(Argument::new("meta"))
            .add_argument(Argument::new("tags").required());
        let body = json!({"meta": {"a": [1, 2]}, "tags": ["x", 1]});
        let parsed = parser.parse(&body).unwrap();
        assert_eq!(parsed.get("meta"), body.get("meta"));
        assert_eq!(parsed.get("tags"), body.get("tags"));

        let err = parser.parse(&json!({"meta": 1})).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "tags"));
    }

    #[test]
    fn conversion_failure_names_field() {
        let err = person_parser().parse(&json!({"name": "Bob", "age": "old"})).unwrap_err();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "age"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn undeclared_keys_are_dropped() {
        let parsed = person_parser().parse(&json!({"name": "A", "admin": true})).unwrap();
        assert!(!parsed.contains_key("admin"));
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn default_applies_only_when_absent() {
        let parser = RequestParser::new().add_argument(
            Argument::new("status")
                .convert(convert::string)
                .default_value(json!("open")),
        );
        assert_eq!(parser.parse(&json!({})).unwrap().get("status"), Some(&json!("open")));
        assert_eq!(parser.parse(&json!({"status": null})).unwrap().get("status"), Some(&Value::Null));
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(matches!(person_parser().parse(&json!([1, 2])), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn re_registering_replaces_argument() {
        let parser = person_parser().argument("age", convert::integer, true);
        assert_eq!(parser.arguments().count(), 2);
        assert!(parser.parse(&json!({"name": "A"})).is_err());
    }
}
