//! Conversion functions for request arguments.
//!
//! A converter receives a non-null raw value and returns the value to store, or a
//! message describing why the input is unacceptable. Parameterised converters
//! (`max_length`, `pattern`, ...) return closures; compose them with [`and_then`].

use regex::Regex;
use serde_json::Value;

pub fn string(v: &Value) -> Result<Value, String> {
    match v {
        Value::String(_) => Ok(v.clone()),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        _ => Err("must be a string".into()),
    }
}

/// Integers, or strings holding an integer.
pub fn integer(v: &Value) -> Result<Value, String> {
    match v {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(v.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Value::Number((f as i64).into())),
            _ => Err("must be an integer".into()),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|_| "must be an integer".into()),
        _ => Err("must be an integer".into()),
    }
}

pub fn float(v: &Value) -> Result<Value, String> {
    let f = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    f.and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| "must be a number".into())
}

/// Booleans, or the strings `true`/`false`/`1`/`0` in any case.
pub fn boolean(v: &Value) -> Result<Value, String> {
    match v {
        Value::Bool(_) => Ok(v.clone()),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err("must be a boolean".into()),
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Ok(Value::Bool(true)),
            Some(0) => Ok(Value::Bool(false)),
            _ => Err("must be a boolean".into()),
        },
        _ => Err("must be a boolean".into()),
    }
}

/// Canonical hyphenated lowercase form.
pub fn uuid(v: &Value) -> Result<Value, String> {
    v.as_str()
        .and_then(|s| uuid::Uuid::parse_str(s.trim()).ok())
        .map(|u| Value::String(u.to_string()))
        .ok_or_else(|| "must be a valid UUID".into())
}

/// RFC 3339 timestamp, normalised to UTC.
pub fn datetime(v: &Value) -> Result<Value, String> {
    v.as_str()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|d| Value::String(d.with_timezone(&chrono::Utc).to_rfc3339()))
        .ok_or_else(|| "must be an RFC 3339 timestamp".into())
}

pub fn email(v: &Value) -> Result<Value, String> {
    match v.as_str() {
        Some(s) if s.len() >= 3 && s.contains('@') => Ok(v.clone()),
        _ => Err("must be a valid email".into()),
    }
}

pub fn one_of(allowed: &[&str]) -> impl Fn(&Value) -> Result<Value, String> + Send + Sync + Clone + 'static {
    let allowed: Vec<String> = allowed.iter().map(|s| s.to_string()).collect();
    move |v: &Value| match v.as_str() {
        Some(s) if allowed.iter().any(|a| a == s) => Ok(v.clone()),
        _ => Err(format!(
            "must be one of: {}",
            allowed.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
        )),
    }
}

pub fn max_length(max: usize) -> impl Fn(&Value) -> Result<Value, String> + Send + Sync + Clone + 'static {
    move |v: &Value| {
        let s = v.as_str().ok_or_else(|| "must be a string".to_string())?;
        if s.chars().count() > max {
            return Err(format!("must be at most {} characters", max));
        }
        Ok(v.clone())
    }
}

pub fn min_length(min: usize) -> impl Fn(&Value) -> Result<Value, String> + Send + Sync + Clone + 'static {
    move |v: &Value| {
        let s = v.as_str().ok_or_else(|| "must be a string".to_string())?;
        if s.chars().count() < min {
            return Err(format!("must be at least {} characters", min));
        }
        Ok(v.clone())
    }
}

/// Full-string regex match. An invalid expression rejects every value.
pub fn pattern(re: &str) -> impl Fn(&Value) -> Result<Value, String> + Send + Sync + Clone + 'static {
    let re = Regex::new(&format!("^(?:{})$", re)).ok();
    move |v: &Value| match (&re, v.as_str()) {
        (None, _) => Err("invalid pattern".into()),
        (Some(re), Some(s)) if re.is_match(s) => Ok(v.clone()),
        _ => Err("does not match required pattern".into()),
    }
}

/// Inclusive numeric bounds.
pub fn range(min: f64, max: f64) -> impl Fn(&Value) -> Result<Value, String> + Send + Sync + Clone + 'static {
    move |v: &Value| {
        let n = v.as_f64().ok_or_else(|| "must be a number".to_string())?;
        if n < min {
            return Err(format!("must be at least {}", min));
        }
        if n > max {
            return Err(format!("must be at most {}", max));
        }
        Ok(v.clone())
    }
}

/// Run `first`, then feed its output to `second`.
pub fn and_then<F, G>(first: F, second: G) -> impl Fn(&Value) -> Result<Value, String> + Send + Sync + 'static
where
    F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    G: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
{
    move |v: &Value| first(v).and_then(|out| second(&out))
}
