//! Field deserializers for cookie records coming from untrusted JSON (persisted snapshots,
//! imported profiles, pasted cookie lists).

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::cookies::cookie::{SameSite, DEFAULT_PATH};

/// JSON truthiness: `null`, `false`, `0`, `""` are false, everything else is true.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub(crate) fn truthy<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(is_truthy(&Value::deserialize(d)?))
}

pub(crate) fn path<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) if !s.is_empty() => s,
        _ => DEFAULT_PATH.to_string(),
    })
}

/// Empty or missing means `lax`; an unrecognised string is kept as `unspecified`.
pub(crate) fn same_site<'de, D: Deserializer<'de>>(d: D) -> Result<SameSite, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) if !s.is_empty() => s.parse().unwrap_or(SameSite::Unspecified),
        _ => SameSite::Lax,
    })
}

pub(crate) fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

pub(crate) fn opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(Value::deserialize(d)?.as_f64())
}
