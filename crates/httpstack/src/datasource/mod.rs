// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CRUD datasources.
//!
//! A [`Datasource`] exposes four operations over JSON values. Each
//! implementation decides the payload shapes it accepts and rejects anything
//! else with [`Error::MalformedPayload`]. A read-only datasource rejects every
//! mutation with [`Error::ReadOnlyViolation`] before touching any state.
//!
//! File-backed implementations keep the last read in a [`CacheState`] that is
//! invalidated by every successful mutation and by nothing else.

#[cfg(feature = "filesystem")]
mod json_dir;
#[cfg(feature = "filesystem")]
mod xml_file;

#[cfg(feature = "filesystem")]
pub use json_dir::JsonDirectory;
#[cfg(feature = "filesystem")]
pub use xml_file::XmlFile;

use crate::error::{Error, Result};
use serde_json::{Map, Value};

/// Create/read/update/delete over a backing store.
pub trait Datasource: Send {
    /// Adds a record; returns an implementation-defined identifier.
    fn create(&mut self, payload: Value) -> Result<Value>;

    /// Reads records matching `query` (`null` reads everything).
    fn read(&mut self, query: &Value) -> Result<Value>;

    /// Changes an existing record; `false` when there was nothing to change.
    fn update(&mut self, payload: Value) -> Result<bool>;

    /// Removes records; `false` when there was nothing to remove.
    fn delete(&mut self, payload: Value) -> Result<bool>;

    /// True when mutations are rejected.
    fn is_read_only(&self) -> bool;

    /// Enables or disables mutations.
    fn set_read_only(&mut self, read_only: bool);
}

/// Cached result of the last full read.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CacheState {
    /// Holds the data as of the last read; no mutation happened since.
    Valid(Value),
    /// Must be re-read from the backing store.
    #[default]
    Invalid,
}

impl CacheState {
    /// The cached value, if valid.
    pub fn get(&self) -> Option<&Value> {
        match self {
            CacheState::Valid(value) => Some(value),
            CacheState::Invalid => None,
        }
    }

    /// True when a read can be served from the cache.
    pub fn is_valid(&self) -> bool {
        matches!(self, CacheState::Valid(_))
    }

    /// Marks the cache stale.
    pub fn invalidate(&mut self) {
        *self = CacheState::Invalid;
    }
}

/// Fails with [`Error::ReadOnlyViolation`] when `source` is read-only.
pub fn guard_writable<D: Datasource + ?Sized>(source: &D, operation: &str) -> Result<()> {
    if source.is_read_only() {
        return Err(Error::ReadOnlyViolation(format!(
            "cannot {} in a read-only datasource",
            operation
        )));
    }
    Ok(())
}

/// Splits a `[key, value]` pair or a `{key_field: …, value_field: …}` object.
///
/// The value half is optional; a missing value becomes `null`.
pub fn payload_pair(payload: Value, key_field: &str, value_field: &str) -> Result<(String, Value)> {
    match payload {
        Value::String(key) => Ok((key, Value::Null)),
        Value::Array(mut items) if !items.is_empty() && items.len() <= 2 => {
            let value = if items.len() == 2 {
                items.pop().unwrap_or(Value::Null)
            } else {
                Value::Null
            };
            match items.pop() {
                Some(Value::String(key)) => Ok((key, value)),
                _ => Err(Error::MalformedPayload(
                    "first payload element must be a string".into(),
                )),
            }
        }
        Value::Object(mut map) => match map.remove(key_field) {
            Some(Value::String(key)) => Ok((key, map.remove(value_field).unwrap_or(Value::Null))),
            _ => Err(Error::MalformedPayload(format!(
                "payload needs a string '{}' field",
                key_field
            ))),
        },
        other => Err(Error::MalformedPayload(format!(
            "expected [key, value] or an object, got {}",
            other
        ))),
    }
}

/// Requires a JSON object payload.
pub fn payload_object(payload: Value, what: &str) -> Result<Map<String, Value>> {
    match payload {
        Value::Object(map) if !map.is_empty() => Ok(map),
        Value::Object(_) => Err(Error::MalformedPayload(format!("{} cannot be empty", what))),
        other => Err(Error::MalformedPayload(format!(
            "{} must be an object, got {}",
            what, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_pair_shapes() {
        assert_eq!(
            payload_pair(json!(["a.json", {"x": 1}]), "name", "data").unwrap(),
            ("a.json".to_string(), json!({"x": 1}))
        );
        assert_eq!(
            payload_pair(json!({"name": "a.json", "data": 2}), "name", "data").unwrap(),
            ("a.json".to_string(), json!(2))
        );
        assert_eq!(
            payload_pair(json!("a.json"), "name", "data").unwrap(),
            ("a.json".to_string(), Value::Null)
        );
        for bad in [json!(3), json!([]), json!([1, 2]), json!({"data": 1}), json!([1, 2, 3])] {
            assert!(matches!(
                payload_pair(bad, "name", "data"),
                Err(Error::MalformedPayload(_))
            ));
        }
    }

    #[test]
    fn test_cache_state() {
        let mut cache = CacheState::Valid(json!({"a": 1}));
        assert!(cache.is_valid());
        assert_eq!(cache.get(), Some(&json!({"a": 1})));
        cache.invalidate();
        assert_eq!(cache, CacheState::Invalid);
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_payload_object() {
        assert!(payload_object(json!({"a": 1}), "row").is_ok());
        assert!(payload_object(json!({}), "row").is_err());
        assert!(payload_object(json!([1]), "row").is_err());
    }
}
