//! Page-view attribute merging
//!
//! Request payloads arrive as flat JSON objects. `PageViewAttributes` checks that
//! a payload is something a vertex can hold, copies it onto vertex properties,
//! and turns a stored vertex back into a flat object for responses.

use crate::{Properties, Result, TrailError, Vertex, PAGE_OPEN_TIME_KEY};
use serde_json::Value;

/// Flat key/value attributes of a page view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageViewAttributes {
    properties: Properties,
}

impl PageViewAttributes {
    /// Interpret a request payload.
    ///
    /// The payload must be an object of scalar values. `null` values are dropped.
    /// `pageOpenTime` must be an integer or a string holding one; strings are
    /// stored as numbers so range filters compare numerically.
    pub fn from_attributes(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            TrailError::MalformedAttributes(format!(
                "expected an object of attributes, got {}",
                json_type(value)
            ))
        })?;

        let mut properties = Properties::new();
        for (key, value) in object {
            match value {
                Value::Null => continue,
                Value::Array(_) | Value::Object(_) => {
                    return Err(TrailError::MalformedAttributes(format!(
                        "attribute '{key}' must be a scalar, got {}",
                        json_type(value)
                    )));
                }
                _ if key == PAGE_OPEN_TIME_KEY => {
                    properties.insert(key.clone(), Value::from(open_time(value)?));
                }
                _ => {
                    properties.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(Self { properties })
    }

    /// Flatten a stored vertex, including its id
    pub fn from_vertex(vertex: &Vertex) -> Self {
        let mut properties = vertex.properties.clone();
        properties.insert("id".to_string(), Value::String(vertex.id.clone()));
        Self { properties }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Read a field naming another vertex. Strings and numbers are accepted.
    pub fn reference(&self, key: &str) -> Result<Option<String>> {
        match self.properties.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(TrailError::InvalidInput(format!(
                "'{key}' must be a string or number, got {}",
                json_type(other)
            ))),
        }
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Copy every attribute onto `target`, overwriting existing keys
    pub fn merge_into(&self, target: &mut Properties) {
        for (key, value) in &self.properties {
            target.insert(key.clone(), value.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn into_properties(self) -> Properties {
        self.properties
    }

    pub fn to_serializable(&self) -> Value {
        Value::Object(self.properties.clone())
    }
}

fn open_time(value: &Value) -> Result<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        TrailError::MalformedAttributes(format!(
            "'{PAGE_OPEN_TIME_KEY}' must be epoch milliseconds, got {value}"
        ))
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
