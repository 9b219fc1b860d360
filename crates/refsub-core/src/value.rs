//! Dynamic configuration values
//!
//! Values can be scalars (string, int, float, bool, null),
//! sequences, or string-keyed mappings. Strings may contain
//! unresolved `${...}` tokens.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// A string-keyed mapping, insertion ordered
pub type Mapping = IndexMap<String, Value>;

/// A configuration value that may contain unresolved tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
#[derive(Default)]
pub enum Value {
    /// Null value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value (may contain tokens like ${name})
    String(String),
    /// Sequence of values
    Sequence(Vec<Value>),
    /// Mapping of string keys to values
    Mapping(Mapping),
}

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as boolean if this is a Bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float or Integer
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as str if this is a String
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as mapping if this is a Mapping
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Get a value by dotted key path (e.g., "database.host").
    ///
    /// Keys are matched verbatim; there is no sequence indexing.
    pub fn get_path(&self, path: &str) -> Result<&Value> {
        if path.is_empty() {
            return Ok(self);
        }

        let mut current = self;
        for key in path.split('.') {
            current = match current {
                Value::Mapping(map) => map.get(key).ok_or_else(|| Error::path_not_found(path))?,
                _ => return Err(Error::path_not_found(path)),
            };
        }

        Ok(current)
    }

    /// Returns the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    /// Merge another value into this one (deep merge)
    ///
    /// - Mappings: deep merge recursively
    /// - Scalars and sequences: `other` replaces
    /// - Null in an overlay mapping removes the key
    pub fn merge(&mut self, other: Value) {
        match (self, other) {
            (Value::Mapping(base), Value::Mapping(overlay)) => {
                for (key, overlay_value) in overlay {
                    if overlay_value.is_null() {
                        base.shift_remove(&key);
                    } else if let Some(base_value) = base.get_mut(&key) {
                        base_value.merge(overlay_value);
                    } else {
                        base.insert(key, overlay_value);
                    }
                }
            }
            (this, other) => {
                *this = other;
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Sequence(seq) => {
                write!(f, "[")?;
                for (i, v) in seq.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Sequence(v.into_iter().map(Into::into).collect())
    }
}

impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self {
        Value::Mapping(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database() -> Value {
        let mut db = Mapping::new();
        db.insert("host".into(), Value::String("localhost".into()));
        db.insert("port".into(), Value::Integer(5432));

        let mut map = Mapping::new();
        map.insert("database".into(), Value::Mapping(db));
        Value::Mapping(map)
    }

    #[test]
    fn test_value_get_path() {
        let value = database();

        assert_eq!(
            value.get_path("database.host").unwrap().as_str(),
            Some("localhost")
        );
        assert_eq!(
            value.get_path("database.port").unwrap().as_i64(),
            Some(5432)
        );
        assert_eq!(value.get_path("").unwrap(), &value);
    }

    #[test]
    fn test_value_get_path_missing() {
        let value = database();

        assert!(value.get_path("database.user").is_err());
        // Descending through a scalar fails rather than panicking
        assert!(value.get_path("database.port.value").is_err());
    }

    #[test]
    fn test_merge_deep() {
        let mut base = database();

        let mut overlay_db = Mapping::new();
        overlay_db.insert("host".into(), "prod-db".into());
        overlay_db.insert("port".into(), Value::Null);
        let mut overlay = Mapping::new();
        overlay.insert("database".into(), Value::Mapping(overlay_db));
        overlay.insert("debug".into(), true.into());

        base.merge(Value::Mapping(overlay));

        assert_eq!(
            base.get_path("database.host").unwrap().as_str(),
            Some("prod-db")
        );
        assert!(base.get_path("database.port").is_err());
        assert_eq!(base.get_path("debug").unwrap().as_bool(), Some(true));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Integer(18).to_string(), "18");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::from(vec![1, 2]).to_string(), "[1, 2]");
        assert_eq!(
            database().to_string(),
            "{database: {host: localhost, port: 5432}}"
        );
    }

    #[test]
    fn test_deserialize_yaml() {
        let value: Value = serde_yaml::from_str("name: foo\nage: 18\nratio: 0.5\n").unwrap();

        assert_eq!(value.get_path("name").unwrap().as_str(), Some("foo"));
        assert_eq!(value.get_path("age").unwrap().as_i64(), Some(18));
        assert_eq!(value.get_path("ratio").unwrap().as_f64(), Some(0.5));
        assert_eq!(value.type_name(), "mapping");
    }
}
