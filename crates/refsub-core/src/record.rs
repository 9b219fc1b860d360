//! Field access on records
//!
//! A record is any type that exposes its fields by name through the
//! [`Record`] capability. The [`record!`](crate::record!) macro implements it
//! for plain structs:
//!
//! ```rust
//! use refsub_core::record;
//! use refsub_core::record::{get_field_value, FieldKind};
//!
//! struct Server {
//!     host: String,
//!     port: u16,
//! }
//!
//! record!(Server { host, port });
//!
//! let server = Server { host: "localhost".into(), port: 8080 };
//! let field = get_field_value(&server, "host").unwrap();
//! assert_eq!(field.kind(), FieldKind::String);
//! assert_eq!(field.to_string(), "localhost");
//! ```

use std::fmt;

use crate::error::{Error, Result};
use crate::replacer::DEFAULT_MAX_DEPTH;
use crate::value::{Mapping, Value};

/// The kind of a field, as seen by the walkers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Record,
    Mapping,
    Other,
}

/// Shared handle to a field's current value
#[derive(Clone)]
pub enum Field<'a> {
    /// A string field (may contain tokens)
    Str(&'a str),
    /// A nested record
    Record(&'a dyn Record),
    /// A string-keyed mapping
    Mapping(&'a Mapping),
    /// Any other kind (numbers, booleans, sequences, null)
    Other(Value),
}

/// Exclusive handle to a field, used to write substitutions back
pub enum FieldMut<'a> {
    Str(&'a mut String),
    Record(&'a mut dyn Record),
    Mapping(&'a mut Mapping),
    Other,
}

/// Capability of looking up fields by name.
///
/// Field names are the Rust identifiers of the struct members, in
/// declaration order. Lookup is exact and case-sensitive.
pub trait Record {
    /// Name of the record type, used in error messages
    fn type_name(&self) -> &'static str;

    /// Externally visible field names in declaration order
    fn field_names(&self) -> &'static [&'static str];

    /// Shared access to a field
    fn field(&self, name: &str) -> Option<Field<'_>>;

    /// Exclusive access to a field
    fn field_mut(&mut self, name: &str) -> Option<FieldMut<'_>>;
}

/// Conversion of a struct member into a field handle
pub trait FieldValue {
    fn as_field(&self) -> Field<'_>;
    fn as_field_mut(&mut self) -> FieldMut<'_>;
}

/// A value that can serve as the root of path resolution
pub trait AsContext {
    fn as_context(&self) -> Field<'_>;
}

impl<T: FieldValue + ?Sized> AsContext for T {
    fn as_context(&self) -> Field<'_> {
        self.as_field()
    }
}

impl<'a> Field<'a> {
    /// The kind of this field
    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Str(_) => FieldKind::String,
            Field::Record(_) => FieldKind::Record,
            Field::Mapping(_) => FieldKind::Mapping,
            Field::Other(_) => FieldKind::Other,
        }
    }

    /// Human-readable name of the field's type
    pub fn type_name(&self) -> &'static str {
        match self {
            Field::Str(_) => "string",
            Field::Record(r) => r.type_name(),
            Field::Mapping(_) => "mapping",
            Field::Other(v) => v.type_name(),
        }
    }

    /// Get as str if this is a string field
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Field::Str(s) => Some(*s),
            _ => None,
        }
    }

    /// Text form of the field, as substituted into a template.
    ///
    /// Returns `None` if records or mappings nest `max_depth` or more levels
    /// below this field, which is always the case for a cyclic record.
    pub fn render(&self, max_depth: usize) -> Option<String> {
        let mut out = String::new();
        render_into(&mut out, self, 0, max_depth, false)?;
        Some(out)
    }

    /// Look up a named child of this field.
    ///
    /// Records are searched with [`get_field_value`]; mappings by exact key.
    pub fn child(&self, name: &str) -> Result<Field<'a>> {
        match self {
            Field::Record(r) => get_field_value(*r, name),
            Field::Mapping(m) => {
                let map: &'a Mapping = *m;
                map.get(name)
                    .map(FieldValue::as_field)
                    .ok_or_else(|| Error::field_not_found("mapping", name))
            }
            other => Err(Error::not_a_container(other.type_name())),
        }
    }
}

/// Return a handle to the field `name` of `record`.
///
/// Fails with [`ErrorKind::FieldNotFound`](crate::error::ErrorKind::FieldNotFound)
/// if the record has no such field.
pub fn get_field_value<'a>(record: &'a dyn Record, name: &str) -> Result<Field<'a>> {
    record
        .field(name)
        .ok_or_else(|| Error::field_not_found(record.type_name(), name))
}

impl fmt::Display for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        let _ = render_into(&mut out, self, 0, DEFAULT_MAX_DEPTH, true);
        f.write_str(&out)
    }
}

/// Append the text form of `field`. Records and mappings below `max_depth`
/// levels are elided as `{...}` when `elide` is set; otherwise rendering fails.
fn render_into(out: &mut String, field: &Field<'_>, depth: usize, max_depth: usize, elide: bool) -> Option<()> {
    let nested = matches!(field, Field::Record(_) | Field::Mapping(_));
    if nested && depth >= max_depth {
        if !elide {
            return None;
        }
        out.push_str("{...}");
        return Some(());
    }

    match field {
        Field::Str(s) => out.push_str(s),
        Field::Other(v) => out.push_str(&v.to_string()),
        Field::Mapping(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(k);
                out.push_str(": ");
                render_into(out, &v.as_field(), depth + 1, max_depth, elide)?;
            }
            out.push('}');
        }
        Field::Record(record) => {
            out.push('{');
            for (i, name) in record.field_names().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(name);
                out.push_str(": ");
                match record.field(name) {
                    Some(child) => render_into(out, &child, depth + 1, max_depth, elide)?,
                    None => out.push_str("null"),
                }
            }
            out.push('}');
        }
    }

    Some(())
}

impl fmt::Debug for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Field::Record(r) => f.debug_tuple("Record").field(&r.type_name()).finish(),
            Field::Mapping(m) => f.debug_tuple("Mapping").field(m).finish(),
            Field::Other(v) => f.debug_tuple("Other").field(v).finish(),
        }
    }
}

impl<'r> FieldValue for dyn Record + 'r {
    fn as_field(&self) -> Field<'_> {
        Field::Record(self)
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        FieldMut::Record(self)
    }
}

impl FieldValue for String {
    fn as_field(&self) -> Field<'_> {
        Field::Str(self)
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        FieldMut::Str(self)
    }
}

impl FieldValue for Option<String> {
    fn as_field(&self) -> Field<'_> {
        match self {
            Some(s) => Field::Str(s),
            None => Field::Other(Value::Null),
        }
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        match self {
            Some(s) => FieldMut::Str(s),
            None => FieldMut::Other,
        }
    }
}

impl FieldValue for Mapping {
    fn as_field(&self) -> Field<'_> {
        Field::Mapping(self)
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        FieldMut::Mapping(self)
    }
}

impl FieldValue for Value {
    fn as_field(&self) -> Field<'_> {
        match self {
            Value::String(s) => Field::Str(s),
            Value::Mapping(m) => Field::Mapping(m),
            other => Field::Other(other.clone()),
        }
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        match self {
            Value::String(s) => FieldMut::Str(s),
            Value::Mapping(m) => FieldMut::Mapping(m),
            _ => FieldMut::Other,
        }
    }
}

impl FieldValue for bool {
    fn as_field(&self) -> Field<'_> {
        Field::Other(Value::Bool(*self))
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        FieldMut::Other
    }
}

macro_rules! scalar_field_value {
    ($($ty:ty => $conv:expr),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                fn as_field(&self) -> Field<'_> {
                    Field::Other($conv(*self))
                }

                fn as_field_mut(&mut self) -> FieldMut<'_> {
                    FieldMut::Other
                }
            }
        )*
    };
}

scalar_field_value! {
    i8 => |n| Value::Integer(i64::from(n)),
    i16 => |n| Value::Integer(i64::from(n)),
    i32 => |n| Value::Integer(i64::from(n)),
    i64 => Value::Integer,
    u8 => |n| Value::Integer(i64::from(n)),
    u16 => |n| Value::Integer(i64::from(n)),
    u32 => |n| Value::Integer(i64::from(n)),
    u64 => |n: u64| i64::try_from(n).map(Value::Integer).unwrap_or(Value::Float(n as f64)),
    usize => |n: usize| i64::try_from(n).map(Value::Integer).unwrap_or(Value::Float(n as f64)),
    f32 => |n| Value::Float(f64::from(n)),
    f64 => Value::Float,
}

/// Implement [`Record`] (and [`FieldValue`]) for a struct.
///
/// Every listed member must implement [`FieldValue`]; nested records get it
/// from their own `record!` invocation. Members not listed are invisible to
/// path resolution and to the walkers.
#[macro_export]
macro_rules! record {
    ($ty:ident { $($field:ident),* $(,)? }) => {
        impl $crate::record::Record for $ty {
            fn type_name(&self) -> &'static str {
                stringify!($ty)
            }

            fn field_names(&self) -> &'static [&'static str] {
                &[$(stringify!($field)),*]
            }

            fn field(&self, name: &str) -> Option<$crate::record::Field<'_>> {
                match name {
                    $(stringify!($field) => Some($crate::record::FieldValue::as_field(&self.$field)),)*
                    _ => None,
                }
            }

            fn field_mut(&mut self, name: &str) -> Option<$crate::record::FieldMut<'_>> {
                match name {
                    $(stringify!($field) => Some($crate::record::FieldValue::as_field_mut(&mut self.$field)),)*
                    _ => None,
                }
            }
        }

        impl $crate::record::FieldValue for $ty {
            fn as_field(&self) -> $crate::record::Field<'_> {
                $crate::record::Field::Record(self)
            }

            fn as_field_mut(&mut self) -> $crate::record::FieldMut<'_> {
                $crate::record::FieldMut::Record(self)
            }
        }
    };
}
