//! Dotted path resolution
//!
//! Walks a context one segment at a time. Segments that descend into a
//! record are mapped to Rust field naming first (see [`field_name`]);
//! segments that descend into a mapping are used verbatim.

use crate::error::{Error, ErrorKind, Result};
use crate::record::{AsContext, Field};

/// Map a path segment to the record field naming convention.
///
/// The first character is lowercased and every uppercase letter that follows
/// a lowercase letter or digit becomes `_` plus its lowercase form:
/// `name -> name`, `Name -> name`, `subBar -> sub_bar`. Runs of capitals are
/// kept, so environment-style names like `BAR` never match a field `bar`.
pub fn field_name(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len() + 2);
    let mut prev: Option<char> = None;

    for c in segment.chars() {
        match prev {
            None => out.extend(c.to_lowercase()),
            Some(p) if c.is_uppercase() && (p.is_lowercase() || p.is_ascii_digit()) => {
                out.push('_');
                out.extend(c.to_lowercase());
            }
            Some(_) => out.push(c),
        }
        prev = Some(c);
    }

    out
}

/// Resolve `segments` against `context` and return the raw field found.
///
/// No substitution is applied to the result: a string that still holds
/// tokens is returned as is. Fails with
/// [`ErrorKind::PathNotFound`](crate::error::ErrorKind::PathNotFound) at the
/// first segment that does not resolve, or if `segments` is empty.
pub fn parse_references<'a, S: AsRef<str>>(context: Field<'a>, segments: &[S]) -> Result<Field<'a>> {
    if segments.is_empty() {
        return Err(Error::path_not_found("").with_cause("Empty path"));
    }

    let mut current = context;

    for (i, segment) in segments.iter().enumerate() {
        let segment = segment.as_ref();
        let next = match &current {
            Field::Record(_) => current.child(&field_name(segment)),
            _ => current.child(segment),
        };

        current = next.map_err(|e| {
            let prefix: Vec<&str> = segments[..=i].iter().map(|s| s.as_ref()).collect();
            let cause = match &e.kind {
                ErrorKind::NotAContainer { found } => {
                    format!("Cannot descend into {} at '{}'", found, segment)
                }
                _ => format!("No field or key matches '{}'", segment),
            };
            Error::path_not_found(prefix.join(".")).with_cause(cause)
        })?;
    }

    Ok(current)
}

/// Resolve a dotted expression such as `bar.name` against a context.
pub fn resolve_path<'a, C: AsContext + ?Sized>(context: &'a C, path: &str) -> Result<Field<'a>> {
    let segments: Vec<&str> = path.split('.').collect();
    parse_references(context.as_context(), &segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Mapping, Value};
    use pretty_assertions::assert_eq;

    struct SubBar {
        name: String,
    }

    struct Bar {
        name: String,
        profile: String,
        sub_bar: SubBar,
        sub_map: Mapping,
    }

    struct Foo {
        name: String,
        port: u16,
        bar: Bar,
    }

    crate::record!(SubBar { name });
    crate::record!(Bar { name, profile, sub_bar, sub_map });
    crate::record!(Foo { name, port, bar });

    fn foo() -> Foo {
        let mut nested = Mapping::new();
        nested.insert("name".into(), "${name}".into());
        let mut sub_map = Mapping::new();
        sub_map.insert("nestedMap".into(), Value::Mapping(nested));

        Foo {
            name: "foo".into(),
            port: 8080,
            bar: Bar {
                name: "my name is ${BAR}".into(),
                profile: "${name}-bar".into(),
                sub_bar: SubBar { name: "sub".into() },
                sub_map,
            },
        }
    }

    #[test]
    fn test_field_name() {
        assert_eq!(field_name("name"), "name");
        assert_eq!(field_name("Name"), "name");
        assert_eq!(field_name("subBar"), "sub_bar");
        assert_eq!(field_name("SubMap"), "sub_map");
        assert_eq!(field_name("sub_bar"), "sub_bar");
        assert_eq!(field_name("BAR"), "bAR");
        assert_eq!(field_name("v2Name"), "v2_name");
        assert_eq!(field_name(""), "");
    }

    #[test]
    fn test_parse_references_single_segment() {
        let sub = SubBar { name: "bar".into() };
        let field = parse_references(sub.as_context(), &["name"]).unwrap();

        assert_eq!(field.as_str(), Some("bar"));
    }

    #[test]
    fn test_parse_references_nested() {
        let foo = foo();

        let name = parse_references(foo.as_context(), &["bar", "subBar", "name"]).unwrap();
        assert_eq!(name.as_str(), Some("sub"));

        let port = parse_references(foo.as_context(), &["port"]).unwrap();
        assert_eq!(port.to_string(), "8080");
    }

    #[test]
    fn test_parse_references_returns_raw_value() {
        let foo = foo();
        let profile = parse_references(foo.as_context(), &["bar", "profile"]).unwrap();

        assert_eq!(profile.as_str(), Some("${name}-bar"));
    }

    #[test]
    fn test_parse_references_through_mapping() {
        let foo = foo();
        let field = resolve_path(&foo, "bar.subMap.nestedMap.name").unwrap();

        assert_eq!(field.as_str(), Some("${name}"));
    }

    #[test]
    fn test_parse_references_missing_field() {
        let foo = foo();
        let err = parse_references(foo.as_context(), &["missing"]).unwrap_err();

        assert_eq!(err.kind, ErrorKind::PathNotFound);
        assert_eq!(err.path.as_deref(), Some("missing"));
    }

    #[test]
    fn test_failing_prefix_fails_longer_paths() {
        let foo = foo();

        assert!(parse_references(foo.as_context(), &["nope"]).is_err());
        let err = parse_references(foo.as_context(), &["nope", "name"]).unwrap_err();
        assert_eq!(err.path.as_deref(), Some("nope"));
    }

    #[test]
    fn test_parse_references_into_scalar() {
        let foo = foo();
        let err = resolve_path(&foo, "port.value").unwrap_err();

        assert_eq!(err.kind, ErrorKind::PathNotFound);
        assert_eq!(err.path.as_deref(), Some("port.value"));
        assert!(err.to_string().contains("Cannot descend into integer"));
    }

    #[test]
    fn test_env_style_name_does_not_match_record_field() {
        let foo = foo();
        assert!(resolve_path(&foo, "BAR").is_err());
    }

    #[test]
    fn test_empty_path() {
        let foo = foo();
        let segments: [&str; 0] = [];

        assert!(parse_references(foo.as_context(), &segments).is_err());
        assert!(resolve_path(&foo, "").is_err());
    }

    #[test]
    fn test_mapping_context_uses_verbatim_keys() {
        let mut root = Mapping::new();
        root.insert("Name".into(), "upper".into());
        root.insert("name".into(), "lower".into());

        assert_eq!(resolve_path(&root, "Name").unwrap().as_str(), Some("upper"));
        assert_eq!(resolve_path(&root, "name").unwrap().as_str(), Some("lower"));
    }
}
