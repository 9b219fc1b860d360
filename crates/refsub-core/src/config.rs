//! Configuration documents
//!
//! A `Config` holds a mapping loaded from YAML or JSON. Resolution fills in
//! its `${...}` tokens in place from the document itself and the environment.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::matcher::parse_variables;
use crate::replacer::Replacer;
use crate::value::{Mapping, Value};

/// Specifies a file to load, either required or optional
///
/// # Examples
///
/// ```ignore
/// use refsub_core::{Config, FileSpec};
///
/// let config = Config::load_merged_with_specs(&[
///     FileSpec::required("base.yaml"),
///     FileSpec::optional("local.yaml"),  // Won't error if missing
/// ])?;
/// ```
#[derive(Debug, Clone)]
pub enum FileSpec {
    /// A required file - error if not found
    Required(PathBuf),
    /// An optional file - silently skip if not found
    Optional(PathBuf),
}

impl FileSpec {
    /// Create a required file spec
    pub fn required(path: impl Into<PathBuf>) -> Self {
        FileSpec::Required(path.into())
    }

    /// Create an optional file spec
    pub fn optional(path: impl Into<PathBuf>) -> Self {
        FileSpec::Optional(path.into())
    }

    /// Get the path for this file spec
    pub fn path(&self) -> &Path {
        match self {
            FileSpec::Required(p) => p,
            FileSpec::Optional(p) => p,
        }
    }

    /// Check if this file spec is optional
    pub fn is_optional(&self) -> bool {
        matches!(self, FileSpec::Optional(_))
    }
}

impl<P: Into<PathBuf>> From<P> for FileSpec {
    fn from(path: P) -> Self {
        FileSpec::Required(path.into())
    }
}

/// A token that survived resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    /// Dotted key path of the string holding the token
    pub path: String,
    /// The token text, e.g. `${MISSING}`
    pub token: String,
}

/// A configuration document with a mapping at its root
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    root: Mapping,
}

impl Config {
    /// Create a Config from a root mapping
    pub fn new(root: Mapping) -> Self {
        Self { root }
    }

    /// Create a Config from a value, which must be a mapping (or null for an empty document)
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Mapping(root) => Ok(Self::new(root)),
            Value::Null => Ok(Self::default()),
            other => Err(Error::parse(format!(
                "Configuration root must be a mapping, found {}",
                other.type_name()
            ))),
        }
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml).map_err(|e| Error::parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| Error::parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Load configuration from a file; `.json` files are parsed as JSON, anything else as YAML
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), &e))?;

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let parsed = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        };

        parsed.map_err(|e| e.with_path(path.display().to_string()))
    }

    /// Load and merge multiple files
    ///
    /// Files are merged in order, with later files overriding earlier ones:
    /// - Mappings are deep-merged
    /// - Scalars and sequences use last-writer-wins
    /// - Null values remove keys
    pub fn load_merged<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let specs: Vec<FileSpec> = paths
            .iter()
            .map(|p| FileSpec::Required(p.as_ref().to_path_buf()))
            .collect();
        Self::load_merged_with_specs(&specs)
    }

    /// Load and merge multiple files, skipping optional files that don't exist
    pub fn load_merged_with_specs(specs: &[FileSpec]) -> Result<Self> {
        let mut merged: Option<Config> = None;

        for spec in specs {
            let path = spec.path();

            if spec.is_optional() && !path.exists() {
                log::debug!("Skipping missing optional file {}", path.display());
                continue;
            }

            let next = Self::load(path)?;
            log::debug!("Loaded {} ({} top-level keys)", path.display(), next.root.len());

            match &mut merged {
                Some(base) => base.merge(next),
                None => merged = Some(next),
            }
        }

        Ok(merged.unwrap_or_default())
    }

    /// Merge another config into this one; `other` wins on conflicts
    pub fn merge(&mut self, other: Config) {
        let mut base = Value::Mapping(std::mem::take(&mut self.root));
        base.merge(Value::Mapping(other.root));
        if let Value::Mapping(root) = base {
            self.root = root;
        }
    }

    /// Set a top-level key, replacing any existing value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.root.insert(key.into(), value.into());
    }

    /// Get the value at a dotted key path
    pub fn get(&self, path: &str) -> Result<&Value> {
        if path.is_empty() {
            return Err(Error::path_not_found(path));
        }
        let mut current = self
            .root
            .get(path.split('.').next().unwrap_or_default())
            .ok_or_else(|| Error::path_not_found(path))?;
        if let Some((_, rest)) = path.split_once('.') {
            current = current.get_path(rest).map_err(|_| Error::path_not_found(path))?;
        }
        Ok(current)
    }

    /// The root mapping
    pub fn as_mapping(&self) -> &Mapping {
        &self.root
    }

    /// Resolve every token in place, using the document as its own context
    pub fn resolve(&mut self, replacer: &Replacer) -> Result<()> {
        replacer.replace_map_self(&mut self.root)
    }

    /// Return a resolved copy, leaving this config untouched
    pub fn resolved(&self, replacer: &Replacer) -> Result<Config> {
        let mut copy = self.clone();
        copy.resolve(replacer)?;
        Ok(copy)
    }

    /// List every token still present in a string value, in document order
    pub fn unresolved(&self, replacer: &Replacer) -> Vec<Unresolved> {
        let mut out = Vec::new();
        collect_unresolved(&self.root, "", replacer, &mut out);
        out
    }

    /// Export the configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.root).map_err(|e| Error::parse(e.to_string()))
    }

    /// Export the configuration as JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.root).map_err(|e| Error::parse(e.to_string()))
    }
}

fn collect_unresolved(map: &Mapping, prefix: &str, replacer: &Replacer, out: &mut Vec<Unresolved>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::String(s) => {
                for token in parse_variables(s, replacer.pattern()) {
                    out.push(Unresolved {
                        path: path.clone(),
                        token: token.full,
                    });
                }
            }
            Value::Mapping(nested) => collect_unresolved(nested, &path, replacer, out),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn replacer() -> Replacer {
        Replacer::new().with_env(MapEnv::new().with("REFSUB_HOST", "prod-server"))
    }

    #[test]
    fn test_load_yaml() {
        let yaml = r#"
database:
  host: localhost
  port: 5432
"#;
        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.get("database.host").unwrap().as_str(), Some("localhost"));
        assert_eq!(config.get("database.port").unwrap().as_i64(), Some(5432));
    }

    #[test]
    fn test_load_json() {
        let config = Config::from_json(r#"{"server": {"port": 8080}}"#).unwrap();
        assert_eq!(config.get("server.port").unwrap().as_i64(), Some(8080));
    }

    #[test]
    fn test_empty_document_is_empty_config() {
        let config = Config::from_yaml("").unwrap();
        assert!(config.as_mapping().is_empty());
    }

    #[test]
    fn test_non_mapping_root_is_rejected() {
        let err = Config::from_yaml("- a\n- b\n").unwrap_err();

        assert_eq!(err.kind, ErrorKind::Parse);
        assert!(err.to_string().contains("found sequence"));
    }

    #[test]
    fn test_self_reference() {
        let yaml = r#"
defaults:
  host: localhost
database:
  host: ${defaults.host}
  url: postgres://${defaults.host}:${database.port}
  port: 5432
"#;
        let mut config = Config::from_yaml(yaml).unwrap();
        config.resolve(&replacer()).unwrap();

        assert_eq!(config.get("database.host").unwrap().as_str(), Some("localhost"));
        assert_eq!(
            config.get("database.url").unwrap().as_str(),
            Some("postgres://localhost:5432")
        );
    }

    #[test]
    fn test_env_fallback() {
        let yaml = r#"
server:
  host: ${REFSUB_HOST}
  backup: ${REFSUB_MISSING}
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let resolved = config.resolved(&replacer()).unwrap();

        assert_eq!(resolved.get("server.host").unwrap().as_str(), Some("prod-server"));
        assert_eq!(
            resolved.get("server.backup").unwrap().as_str(),
            Some("${REFSUB_MISSING}")
        );
        // The original is untouched
        assert_eq!(config.get("server.host").unwrap().as_str(), Some("${REFSUB_HOST}"));
    }

    #[test]
    fn test_unresolved_listing() {
        let yaml = r#"
a: ${missing}
b:
  c: x ${one} y ${two}
  d: fine
"#;
        let mut config = Config::from_yaml(yaml).unwrap();
        let r = replacer();
        config.resolve(&r).unwrap();

        assert_eq!(
            config.unresolved(&r),
            vec![
                Unresolved {
                    path: "a".into(),
                    token: "${missing}".into()
                },
                Unresolved {
                    path: "b.c".into(),
                    token: "${one}".into()
                },
                Unresolved {
                    path: "b.c".into(),
                    token: "${two}".into()
                },
            ]
        );
    }

    #[test]
    fn test_merge() {
        let mut base = Config::from_yaml("db:\n  host: localhost\n  port: 5432\nname: base\n").unwrap();
        let overlay = Config::from_yaml("db:\n  host: prod\n  port: null\n").unwrap();

        base.merge(overlay);

        assert_eq!(base.get("db.host").unwrap().as_str(), Some("prod"));
        assert!(base.get("db.port").is_err());
        assert_eq!(base.get("name").unwrap().as_str(), Some("base"));
    }

    #[test]
    fn test_load_merged_files() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.yaml");
        let local = dir.path().join("local.json");
        std::fs::write(&base, "app:\n  name: demo\n  url: http://${app.host}\n  host: a\n").unwrap();
        std::fs::write(&local, r#"{"app": {"host": "b"}}"#).unwrap();

        let mut config = Config::load_merged(&[&base, &local]).unwrap();
        config.resolve(&replacer()).unwrap();

        assert_eq!(config.get("app.url").unwrap().as_str(), Some("http://b"));
    }

    #[test]
    fn test_load_merged_optional_missing() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.yaml");
        std::fs::write(&base, "a: 1\n").unwrap();

        let config = Config::load_merged_with_specs(&[
            FileSpec::required(&base),
            FileSpec::optional(dir.path().join("missing.yaml")),
        ])
        .unwrap();
        assert_eq!(config.get("a").unwrap().as_i64(), Some(1));

        let err = Config::load_merged(&[dir.path().join("missing.yaml")]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
    }

    #[test]
    fn test_get_missing() {
        let config = Config::from_yaml("a:\n  b: 1\n").unwrap();

        assert_eq!(config.get("a.c").unwrap_err().kind, ErrorKind::PathNotFound);
        assert_eq!(config.get("").unwrap_err().kind, ErrorKind::PathNotFound);
        assert_eq!(config.get("a.b.c").unwrap_err().path.as_deref(), Some("a.b.c"));
    }

    #[test]
    fn test_export() {
        let mut config = Config::default();
        config.set("name", "demo");
        config.set("port", 8080);

        assert_eq!(config.to_yaml().unwrap(), "name: demo\nport: 8080\n");
        let json: serde_json::Value = serde_json::from_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(json["port"], 8080);
    }
}
