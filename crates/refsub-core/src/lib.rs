//! refsub-core: Variable-reference resolution for structured values
//!
//! This crate resolves `${expr}` tokens inside strings, records and mappings.
//! An expression is a dotted path looked up in a context value; when the path
//! does not resolve, the environment variable named exactly `expr` is used, and
//! otherwise the token is left in place.
//!
//! # Example
//!
//! ```rust
//! use refsub_core::{record, MapEnv, Replacer};
//!
//! struct Database {
//!     host: String,
//!     url: String,
//! }
//!
//! record!(Database { host, url });
//!
//! let mut db = Database {
//!     host: "localhost".into(),
//!     url: "postgres://${host}/${DB_NAME}".into(),
//! };
//!
//! let replacer = Replacer::new().with_env(MapEnv::new().with("DB_NAME", "app"));
//! replacer.replace_self(&mut db).unwrap();
//!
//! assert_eq!(db.url, "postgres://localhost/app");
//! ```

pub mod env;
pub mod error;
pub mod matcher;
pub mod path;
pub mod record;
pub mod replacer;
pub mod store;
pub mod value;

mod config;

pub use config::{Config, FileSpec, Unresolved};
pub use env::{EnvProvider, LayeredEnv, MapEnv, NoEnv, ProcessEnv};
pub use error::{Error, ErrorKind, Result, StoreErrorKind};
pub use matcher::{parse_variables, Token};
pub use path::parse_references;
pub use record::{get_field_value, AsContext, Field, FieldKind, FieldMut, FieldValue, Record};
pub use replacer::{
    replace, replace_map, replace_map_self, replace_self, replace_string_variables, ReplaceOptions,
    Replacer,
};
pub use store::{DataSource, FileStore, KvStore, MemoryStore, StoreOptions};
pub use value::{Mapping, Value};
