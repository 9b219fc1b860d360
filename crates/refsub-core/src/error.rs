//! Error types for refsub
//!
//! Errors are structured: a kind, the path in the target or context where the
//! error occurred, an optional cause and an actionable help message.

use std::fmt;

/// Result type alias for refsub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for refsub operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Path where the error occurred (e.g., "bar.sub_bar.name")
    pub path: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Error parsing YAML/JSON or a malformed document
    Parse,
    /// A dotted path did not resolve against the context
    PathNotFound,
    /// A record has no externally visible field with the given name
    FieldNotFound { record: String, field: String },
    /// A value that must be a record or mapping is something else
    NotAContainer { found: String },
    /// Nesting exceeded the configured maximum depth
    DepthExceeded { max_depth: usize },
    /// The token pattern could not be compiled
    Pattern,
    /// I/O error (file not found, permission denied, etc.)
    Io,
    /// Key-value store error
    Store(StoreErrorKind),
    /// Internal error (bug in refsub)
    Internal,
}

/// Specific key-value store error categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Operation attempted on a store that is not open
    Closed,
    /// `open` called on a store that is already open
    AlreadyOpen,
    /// The database lock could not be acquired before the timeout
    LockTimeout { database: String },
    /// The database file does not hold a valid store
    Corrupt { database: String },
    /// Invalid store option
    InvalidOption { option: String },
    /// The storage engine reported a failure
    Backend { database: String },
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            help: None,
            cause: None,
        }
    }

    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Parse)
        }
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<String>) -> Self {
        let path_str = path.into();
        Self {
            help: Some(format!(
                "Check that '{}' names a field or key reachable from the context",
                path_str
            )),
            path: Some(path_str),
            ..Self::new(ErrorKind::PathNotFound)
        }
    }

    /// Create a field not found error
    pub fn field_not_found(record: impl Into<String>, field: impl Into<String>) -> Self {
        let record = record.into();
        let field = field.into();
        Self {
            help: Some(format!(
                "'{}' has no externally visible field named '{}'",
                record, field
            )),
            ..Self::new(ErrorKind::FieldNotFound { record, field })
        }
    }

    /// Create a not-a-container error
    pub fn not_a_container(found: impl Into<String>) -> Self {
        Self {
            help: Some("Only records and mappings can be descended into".into()),
            ..Self::new(ErrorKind::NotAContainer {
                found: found.into(),
            })
        }
    }

    /// Create a depth exceeded error
    pub fn depth_exceeded(path: impl Into<String>, max_depth: usize) -> Self {
        Self {
            path: Some(path.into()),
            help: Some(
                "The structure is cyclic or nested too deeply; raise max_depth if it is legitimate"
                    .into(),
            ),
            ..Self::new(ErrorKind::DepthExceeded { max_depth })
        }
    }

    /// Create a pattern compilation error
    pub fn pattern(pattern: &str, message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            help: Some(format!("Fix the token pattern '{}'", pattern)),
            ..Self::new(ErrorKind::Pattern)
        }
    }

    /// Create an I/O error
    pub fn io(path: impl Into<String>, err: &std::io::Error) -> Self {
        Self {
            path: Some(path.into()),
            cause: Some(err.to_string()),
            ..Self::new(ErrorKind::Io)
        }
    }

    /// Create a store error
    pub fn store(kind: StoreErrorKind) -> Self {
        let help = match &kind {
            StoreErrorKind::Closed => Some("Call open() before using the store".to_string()),
            StoreErrorKind::AlreadyOpen => Some("Call close() before reopening".to_string()),
            StoreErrorKind::LockTimeout { database } => Some(format!(
                "Another process has '{}' open; close it or raise the timeout",
                database
            )),
            StoreErrorKind::Corrupt { .. } | StoreErrorKind::Backend { .. } => None,
            StoreErrorKind::InvalidOption { .. } => {
                Some("Recognized options: database, mode, timeout".to_string())
            }
        };
        Self {
            help,
            ..Self::new(ErrorKind::Store(kind))
        }
    }

    /// Create an internal error (bug in refsub)
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            help: Some("This is likely a bug in refsub. Please report it.".into()),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Internal)
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add a cause to the error
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::PathNotFound => write!(f, "Path not found")?,
            ErrorKind::FieldNotFound { record, field } => {
                write!(f, "Field not found: {}.{}", record, field)?
            }
            ErrorKind::NotAContainer { found } => {
                write!(f, "Expected a record or mapping, found {}", found)?
            }
            ErrorKind::DepthExceeded { max_depth } => write!(
                f,
                "Cyclic structure or nesting deeper than {} levels",
                max_depth
            )?,
            ErrorKind::Pattern => write!(f, "Invalid token pattern")?,
            ErrorKind::Io => write!(f, "I/O error")?,
            ErrorKind::Store(s) => match s {
                StoreErrorKind::Closed => write!(f, "Store is not open")?,
                StoreErrorKind::AlreadyOpen => write!(f, "Store is already open")?,
                StoreErrorKind::LockTimeout { database } => {
                    write!(f, "Timed out waiting for store lock: {}", database)?
                }
                StoreErrorKind::Corrupt { database } => {
                    write!(f, "Store file is corrupt: {}", database)?
                }
                StoreErrorKind::InvalidOption { option } => {
                    write!(f, "Invalid store option: {}", option)?
                }
                StoreErrorKind::Backend { database } => {
                    write!(f, "Store operation failed: {}", database)?
                }
            },
            ErrorKind::Internal => write!(f, "Internal error")?,
        }

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
