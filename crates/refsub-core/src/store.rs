//! Bucketed key-value stores
//!
//! A store is opened from [`StoreOptions`], which can be read from a resolved
//! configuration mapping, and then holds byte values under `(bucket, key)`.
//! Buckets are created by the first `put` into them.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use redb::{
    Builder, Database, DatabaseError, ReadableTable, StorageError, TableDefinition, TableError,
};

use crate::error::{Error, Result, StoreErrorKind};
use crate::value::{Mapping, Value};

/// Default permission bits for a new database file
pub const DEFAULT_MODE: u32 = 0o600;

/// Default time to wait for the database lock
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Something that must be opened before use and closed afterwards
pub trait DataSource {
    /// Open the source; fails if it is already open
    fn open(&mut self, options: &StoreOptions) -> Result<()>;

    /// Flush and close the source
    fn close(&mut self) -> Result<()>;

    /// Whether the source is currently open
    fn is_open(&self) -> bool;
}

/// Byte-oriented key-value operations grouped by bucket
pub trait KvStore: DataSource {
    /// Read a value; `None` if the bucket or key does not exist
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Write a value, creating the bucket if needed
    fn put(&mut self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove a key. Removing a missing key is not an error.
    fn delete(&mut self, bucket: &[u8], key: &[u8]) -> Result<()>;
}

/// Options for opening a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Path of the database file
    pub database: PathBuf,
    /// Permission bits applied to the database file (unix only)
    pub mode: u32,
    /// How long `open` waits for the database lock
    pub timeout: Duration,
}

impl StoreOptions {
    /// Options for `database` with default mode and timeout
    pub fn new(database: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            mode: DEFAULT_MODE,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read options from a mapping with keys `database`, `mode` and `timeout`
    ///
    /// `mode` is an integer or an octal string such as `"0600"`; `timeout` is
    /// a number of seconds. `database` is required.
    pub fn from_mapping(map: &Mapping) -> Result<Self> {
        let mut database = None;
        let mut mode = DEFAULT_MODE;
        let mut timeout = DEFAULT_TIMEOUT;

        for (key, value) in map {
            match key.as_str() {
                "database" => {
                    let path = value
                        .as_str()
                        .filter(|s| !s.is_empty())
                        .ok_or_else(|| invalid_option("database", "a non-empty string", value))?;
                    database = Some(PathBuf::from(path));
                }
                "mode" => mode = parse_mode(value)?,
                "timeout" => {
                    timeout = value
                        .as_f64()
                        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                        .ok_or_else(|| {
                            invalid_option("timeout", "a non-negative number of seconds", value)
                        })?;
                }
                other => {
                    return Err(Error::store(StoreErrorKind::InvalidOption {
                        option: other.to_string(),
                    })
                    .with_cause("Unknown store option"))
                }
            }
        }

        let database = database.ok_or_else(|| {
            Error::store(StoreErrorKind::InvalidOption {
                option: "database".into(),
            })
            .with_cause("Missing required option")
        })?;

        Ok(Self {
            database,
            mode,
            timeout,
        })
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.database.clone().into_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }
}

fn parse_mode(value: &Value) -> Result<u32> {
    let mode = match value {
        Value::Integer(i) => u32::try_from(*i).ok(),
        Value::String(s) => {
            let digits = s.strip_prefix("0o").unwrap_or(s);
            u32::from_str_radix(digits, 8).ok()
        }
        _ => None,
    };
    mode.filter(|m| *m <= 0o7777)
        .ok_or_else(|| invalid_option("mode", "permission bits such as 0o600", value))
}

fn invalid_option(option: &str, expected: &str, found: &Value) -> Error {
    Error::store(StoreErrorKind::InvalidOption {
        option: option.to_string(),
    })
    .with_cause(format!("Expected {}, found {}", expected, found.type_name()))
}

type Buckets = BTreeMap<Vec<u8>, BTreeMap<Vec<u8>, Vec<u8>>>;

fn closed() -> Error {
    Error::store(StoreErrorKind::Closed)
}

fn bucket_get(buckets: &Buckets, bucket: &[u8], key: &[u8]) -> Option<Vec<u8>> {
    buckets.get(bucket).and_then(|b| b.get(key)).cloned()
}

fn bucket_put(buckets: &mut Buckets, bucket: &[u8], key: &[u8], value: &[u8]) {
    buckets
        .entry(bucket.to_vec())
        .or_default()
        .insert(key.to_vec(), value.to_vec());
}

fn bucket_delete(buckets: &mut Buckets, bucket: &[u8], key: &[u8]) {
    if let Some(b) = buckets.get_mut(bucket) {
        b.remove(key);
    }
}

/// An in-process store without persistence
///
/// Contents survive `close` and a later `open`, but not the store itself.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: Buckets,
    open: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataSource for MemoryStore {
    fn open(&mut self, _options: &StoreOptions) -> Result<()> {
        if self.open {
            return Err(Error::store(StoreErrorKind::AlreadyOpen));
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Err(closed());
        }
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl KvStore for MemoryStore {
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        if !self.open {
            return Err(closed());
        }
        Ok(bucket_get(&self.buckets, bucket, key))
    }

    fn put(&mut self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<()> {
        if !self.open {
            return Err(closed());
        }
        bucket_put(&mut self.buckets, bucket, key, value);
        Ok(())
    }

    fn delete(&mut self, bucket: &[u8], key: &[u8]) -> Result<()> {
        if !self.open {
            return Err(closed());
        }
        bucket_delete(&mut self.buckets, bucket, key);
        Ok(())
    }
}

const BUCKETS: TableDefinition<(&[u8], &[u8]), &[u8]> = TableDefinition::new("buckets");

struct OpenDatabase {
    database: PathBuf,
    db: Database,
}

impl OpenDatabase {
    fn backend(&self, err: impl Into<redb::Error>) -> Error {
        backend_error(&self.database, err.into())
    }
}

fn backend_error(database: &Path, err: redb::Error) -> Error {
    Error::store(StoreErrorKind::Backend {
        database: database.display().to_string(),
    })
    .with_cause(err.to_string())
}

/// A store persisted in a single `redb` database file
///
/// Every `put` and `delete` is its own committed write transaction. While
/// open, the store holds the operating system lock on the file, which is
/// released when the process exits.
#[derive(Default)]
pub struct FileStore {
    state: Option<OpenDatabase>,
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("database", &self.state.as_ref().map(|s| &s.database))
            .finish()
    }
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<&OpenDatabase> {
        self.state.as_ref().ok_or_else(closed)
    }
}

fn database_file(options: &StoreOptions) -> Result<File> {
    let path = &options.database;
    let mut open = OpenOptions::new();
    open.read(true).write(true).create(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        open.mode(options.mode);
    }

    let file = open
        .open(path)
        .map_err(|e| Error::io(path.display().to_string(), &e))?;

    // The creation mode is filtered by the umask
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(options.mode))
            .map_err(|e| Error::io(path.display().to_string(), &e))?;
    }

    Ok(file)
}

fn open_database(options: &StoreOptions) -> Result<Database> {
    let started = Instant::now();
    let mut warned = false;

    loop {
        let file = database_file(options)?;
        match Builder::new().create_file(file) {
            Ok(db) => return Ok(db),
            Err(DatabaseError::DatabaseAlreadyOpen) => {
                if started.elapsed() >= options.timeout {
                    return Err(Error::store(StoreErrorKind::LockTimeout {
                        database: options.database.display().to_string(),
                    }));
                }
                if !warned {
                    log::warn!(
                        "Waiting up to {:?} for lock on {}",
                        options.timeout,
                        options.database.display()
                    );
                    warned = true;
                }
                std::thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(DatabaseError::Storage(StorageError::Corrupted(cause))) => {
                return Err(Error::store(StoreErrorKind::Corrupt {
                    database: options.database.display().to_string(),
                })
                .with_cause(cause))
            }
            Err(e) => return Err(backend_error(&options.database, e.into())),
        }
    }
}

impl DataSource for FileStore {
    fn open(&mut self, options: &StoreOptions) -> Result<()> {
        if self.state.is_some() {
            return Err(Error::store(StoreErrorKind::AlreadyOpen));
        }

        let db = open_database(options)?;
        log::debug!("Opened store {}", options.database.display());

        self.state = Some(OpenDatabase {
            database: options.database.clone(),
            db,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let state = self.state.take().ok_or_else(closed)?;
        log::debug!("Closed store {}", state.database.display());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.is_some()
    }
}

impl KvStore for FileStore {
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        let state = self.state()?;
        let txn = state.db.begin_read().map_err(|e| state.backend(e))?;
        let table = match txn.open_table(BUCKETS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(state.backend(e)),
        };

        let value = table.get((bucket, key)).map_err(|e| state.backend(e))?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn put(&mut self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<()> {
        let state = self.state()?;
        let txn = state.db.begin_write().map_err(|e| state.backend(e))?;
        {
            let mut table = txn.open_table(BUCKETS).map_err(|e| state.backend(e))?;
            table
                .insert((bucket, key), value)
                .map_err(|e| state.backend(e))?;
        }
        txn.commit().map_err(|e| state.backend(e))
    }

    fn delete(&mut self, bucket: &[u8], key: &[u8]) -> Result<()> {
        let state = self.state()?;
        let txn = state.db.begin_write().map_err(|e| state.backend(e))?;
        {
            let mut table = txn.open_table(BUCKETS).map_err(|e| state.backend(e))?;
            table.remove((bucket, key)).map_err(|e| state.backend(e))?;
        }
        txn.commit().map_err(|e| state.backend(e))
    }
}
