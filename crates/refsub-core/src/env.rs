//! Environment providers
//!
//! Fallback resolution reads variables through an [`EnvProvider`] rather than
//! the process environment directly, so callers can substitute a fixed set of
//! variables (tests, command-line overrides) or disable the fallback.

use std::collections::HashMap;

/// Source of environment variables for fallback resolution
pub trait EnvProvider: Send + Sync {
    /// Look up a variable by exact name
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvProvider for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        // Names with '=' or NUL are not valid variable names on any platform
        if name.is_empty() || name.contains(['=', '\0']) {
            return None;
        }
        std::env::var(name).ok()
    }
}

/// A fixed in-memory set of variables
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable, builder style
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Add or replace a variable
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl EnvProvider for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Consults `primary`, then `fallback`
pub struct LayeredEnv<P, F> {
    primary: P,
    fallback: F,
}

impl<P: EnvProvider, F: EnvProvider> LayeredEnv<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: EnvProvider, F: EnvProvider> EnvProvider for LayeredEnv<P, F> {
    fn var(&self, name: &str) -> Option<String> {
        self.primary.var(name).or_else(|| self.fallback.var(name))
    }
}

/// Provides no variables
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnv;

impl EnvProvider for NoEnv {
    fn var(&self, _name: &str) -> Option<String> {
        None
    }
}
