//! Token substitution over strings, records and mappings
//!
//! A [`Replacer`] resolves every `${expr}` token in a string by:
//! 1. splitting `expr` on `.` and resolving the path against the context,
//! 2. falling back to the environment variable named exactly `expr`,
//! 3. leaving the token untouched if neither resolves.
//!
//! The walkers apply this to every string reachable from a target, in a single
//! pass in declared field order (mapping entries in insertion order). When the
//! target is also the context ([`Replacer::replace_self`]), a string sees the
//! already substituted value of every string visited before it, and the raw
//! value of every string visited after it.

use regex::Regex;
use std::fmt;
use std::sync::Arc;

use crate::env::{EnvProvider, ProcessEnv};
use crate::error::{Error, Result};
use crate::matcher::{compile_pattern, default_pattern, parse_variables};
use crate::path::parse_references;
use crate::record::{AsContext, Field, FieldMut, FieldValue, Record};
use crate::value::{Mapping, Value};

/// Default maximum nesting of records and mappings below the target
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Options controlling substitution
#[derive(Debug, Clone)]
pub struct ReplaceOptions {
    /// Nesting deeper than this fails with `DepthExceeded`
    pub max_depth: usize,
    /// Token pattern; the first capture group is the expression
    pub pattern: Option<String>,
    /// Consult the environment when a path does not resolve
    pub env_fallback: bool,
}

impl Default for ReplaceOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            pattern: None,
            env_fallback: true,
        }
    }
}

/// Resolves tokens against a context with an injected environment
#[derive(Clone)]
pub struct Replacer {
    pattern: Regex,
    env: Arc<dyn EnvProvider>,
    options: ReplaceOptions,
}

impl Default for Replacer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Replacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replacer")
            .field("pattern", &self.pattern.as_str())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// One step from a container to a child
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Field(&'static str),
    Key(String),
}

/// Address of one string inside a target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SlotPath(Vec<Step>);

impl fmt::Display for SlotPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            match step {
                Step::Field(name) => write!(f, "{}", name)?,
                Step::Key(key) => write!(f, "{}", key)?,
            }
        }
        Ok(())
    }
}

impl Replacer {
    /// Create a replacer with the default pattern, reading the process environment
    pub fn new() -> Self {
        Self {
            pattern: default_pattern().clone(),
            env: Arc::new(ProcessEnv),
            options: ReplaceOptions::default(),
        }
    }

    /// Create a replacer with custom options
    ///
    /// Fails if `options.pattern` does not compile.
    pub fn with_options(options: ReplaceOptions) -> Result<Self> {
        let pattern = match &options.pattern {
            Some(p) => compile_pattern(p)?,
            None => default_pattern().clone(),
        };
        Ok(Self {
            pattern,
            env: Arc::new(ProcessEnv),
            options,
        })
    }

    /// Use `env` for fallback resolution
    pub fn with_env(mut self, env: impl EnvProvider + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Use a shared provider for fallback resolution
    pub fn with_shared_env(mut self, env: Arc<dyn EnvProvider>) -> Self {
        self.env = env;
        self
    }

    /// The compiled token pattern
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Resolve every token in `template` against `context`.
    ///
    /// Unresolved tokens are left verbatim. A template without tokens is
    /// returned unchanged.
    pub fn replace_string_variables<C: AsContext + ?Sized>(&self, template: &str, context: &C) -> String {
        self.resolve_template(template, &context.as_context())
    }

    /// Substitute every string reachable from `target`, resolving against `context`.
    pub fn replace<C: AsContext + ?Sized>(&self, target: &mut dyn Record, context: &C) -> Result<()> {
        let slots = self.record_slots(target)?;
        self.substitute(target, &slots, Some(&context.as_context()));
        Ok(())
    }

    /// Substitute every string reachable from `target`, resolving against `target` itself.
    pub fn replace_self(&self, target: &mut dyn Record) -> Result<()> {
        let slots = self.record_slots(target)?;
        self.substitute(target, &slots, None);
        Ok(())
    }

    /// Substitute every string in `map` and its nested mappings, resolving against `context`.
    pub fn replace_map<C: AsContext + ?Sized>(&self, map: &mut Mapping, context: &C) -> Result<()> {
        let slots = self.mapping_slots(map)?;
        self.substitute(map, &slots, Some(&context.as_context()));
        Ok(())
    }

    /// Substitute every string in `map`, resolving against `map` itself.
    pub fn replace_map_self(&self, map: &mut Mapping) -> Result<()> {
        let slots = self.mapping_slots(map)?;
        self.substitute(map, &slots, None);
        Ok(())
    }

    /// Substitute within a dynamic value, which must be a mapping.
    pub fn replace_value<C: AsContext + ?Sized>(&self, target: &mut Value, context: &C) -> Result<()> {
        match target {
            Value::Mapping(map) => self.replace_map(map, context),
            other => Err(Error::not_a_container(other.type_name())),
        }
    }

    /// Substitute within a dynamic value, resolving against the value itself.
    pub fn replace_value_self(&self, target: &mut Value) -> Result<()> {
        match target {
            Value::Mapping(map) => self.replace_map_self(map),
            other => Err(Error::not_a_container(other.type_name())),
        }
    }

    fn resolve_template(&self, template: &str, context: &Field<'_>) -> String {
        let tokens = parse_variables(template, &self.pattern);
        if tokens.is_empty() {
            return template.to_string();
        }

        let mut result = String::with_capacity(template.len());
        let mut last_end = 0;

        for token in &tokens {
            result.push_str(&template[last_end..token.span.start]);
            match self.resolve_expression(&token.expr, context) {
                Some(value) => result.push_str(&value),
                None => result.push_str(&token.full),
            }
            last_end = token.span.end;
        }

        result.push_str(&template[last_end..]);
        result
    }

    fn resolve_expression(&self, expr: &str, context: &Field<'_>) -> Option<String> {
        let segments: Vec<&str> = expr.split('.').collect();

        match parse_references(context.clone(), &segments) {
            Ok(field) => {
                return match field.render(self.options.max_depth) {
                    Some(text) => {
                        log::trace!("'{}' resolved from context", expr);
                        Some(text)
                    }
                    None => {
                        log::warn!(
                            "'{}' nests deeper than {} levels; left unresolved",
                            expr,
                            self.options.max_depth
                        );
                        None
                    }
                };
            }
            Err(e) => {
                log::trace!("'{}' not in context: {}", expr, e.path.as_deref().unwrap_or(""));
            }
        }

        if self.options.env_fallback {
            if let Some(value) = self.env.var(expr) {
                log::trace!("'{}' resolved from environment", expr);
                return Some(value);
            }
        }

        log::trace!("'{}' left unresolved", expr);
        None
    }

    fn substitute<R: FieldValue + ?Sized>(&self, root: &mut R, slots: &[SlotPath], context: Option<&Field<'_>>) {
        log::debug!("Substituting {} string slots", slots.len());

        for slot in slots {
            let resolved = {
                let Some(template) = read_slot(root.as_field(), slot) else {
                    continue;
                };
                if !self.pattern.is_match(template) {
                    continue;
                }
                match context {
                    Some(ctx) => self.resolve_template(template, ctx),
                    None => self.resolve_template(template, &root.as_field()),
                }
            };

            match write_slot(root.as_field_mut(), slot) {
                Some(target) => *target = resolved,
                None => log::warn!("String slot '{}' disappeared during substitution", slot),
            }
        }
    }

    fn record_slots(&self, record: &dyn Record) -> Result<Vec<SlotPath>> {
        let mut slots = Vec::new();
        self.collect_record(record, &mut SlotPath::default(), &mut slots)?;
        Ok(slots)
    }

    fn mapping_slots(&self, map: &Mapping) -> Result<Vec<SlotPath>> {
        let mut slots = Vec::new();
        self.collect_mapping(map, &mut SlotPath::default(), &mut slots)?;
        Ok(slots)
    }

    fn check_depth(&self, path: &SlotPath) -> Result<()> {
        if path.0.len() > self.options.max_depth {
            return Err(Error::depth_exceeded(path.to_string(), self.options.max_depth));
        }
        Ok(())
    }

    fn collect_record(&self, record: &dyn Record, path: &mut SlotPath, out: &mut Vec<SlotPath>) -> Result<()> {
        self.check_depth(path)?;

        for &name in record.field_names() {
            let field = record.field(name).ok_or_else(|| {
                Error::field_not_found(record.type_name(), name).with_path(path.to_string())
            })?;

            path.0.push(Step::Field(name));
            match field {
                Field::Str(_) => out.push(path.clone()),
                Field::Record(nested) => self.collect_record(nested, path, out)?,
                Field::Mapping(map) => self.collect_mapping(map, path, out)?,
                Field::Other(_) => {}
            }
            path.0.pop();
        }

        Ok(())
    }

    fn collect_mapping(&self, map: &Mapping, path: &mut SlotPath, out: &mut Vec<SlotPath>) -> Result<()> {
        self.check_depth(path)?;

        for (key, value) in map {
            path.0.push(Step::Key(key.clone()));
            match value {
                Value::String(_) => out.push(path.clone()),
                Value::Mapping(nested) => self.collect_mapping(nested, path, out)?,
                _ => {}
            }
            path.0.pop();
        }

        Ok(())
    }
}

fn read_slot<'a>(root: Field<'a>, slot: &SlotPath) -> Option<&'a str> {
    let mut current = root;
    for step in &slot.0 {
        current = match (current, step) {
            (Field::Record(record), Step::Field(name)) => record.field(name)?,
            (Field::Mapping(map), Step::Key(key)) => map.get(key)?.as_field(),
            _ => return None,
        };
    }
    current.as_str()
}

fn write_slot<'a>(root: FieldMut<'a>, slot: &SlotPath) -> Option<&'a mut String> {
    let mut current = root;
    for step in &slot.0 {
        current = match (current, step) {
            (FieldMut::Record(record), Step::Field(name)) => record.field_mut(name)?,
            (FieldMut::Mapping(map), Step::Key(key)) => map.get_mut(key)?.as_field_mut(),
            _ => return None,
        };
    }
    match current {
        FieldMut::Str(s) => Some(s),
        _ => None,
    }
}

/// Resolve tokens in `template` against `context`, falling back to the process environment.
pub fn replace_string_variables<C: AsContext + ?Sized>(template: &str, context: &C) -> String {
    Replacer::new().replace_string_variables(template, context)
}

/// [`Replacer::replace`] with default options and the process environment.
pub fn replace<C: AsContext + ?Sized>(target: &mut dyn Record, context: &C) -> Result<()> {
    Replacer::new().replace(target, context)
}

/// [`Replacer::replace_self`] with default options and the process environment.
pub fn replace_self(target: &mut dyn Record) -> Result<()> {
    Replacer::new().replace_self(target)
}

/// [`Replacer::replace_map`] with default options and the process environment.
pub fn replace_map<C: AsContext + ?Sized>(map: &mut Mapping, context: &C) -> Result<()> {
    Replacer::new().replace_map(map, context)
}

/// [`Replacer::replace_map_self`] with default options and the process environment.
pub fn replace_map_self(map: &mut Mapping) -> Result<()> {
    Replacer::new().replace_map_self(map)
}
