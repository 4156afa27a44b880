//! Document filters.
//!
//! A filter is either a pattern of `path → expected value` pairs, all of
//! which must hold, or an arbitrary predicate over the decoded document.
//!
//! Pattern equality is strict: values must have the same JSON type, numbers
//! compare by numeric value, and objects or arrays never match.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::{path, Document};
use crate::error::{Error, Result};

type PredicateFn = dyn Fn(&Document) -> bool + Send + Sync;

/// Selects documents for reads, updates and deletes
#[derive(Clone)]
pub enum Filter {
    /// Every path must strictly equal the given value
    Pattern(Map<String, Value>),
    /// Arbitrary test over the full document, `id` included
    Predicate(Arc<PredicateFn>),
}

impl Filter {
    /// Matches every document
    pub fn all() -> Self {
        Filter::Pattern(Map::new())
    }

    /// Filter with a closure
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Document) -> bool + Send + Sync + 'static,
    {
        Filter::Predicate(Arc::new(f))
    }

    /// Pattern with a single path
    pub fn field(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::all().and(path, value)
    }

    /// Add a path to a pattern
    ///
    /// On a predicate filter the pair is folded into the closure.
    pub fn and(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        let path = path.into();
        let value = value.into();

        match self {
            Filter::Pattern(mut pattern) => {
                pattern.insert(path, value);
                Filter::Pattern(pattern)
            }
            Filter::Predicate(f) => Filter::predicate(move |doc| {
                f(doc) && doc.get(&path).is_some_and(|actual| strict_equals(actual, &value))
            }),
        }
    }

    /// Test a document
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Pattern(pattern) => pattern.iter().all(|(key, expected)| {
                path::get(doc.fields(), key).is_some_and(|actual| strict_equals(actual, expected))
            }),
            Filter::Predicate(f) => f(doc),
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter::all()
    }
}

impl From<Map<String, Value>> for Filter {
    fn from(pattern: Map<String, Value>) -> Self {
        Filter::Pattern(pattern)
    }
}

impl TryFrom<Value> for Filter {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(pattern) => Ok(Filter::Pattern(pattern)),
            other => Err(Error::InvalidDocument(format!(
                "filter pattern must be an object, got {}",
                other
            ))),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Pattern(pattern) => f.debug_tuple("Pattern").field(pattern).finish(),
            Filter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

fn strict_equals(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => a.as_f64() == b.as_f64(),
        },
        _ => false,
    }
}
