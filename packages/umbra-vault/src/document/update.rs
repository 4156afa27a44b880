//! Update operators.
//!
//! An operator set is applied to a copy of a document in a fixed order:
//! `$set`, `$inc`, `$unset`, `$push`. Within one operator, entries apply in
//! the order they were given.
//!
//! ```text
//! { "$set":   { "premium": true },
//!   "$inc":   { "coins": 50 },
//!   "$unset": ["legacy.flag"],          // or { "legacy.flag": true }
//!   "$push":  { "badges": "early" } }
//! ```

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use super::{path, Document, ID_FIELD};
use crate::error::{Error, Result};

/// A set of update operators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateOperators {
    /// Assign values at paths
    #[serde(rename = "$set", default, skip_serializing_if = "IndexMap::is_empty")]
    pub set: IndexMap<String, Value>,

    /// Add to numeric values; an absent path counts as zero
    #[serde(rename = "$inc", default, skip_serializing_if = "IndexMap::is_empty")]
    pub inc: IndexMap<String, Number>,

    /// Remove paths
    #[serde(
        rename = "$unset",
        default,
        skip_serializing_if = "IndexSet::is_empty",
        with = "unset_paths"
    )]
    pub unset: IndexSet<String>,

    /// Append to arrays; a missing or non-array value becomes a one-element array
    #[serde(rename = "$push", default, skip_serializing_if = "IndexMap::is_empty")]
    pub push: IndexMap<String, Value>,
}

impl UpdateOperators {
    /// An empty operator set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `$set` entry
    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(path.into(), value.into());
        self
    }

    /// Add an `$inc` entry
    pub fn inc(mut self, path: impl Into<String>, by: impl Into<Number>) -> Self {
        self.inc.insert(path.into(), by.into());
        self
    }

    /// Add an `$unset` entry
    pub fn unset(mut self, path: impl Into<String>) -> Self {
        self.unset.insert(path.into());
        self
    }

    /// Add a `$push` entry
    pub fn push(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push.insert(path.into(), value.into());
        self
    }

    /// True when no operator has any entry
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.inc.is_empty() && self.unset.is_empty() && self.push.is_empty()
    }

    /// Reject any entry that targets the reserved `id` field
    pub fn validate(&self) -> Result<()> {
        let paths = self
            .set
            .keys()
            .chain(self.inc.keys())
            .chain(self.unset.iter())
            .chain(self.push.keys());

        for path in paths {
            if is_reserved(path) {
                return Err(Error::ReservedField(path.clone()));
            }
        }

        Ok(())
    }

    /// Apply to a copy of `document`, returning the updated copy
    pub fn apply(&self, document: &Document) -> Result<Document> {
        self.validate()?;

        let mut next = document.clone();
        let fields = next.fields_mut();

        for (key, value) in &self.set {
            path::set(fields, key, value.clone());
        }

        for (key, by) in &self.inc {
            let updated = match path::get(fields, key) {
                None => Value::Number(by.clone()),
                Some(Value::Number(current)) => add(current, by),
                Some(_) => return Err(Error::NotNumeric(key.clone())),
            };
            path::set(fields, key, updated);
        }

        for key in &self.unset {
            path::delete(fields, key);
        }

        for (key, value) in &self.push {
            if let Some(Value::Array(items)) = path::get_mut(fields, key) {
                items.push(value.clone());
                continue;
            }
            path::set(fields, key, Value::Array(vec![value.clone()]));
        }

        Ok(next)
    }
}

/// Apply `operators` to `document`, returning a new document
pub fn apply_update(document: &Document, operators: &UpdateOperators) -> Result<Document> {
    operators.apply(document)
}

fn is_reserved(path: &str) -> bool {
    path == ID_FIELD
        || path
            .strip_prefix(ID_FIELD)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Integers stay integers until they overflow or meet a float.
fn add(current: &Number, by: &Number) -> Value {
    if let (Some(a), Some(b)) = (current.as_i64(), by.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Value::from(sum);
        }
    }

    if let (Some(a), Some(b)) = (current.as_u64(), by.as_u64()) {
        if let Some(sum) = a.checked_add(b) {
            return Value::from(sum);
        }
    }

    let sum = current.as_f64().unwrap_or_default() + by.as_f64().unwrap_or_default();
    Number::from_f64(sum).map_or(Value::Null, Value::Number)
}

mod unset_paths {
    use indexmap::{IndexMap, IndexSet};
    use serde::de::IgnoredAny;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        List(Vec<String>),
        Flags(IndexMap<String, IgnoredAny>),
    }

    pub fn serialize<S: Serializer>(paths: &IndexSet<String>, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(paths.len()))?;
        for path in paths {
            map.serialize_entry(path, &true)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<IndexSet<String>, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::List(paths) => paths.into_iter().collect(),
            Repr::Flags(flags) => flags.into_keys().collect(),
        })
    }
}
