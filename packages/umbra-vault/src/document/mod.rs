//! # Documents
//!
//! The plaintext shape of everything stored in a vault.
//!
//! ## Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              DOCUMENT                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   { "id": "m1",              ◄── message id, assigned by the channel    │
//! │     "username": "someone",   ◄── body: encrypted into the message       │
//! │     "coins": 150 }                                                      │
//! │                                                                         │
//! │   path.rs    dot-path get / set / delete                                │
//! │   update.rs  $set, $inc, $unset, $push                                  │
//! │   filter.rs  pattern or predicate matching                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `id` field is never part of the encrypted body. It is attached when a
//! message is decoded and stripped again before every write.

pub mod path;

mod filter;
mod update;

pub use filter::Filter;
pub use update::{apply_update, UpdateOperators};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Reserved field carrying the message id
pub const ID_FIELD: &str = "id";

/// A decoded document: a JSON object whose `id` is its message id
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Build a document from a message id and its body fields
    ///
    /// Any `id` inside `fields` is discarded in favour of `id`.
    pub fn from_parts(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        let mut map = Map::with_capacity(fields.len() + 1);
        map.insert(ID_FIELD.to_string(), Value::String(id.into()));
        for (key, value) in fields {
            if key != ID_FIELD {
                map.insert(key, value);
            }
        }
        Self(map)
    }

    /// The message id
    pub fn id(&self) -> &str {
        self.0.get(ID_FIELD).and_then(Value::as_str).unwrap_or_default()
    }

    /// Read a value by dot path
    pub fn get(&self, path: &str) -> Option<&Value> {
        path::get(&self.0, path)
    }

    /// All fields, `id` included
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The fields that get encrypted: everything except `id`
    pub fn body(&self) -> Map<String, Value> {
        self.0
            .iter()
            .filter(|(key, _)| key.as_str() != ID_FIELD)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Convert into a plain JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Deserialize into a typed record
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| Error::DeserializationError(e.to_string()))
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }
}

impl TryFrom<Value> for Document {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(Error::InvalidDocument("expected a JSON object".into()));
        };

        match map.get(ID_FIELD) {
            Some(Value::String(id)) => Ok(Self::from_parts(id.clone(), map)),
            _ => Err(Error::InvalidDocument("missing string id".into())),
        }
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}
