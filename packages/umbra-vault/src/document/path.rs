//! Dot-path access into nested JSON objects.
//!
//! A path such as `profile.address.city` walks one object key per segment.
//! Only objects are traversed; arrays and primitives end the walk.

use serde_json::{Map, Value};

/// Read the value at `path`
///
/// Returns `None` when any segment is absent or an intermediate value is
/// not an object.
pub fn get<'a>(doc: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;

    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }

    Some(current)
}

/// Write `value` at `path`, creating intermediate objects as needed
///
/// A non-object intermediate is replaced by an empty object. An empty path
/// or an empty final segment leaves the document untouched.
pub fn set(doc: &mut Map<String, Value>, path: &str, value: Value) {
    let Some((parents, last)) = split(path) else {
        return;
    };

    let mut current = doc;
    for segment in parents {
        current = ensure_object(current, segment);
    }

    current.insert(last.to_string(), value);
}

/// Remove the value at `path`, returning it
///
/// No-op when an intermediate segment does not resolve to an object.
/// Sibling order is preserved.
pub fn delete(doc: &mut Map<String, Value>, path: &str) -> Option<Value> {
    let (parents, last) = split(path)?;

    let mut current = doc;
    for segment in parents {
        current = current.get_mut(segment)?.as_object_mut()?;
    }

    current.shift_remove(last)
}

/// Mutable access to the value at `path`, if it resolves
pub(crate) fn get_mut<'a>(doc: &'a mut Map<String, Value>, path: &str) -> Option<&'a mut Value> {
    let (parents, last) = split(path)?;

    let mut current = doc;
    for segment in parents {
        current = current.get_mut(segment)?.as_object_mut()?;
    }

    current.get_mut(last)
}

fn split(path: &str) -> Option<(Vec<&str>, &str)> {
    if path.is_empty() {
        return None;
    }

    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop()?;
    if last.is_empty() {
        return None;
    }

    Some((segments, last))
}

fn ensure_object<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));

    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }

    match slot {
        Value::Object(inner) => inner,
        _ => unreachable!("slot was just replaced with an object"),
    }
}
