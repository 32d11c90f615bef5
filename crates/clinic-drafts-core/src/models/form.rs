//! Untyped nested form data addressed by key paths.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Answers to a clinical notes form: a nested JSON object with no fixed schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct FormData(Map<String, Value>);

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value. Returns `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Read the value at `path`.
    ///
    /// `None` if any segment is missing, the traversal reaches a non-object,
    /// or the path is empty. A stored JSON `null` is `Some(&Value::Null)`.
    pub fn get<P: AsRef<str>>(&self, path: &[P]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.0.get(first.as_ref())?;
        for segment in rest {
            current = current.as_object()?.get(segment.as_ref())?;
        }
        Some(current)
    }

    /// Set `value` at `path`, creating intermediate objects as needed.
    ///
    /// A non-object value sitting on an intermediate segment is replaced by an
    /// empty object. Returns `false` (and changes nothing) for an empty path.
    pub fn set<P: AsRef<str>>(&mut self, path: &[P], value: Value) -> bool {
        let Some((last, parents)) = path.split_last() else {
            return false;
        };

        let mut current = &mut self.0;
        for segment in parents {
            let slot = current
                .entry(segment.as_ref().to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            current = match slot {
                Value::Object(map) => map,
                _ => unreachable!("slot was just made an object"),
            };
        }

        current.insert(last.as_ref().to_string(), value);
        true
    }

    /// Shallow merge: every top-level key of `overrides` replaces ours.
    pub fn merge_top_level(&mut self, overrides: &FormData) {
        for (key, value) in &overrides.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }
}

impl From<Map<String, Value>> for FormData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
