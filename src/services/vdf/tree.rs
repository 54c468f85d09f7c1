//! Editable tree document and its JSON boundary.
//!
//! Array-likes are explicit here. The only place that infers them from
//! numeric object keys is [`TreeValue::from_json`].

use crate::types::errors::CodecError;
use serde_json::{Map, Value};

/// How an array-like was expressed in the tree document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayShape {
    /// Repeated sibling keys; persisted as a JSON array.
    Repeated,
    /// Literal `"0".."n-1"` keys; persisted as a JSON object.
    Numbered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeValue {
    Scalar(String),
    Object(Vec<(String, TreeValue)>),
    Array(Vec<TreeValue>, ArrayShape),
}

impl TreeValue {
    pub fn empty_object() -> Self {
        TreeValue::Object(Vec::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TreeValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, TreeValue::Scalar(_))
    }

    /// Value stored under `key` of an object.
    pub fn get(&self, key: &str) -> Option<&TreeValue> {
        match self {
            TreeValue::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Case-insensitive variant of [`TreeValue::get`].
    pub fn get_ignore_case(&self, key: &str) -> Option<&TreeValue> {
        match self {
            TreeValue::Object(entries) => entries
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Replace the value under `key`, or append it when absent.
    ///
    /// Returns `false` when `self` is not an object.
    pub fn insert(&mut self, key: impl Into<String>, value: TreeValue) -> bool {
        let TreeValue::Object(entries) = self else {
            return false;
        };
        let key = key.into();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => entries.push((key, value)),
        }
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<TreeValue> {
        let TreeValue::Object(entries) = self else {
            return None;
        };
        let idx = entries.iter().position(|(k, _)| k == key)?;
        Some(entries.remove(idx).1)
    }

    /// Elements of an array-like, or the value itself as a single element.
    ///
    /// VDF stores one occurrence of a repeatable key as a plain value, so
    /// readers that expect "one or more" use this.
    pub fn one_or_many(&self) -> Vec<&TreeValue> {
        match self {
            TreeValue::Array(items, _) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// Normalize a JSON tree document.
    ///
    /// Objects whose keys are decimal indices starting at `"0"` become
    /// numbered arrays; their keys must be exactly `0..n-1`. Gaps are
    /// rejected, never re-indexed. Numeric keys without a `"0"` stay an object.
    pub fn from_json(value: &Value) -> Result<TreeValue, CodecError> {
        match value {
            Value::String(s) => Ok(TreeValue::Scalar(s.clone())),
            Value::Number(n) => Ok(TreeValue::Scalar(n.to_string())),
            Value::Bool(b) => Ok(TreeValue::Scalar(if *b { "1" } else { "0" }.to_string())),
            Value::Null => Ok(TreeValue::Scalar(String::new())),
            Value::Array(items) => items
                .iter()
                .map(TreeValue::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(|items| TreeValue::Array(items, ArrayShape::Repeated)),
            Value::Object(map) => {
                if is_array_like(map.keys().map(String::as_str)) {
                    numbered_from_map(map)
                } else {
                    map.iter()
                        .map(|(k, v)| TreeValue::from_json(v).map(|v| (k.clone(), v)))
                        .collect::<Result<Vec<_>, _>>()
                        .map(TreeValue::Object)
                }
            }
        }
    }

    /// Serialize back into the persisted JSON shape.
    pub fn to_json(&self) -> Value {
        match self {
            TreeValue::Scalar(s) => Value::String(s.clone()),
            TreeValue::Object(entries) => {
                let mut map = Map::new();
                for (k, v) in entries {
                    map.insert(k.clone(), v.to_json());
                }
                Value::Object(map)
            }
            TreeValue::Array(items, ArrayShape::Repeated) => {
                Value::Array(items.iter().map(TreeValue::to_json).collect())
            }
            TreeValue::Array(items, ArrayShape::Numbered) => {
                let mut map = Map::new();
                for (i, v) in items.iter().enumerate() {
                    map.insert(i.to_string(), v.to_json());
                }
                Value::Object(map)
            }
        }
    }
}

/// Canonical decimal index: `"0"`, `"7"`, `"12"`; not `"07"` or `"-1"`.
pub fn is_index_key(key: &str) -> bool {
    !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key == "0" || !key.starts_with('0'))
        && key.parse::<usize>().is_ok()
}

/// Keys that mark an array-like: all decimal indices, one of them `"0"`.
pub fn is_array_like<'a>(keys: impl Iterator<Item = &'a str>) -> bool {
    let mut has_zero = false;
    for key in keys {
        if !is_index_key(key) {
            return false;
        }
        has_zero |= key == "0";
    }
    has_zero
}

/// Check that a set of index keys is exactly `0..n-1` and return them sorted.
pub fn contiguous_indices<'a>(keys: impl Iterator<Item = &'a str>) -> Result<Vec<usize>, CodecError> {
    let mut indices: Vec<usize> = keys
        .map(|k| {
            k.parse::<usize>()
                .map_err(|_| CodecError::Structural(format!("\"{k}\" is not an array index")))
        })
        .collect::<Result<_, _>>()?;
    indices.sort_unstable();
    if let Some((pos, found)) = indices.iter().enumerate().find(|(pos, idx)| *pos != **idx) {
        return Err(CodecError::Structural(format!(
            "array-like keys must run 0..{} without gaps; expected {pos}, found {found}",
            indices.len()
        )));
    }
    Ok(indices)
}

fn numbered_from_map(map: &Map<String, Value>) -> Result<TreeValue, CodecError> {
    let indices = contiguous_indices(map.keys().map(String::as_str))?;
    let mut items = Vec::with_capacity(indices.len());
    for idx in indices {
        let value = &map[&idx.to_string()];
        items.push(TreeValue::from_json(value)?);
    }
    Ok(TreeValue::Array(items, ArrayShape::Numbered))
}
