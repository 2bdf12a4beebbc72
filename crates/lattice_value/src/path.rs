//! Paths and pure structural operations on values
//!
//! A path is an ordered sequence of string segments addressing a location
//! in a hierarchical value. The operations in this module never mutate
//! their input: `set` and `delete` produce a new value whose spine (the
//! containers along the path) is shallow-copied while every unrelated
//! sibling keeps sharing its storage with the original.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// An ordered sequence of string segments addressing a location in a
/// hierarchical value or in the node tree. The empty path is the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Path(Vec<String>);

impl Path {
    /// The root path (no segments)
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Create a path from segments
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Check if this is the root path
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the path has no segments
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The segments of this path
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Append a segment in place
    pub fn push(&mut self, segment: impl Into<String>) {
        self.0.push(segment.into());
    }

    /// A new path with one more segment
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// The parent path, or None for the root
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// The last segment, or None for the root
    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(|s| s.as_str())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0.join("/"))
        }
    }
}

impl From<&str> for Path {
    /// Parse a `/`-separated path; empty segments are skipped, so `""`
    /// and `"/"` both parse as the root.
    fn from(s: &str) -> Self {
        Self(
            s.split('/')
                .filter(|seg| !seg.is_empty())
                .map(|seg| seg.to_string())
                .collect(),
        )
    }
}

impl From<Vec<String>> for Path {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl<S: Into<String>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Error raised when a structural mutation is given an empty path where
/// a target location is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidPathError;

impl fmt::Display for InvalidPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid path: a set requires at least one segment")
    }
}

impl std::error::Error for InvalidPathError {}

/// Read the value at `path`.
///
/// Returns `None` if any intermediate segment is absent or the container
/// at that point is not traversable. Never fails on a missing path.
pub fn get<'a>(value: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.segments() {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Produce a new value with `new_value` placed at `path`.
///
/// Containers along the path are shallow-copied; unrelated siblings keep
/// sharing their storage with `value`. Missing or non-traversable
/// intermediates are superseded by fresh objects. Fails only when `path`
/// is empty, since there is no location to set.
pub fn set(value: &Value, path: &Path, new_value: Value) -> Result<Value, InvalidPathError> {
    if path.is_root() {
        return Err(InvalidPathError);
    }
    Ok(set_in(Some(value), path.segments(), new_value))
}

fn set_in(value: Option<&Value>, segments: &[String], new_value: Value) -> Value {
    let Some((segment, rest)) = segments.split_first() else {
        return new_value;
    };

    match value {
        Some(Value::Object(map)) => {
            let child = set_in(map.get(segment), rest, new_value);
            let mut copy = (**map).clone();
            copy.insert(segment.clone(), child);
            Value::Object(Arc::new(copy))
        }
        Some(Value::Array(items)) => match segment.parse::<usize>() {
            Ok(index) if index < items.len() => {
                let child = set_in(Some(&items[index]), rest, new_value);
                let mut copy = (**items).clone();
                copy[index] = child;
                Value::Array(Arc::new(copy))
            }
            Ok(index) if index == items.len() => {
                let mut copy = (**items).clone();
                copy.push(set_in(None, rest, new_value));
                Value::Array(Arc::new(copy))
            }
            _ => object_with(segment, set_in(None, rest, new_value)),
        },
        // Missing or scalar intermediate: a fresh object takes its place.
        _ => object_with(segment, set_in(None, rest, new_value)),
    }
}

fn object_with(segment: &str, child: Value) -> Value {
    let mut map = std::collections::HashMap::new();
    map.insert(segment.to_string(), child);
    Value::Object(Arc::new(map))
}

/// Produce a new value with the entry at `path` removed.
///
/// Deleting with the empty path deletes everything and yields `None`.
/// Deleting a path whose parent does not contain the final segment is a
/// no-op producing an equivalent value (idempotent).
pub fn delete(value: &Value, path: &Path) -> Option<Value> {
    if path.is_root() {
        return None;
    }
    Some(delete_in(value, path.segments()))
}

fn delete_in(value: &Value, segments: &[String]) -> Value {
    let Some((segment, rest)) = segments.split_first() else {
        return value.clone();
    };

    match value {
        Value::Object(map) => {
            if rest.is_empty() {
                let mut copy = (**map).clone();
                copy.remove(segment);
                Value::Object(Arc::new(copy))
            } else if let Some(child) = map.get(segment) {
                let mut copy = (**map).clone();
                copy.insert(segment.clone(), delete_in(child, rest));
                Value::Object(Arc::new(copy))
            } else {
                value.clone()
            }
        }
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(index) if index < items.len() => {
                let mut copy = (**items).clone();
                if rest.is_empty() {
                    copy.remove(index);
                } else {
                    copy[index] = delete_in(&items[index], rest);
                }
                Value::Array(Arc::new(copy))
            }
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}
