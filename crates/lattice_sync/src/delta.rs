//! Deltas - versioned, ordered path operations
//!
//! A delta transforms one resource version into the next. Operations are
//! applied strictly in list order so later operations can overwrite
//! earlier ones at overlapping paths; order is part of the delta's
//! meaning and must be preserved by any transport.

use lattice_value::{self as path_ops, InvalidPathError, Path, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// A single operation inside a delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeltaOp {
    /// Place a value at a path
    Set { path: Path, value: Value },
    /// Remove the entry at a path
    Delete { path: Path },
    /// Shallow-merge an object-shaped partial into the object at a path
    Merge { path: Path, partial: Value },
}

/// An ordered set of path operations plus version metadata.
///
/// `version` is the version this delta produces; `base_version` is the
/// version it expects to be applied on top of. `version > base_version`
/// always holds for a well-formed delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// Version produced by this delta
    pub version: u64,
    /// Version this delta applies on top of
    pub base_version: u64,
    /// Timestamp assigned by the producer (milliseconds)
    pub timestamp: u64,
    /// Operations, applied strictly in list order
    pub operations: Vec<DeltaOp>,
}

impl Delta {
    /// Create an empty delta for the given version step
    pub fn new(base_version: u64, version: u64) -> Self {
        Self {
            version,
            base_version,
            timestamp: 0,
            operations: Vec::new(),
        }
    }

    /// Check the version metadata invariant
    pub fn validate(&self) -> Result<(), DeltaError> {
        if self.version <= self.base_version {
            return Err(DeltaError::InvalidVersionRange {
                version: self.version,
                base_version: self.base_version,
            });
        }
        Ok(())
    }

    /// Check if the delta carries no operations
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }
}

/// Builder for deltas with a fluent API
pub struct DeltaBuilder {
    delta: Delta,
}

impl DeltaBuilder {
    /// Start building a delta for the given version step
    pub fn new(base_version: u64, version: u64) -> Self {
        Self {
            delta: Delta::new(base_version, version),
        }
    }

    /// Set the producer timestamp
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.delta.timestamp = timestamp;
        self
    }

    /// Add a set operation
    pub fn set(mut self, path: impl Into<Path>, value: impl Into<Value>) -> Self {
        self.delta.operations.push(DeltaOp::Set {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    /// Add a delete operation
    pub fn delete(mut self, path: impl Into<Path>) -> Self {
        self.delta.operations.push(DeltaOp::Delete { path: path.into() });
        self
    }

    /// Add a merge operation
    pub fn merge(mut self, path: impl Into<Path>, partial: impl Into<Value>) -> Self {
        self.delta.operations.push(DeltaOp::Merge {
            path: path.into(),
            partial: partial.into(),
        });
        self
    }

    /// Finish building
    pub fn build(self) -> Delta {
        self.delta
    }
}

/// Errors from delta validation and application
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeltaError {
    /// The delta's version metadata is inconsistent
    #[error("invalid version range: version {version} must be greater than base {base_version}")]
    InvalidVersionRange { version: u64, base_version: u64 },
    /// A path operation was structurally invalid
    #[error("path operation failed: {0}")]
    Path(#[from] InvalidPathError),
}

/// Apply `delta.operations` to `value` in order, producing a new value.
///
/// An empty operation list returns the original value unchanged. A delete
/// of the whole value leaves `Value::Null` so later operations in the
/// same delta still compose.
pub fn apply_delta(value: &Value, delta: &Delta) -> Result<Value, DeltaError> {
    delta.validate()?;

    let mut current = value.clone();
    for op in &delta.operations {
        current = match op {
            DeltaOp::Set { path, value } => path_ops::set(&current, path, value.clone())?,
            DeltaOp::Delete { path } => {
                path_ops::delete(&current, path).unwrap_or(Value::Null)
            }
            DeltaOp::Merge { path, partial } => {
                let merged = merge_values(path_ops::get(&current, path), partial);
                if path.is_root() {
                    merged
                } else {
                    path_ops::set(&current, path, merged)?
                }
            }
        };
    }
    Ok(current)
}

/// Shallow merge: entries of an object-shaped `partial` win over the
/// target's. A non-object target or partial degrades to replacement.
fn merge_values(target: Option<&Value>, partial: &Value) -> Value {
    match (target.and_then(Value::as_object), partial.as_object()) {
        (Some(base), Some(extra)) => {
            let mut copy = base.clone();
            for (key, value) in extra {
                copy.insert(key.clone(), value.clone());
            }
            Value::Object(Arc::new(copy))
        }
        _ => partial.clone(),
    }
}
