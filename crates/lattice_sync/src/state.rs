//! Versioned state - a value coupled with its version metadata
//!
//! State is never mutated in place: every successful application
//! produces a new `VersionedState` and the caller replaces its
//! reference. Stale deltas and version gaps leave the state untouched
//! and are reported through warn-level diagnostics rather than errors,
//! since the correct recovery path for a gap is transport-level.

use crate::delta::{apply_delta, Delta, DeltaError};
use crate::tracker::VersionTracker;
use lattice_value::Value;
use serde::{Deserialize, Serialize};

/// A full value plus explicit version, used to (re)synchronize a
/// resource from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Complete resource value
    pub data: Value,
    /// Version the value corresponds to
    pub version: u64,
    /// Timestamp assigned by the producer (milliseconds)
    pub timestamp: u64,
}

impl Snapshot {
    /// Create a snapshot
    pub fn new(data: Value, version: u64, timestamp: u64) -> Self {
        Self {
            data,
            version,
            timestamp,
        }
    }
}

/// A value coupled with its version and last-update timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedState<T> {
    /// Current data
    pub data: T,
    /// Version the data corresponds to
    pub version: u64,
    /// Timestamp of the last applied update (milliseconds)
    pub last_updated: u64,
}

impl<T> VersionedState<T> {
    /// Create a state at version 0 with an initial value
    pub fn new(data: T) -> Self {
        Self {
            data,
            version: 0,
            last_updated: 0,
        }
    }
}

impl VersionedState<Value> {
    /// Create a state from a full snapshot carrying an explicit version.
    ///
    /// The caller is responsible for advancing the tracker alongside
    /// (`VersionTracker::set_version`); `SyncSession::apply_snapshot`
    /// does both.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            data: snapshot.data,
            version: snapshot.version,
            last_updated: snapshot.timestamp,
        }
    }

    /// The single entry point for applying a delta to versioned state.
    ///
    /// Combines the tracker's decision with delta application:
    /// - stale delta (already applied): dropped, state returned unchanged
    /// - version gap (missed deltas): state returned unchanged; the
    ///   caller detects the lack of progress and requests a snapshot
    /// - contiguous delta: applied; the returned state carries the
    ///   delta's version and timestamp and the tracker is advanced
    ///
    /// Replays of an already-applied delta are idempotent.
    pub fn apply_versioned_delta(
        &self,
        tracker: &mut VersionTracker,
        key: &str,
        delta: &Delta,
    ) -> Result<VersionedState<Value>, DeltaError> {
        delta.validate()?;

        if !tracker.should_apply(key, delta) {
            log::warn!(
                "dropping stale delta for '{}': version {} already applied (at {})",
                key,
                delta.version,
                tracker.get_version(key)
            );
            return Ok(self.clone());
        }

        if tracker.has_gap(key, delta) {
            log::warn!(
                "version gap for '{}': delta base {} does not match tracked {}; snapshot required",
                key,
                delta.base_version,
                tracker.get_version(key)
            );
            return Ok(self.clone());
        }

        let data = apply_delta(&self.data, delta)?;
        tracker.set_version(key, delta.version);

        Ok(VersionedState {
            data,
            version: delta.version,
            last_updated: delta.timestamp,
        })
    }
}

impl Default for VersionedState<Value> {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}
