//! Version tracking - per-resource last-applied version store
//!
//! The tracker is the single source of truth for version decisions; no
//! other component may guess or cache version numbers independently. It
//! is an explicitly constructed, explicitly owned instance passed by
//! reference to all callers.

use crate::delta::Delta;
use std::collections::HashMap;

/// Mapping from resource key to the last-applied version number.
///
/// Keys are created on first `set_version` or first successful delta
/// application and default to version 0 when absent.
#[derive(Debug, Clone, Default)]
pub struct VersionTracker {
    versions: HashMap<String, u64>,
}

impl VersionTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Last applied version for `key`, 0 if never seen
    pub fn get_version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    /// Unconditional overwrite, used after snapshot application
    pub fn set_version(&mut self, key: impl Into<String>, version: u64) {
        self.versions.insert(key.into(), version);
    }

    /// True iff the delta advances past the tracked version.
    ///
    /// Equal or lower versions are already applied; replaying them is
    /// safe and they must be silently dropped.
    pub fn should_apply(&self, key: &str, delta: &Delta) -> bool {
        delta.version > self.get_version(key)
    }

    /// True iff the delta's base does not match the tracked version.
    ///
    /// A gap means one or more deltas were missed; applying on top of a
    /// mismatched base would silently corrupt the value, so the caller
    /// must resynchronize via a full snapshot instead.
    pub fn has_gap(&self, key: &str, delta: &Delta) -> bool {
        delta.base_version != self.get_version(key)
    }

    /// Drop tracking for one key; its next delta starts fresh from 0
    pub fn clear(&mut self, key: &str) {
        self.versions.remove(key);
    }

    /// Drop all tracking (resets the whole sync session)
    pub fn clear_all(&mut self) {
        self.versions.clear();
    }

    /// Keys currently tracked
    pub fn tracked_keys(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(|k| k.as_str())
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Check if nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
