//! Sync session - channel-fed inbox for remote deltas
//!
//! The session is the in-process boundary the transport feeds: transport
//! threads submit deltas through a cloneable handle, the owner drains
//! them, and keys that hit a version gap are flagged so the transport
//! can request full snapshots out of band.

use crate::delta::{Delta, DeltaError};
use crate::state::{Snapshot, VersionedState};
use crate::tracker::VersionTracker;
use crossbeam_channel::{bounded, Receiver, Sender};
use lattice_value::Value;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Configuration for a sync session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum deltas queued in the inbox before submission fails
    pub max_pending_deltas: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_pending_deltas: 1024,
        }
    }
}

/// Statistics about session activity
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Deltas applied to some resource
    pub deltas_applied: u64,
    /// Stale deltas dropped
    pub deltas_stale: u64,
    /// Version gaps detected
    pub gaps_detected: u64,
    /// Snapshots applied
    pub snapshots_applied: u64,
}

/// A delta addressed to a resource key, as delivered by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDelta {
    /// Logical resource the delta belongs to
    pub key: String,
    /// The delta itself
    pub delta: Delta,
}

/// Errors from delta submission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The bounded inbox is full
    #[error("delta inbox is full")]
    InboxFull,
}

/// Owns the version tracker and the per-key versioned states, and drains
/// the delta inbox.
pub struct SyncSession {
    tracker: VersionTracker,
    states: HashMap<String, VersionedState<Value>>,
    /// Keys whose last delta hit a version gap; cleared by snapshots
    needs_snapshot: BTreeSet<String>,
    sender: Sender<RemoteDelta>,
    receiver: Receiver<RemoteDelta>,
    stats: SessionStats,
}

impl SyncSession {
    /// Create a session with the given config
    pub fn new(config: SessionConfig) -> Self {
        let (sender, receiver) = bounded(config.max_pending_deltas);
        Self {
            tracker: VersionTracker::new(),
            states: HashMap::new(),
            needs_snapshot: BTreeSet::new(),
            sender,
            receiver,
            stats: SessionStats::default(),
        }
    }

    /// Cloneable handle for transport threads to submit deltas
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            sender: self.sender.clone(),
        }
    }

    /// Current state for a resource key
    pub fn state(&self, key: &str) -> Option<&VersionedState<Value>> {
        self.states.get(key)
    }

    /// The version tracker (single source of truth for version decisions)
    pub fn tracker(&self) -> &VersionTracker {
        &self.tracker
    }

    /// Keys whose last delta exposed a version gap and that are waiting
    /// for a snapshot
    pub fn keys_needing_snapshot(&self) -> impl Iterator<Item = &str> {
        self.needs_snapshot.iter().map(|k| k.as_str())
    }

    /// Apply a full snapshot for a key: overwrites the state, advances
    /// the tracker unconditionally, and clears any pending-gap flag.
    pub fn apply_snapshot(&mut self, key: impl Into<String>, snapshot: Snapshot) {
        let key = key.into();
        self.tracker.set_version(key.clone(), snapshot.version);
        self.needs_snapshot.remove(&key);
        self.states
            .insert(key, VersionedState::from_snapshot(snapshot));
        self.stats.snapshots_applied += 1;
    }

    /// Apply one delta for a key directly.
    ///
    /// Returns true when the delta advanced the state. Stale deltas and
    /// gaps return false; a gap additionally flags the key for snapshot
    /// resync.
    pub fn apply_remote(&mut self, key: &str, delta: &Delta) -> Result<bool, DeltaError> {
        delta.validate()?;

        if !self.tracker.should_apply(key, delta) {
            self.stats.deltas_stale += 1;
            log::warn!(
                "dropping stale delta for '{}': version {} already applied (at {})",
                key,
                delta.version,
                self.tracker.get_version(key)
            );
            return Ok(false);
        }

        if self.tracker.has_gap(key, delta) {
            self.stats.gaps_detected += 1;
            self.needs_snapshot.insert(key.to_string());
            log::warn!(
                "version gap for '{}': delta base {} does not match tracked {}; snapshot required",
                key,
                delta.base_version,
                self.tracker.get_version(key)
            );
            return Ok(false);
        }

        let base = self.states.get(key).cloned().unwrap_or_default();
        let data = crate::delta::apply_delta(&base.data, delta)?;
        self.states.insert(
            key.to_string(),
            VersionedState {
                data,
                version: delta.version,
                last_updated: delta.timestamp,
            },
        );
        self.tracker.set_version(key, delta.version);
        self.stats.deltas_applied += 1;
        Ok(true)
    }

    /// Drain everything queued in the inbox, applying deltas in arrival
    /// order. Returns the number of deltas processed. Malformed deltas
    /// are dropped with a warning rather than poisoning the queue.
    pub fn drain_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(remote) = self.receiver.try_recv() {
            processed += 1;
            if let Err(e) = self.apply_remote(&remote.key, &remote.delta) {
                log::warn!("discarding malformed delta for '{}': {}", remote.key, e);
            }
        }
        if processed > 0 {
            log::debug!("drained {} pending deltas", processed);
        }
        processed
    }

    /// Reset the whole sync session: states, tracking, and gap flags.
    /// The next delta for any key is treated as starting fresh from 0.
    pub fn clear(&mut self) {
        self.states.clear();
        self.tracker.clear_all();
        self.needs_snapshot.clear();
    }

    /// Current statistics
    pub fn stats(&self) -> SessionStats {
        self.stats.clone()
    }
}

impl Default for SyncSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

/// Handle for a transport thread to submit deltas into the session inbox
#[derive(Clone)]
pub struct SessionHandle {
    sender: Sender<RemoteDelta>,
}

impl SessionHandle {
    /// Submit a delta for a resource key
    pub fn submit(&self, key: impl Into<String>, delta: Delta) -> Result<(), SessionError> {
        self.sender
            .try_send(RemoteDelta {
                key: key.into(),
                delta,
            })
            .map_err(|_| SessionError::InboxFull)
    }
}
