//! # lattice_sync - Versioned Deltas & Resync
//!
//! This crate provides the reconciliation half of Lattice. Remote sources
//! deliver deltas (ordered path operations plus version metadata) for
//! whole versioned resources; the version tracker decides whether each
//! delta is stale, contiguous, or has a gap, and the delta engine applies
//! the contiguous ones.
//!
//! ## Architecture
//!
//! ```text
//! Transport ──► SessionHandle ──► SyncSession ──► VersionedState
//!                                     │
//!                                VersionTracker
//! ```
//!
//! ## Key Concepts
//!
//! - **Delta**: versioned, ordered set of path operations
//! - **VersionTracker**: per-resource-key last-applied version store
//! - **VersionedState**: value + version + last-update timestamp
//! - **Snapshot**: full value + explicit version, used to resync after
//!   a version gap
//! - **SyncSession**: channel-fed inbox that drains deltas and flags
//!   the keys that need a snapshot

pub mod delta;
pub mod session;
pub mod state;
pub mod tracker;

pub use delta::{apply_delta, Delta, DeltaBuilder, DeltaError, DeltaOp};
pub use session::{
    RemoteDelta, SessionConfig, SessionError, SessionHandle, SessionStats, SyncSession,
};
pub use state::{Snapshot, VersionedState};
pub use tracker::VersionTracker;
