//! # Lattice
//!
//! A path-addressable, versioned publish/subscribe data store for
//! synchronizing hierarchical application state between producers
//! (servers, background computations) and consumers (UI subscribers),
//! with lazy activation of expensive data sources and resilience to
//! out-of-order or missing updates.
//!
//! ## Architecture
//!
//! ```text
//! producers ──► DataBus ──► providers ──► subscribers
//!
//! transport ──► SyncSession ──► VersionTracker ──► VersionedState
//! ```
//!
//! ## Example
//!
//! ```
//! use lattice::prelude::*;
//!
//! let bus = DataBus::new();
//! let path = Path::from("doc/title");
//!
//! let sub = bus.subscribe(&path, |value| {
//!     println!("title is now {:?}", value.as_str());
//! }).unwrap();
//!
//! bus.publish(&path, Value::from("Hello")).unwrap();
//! sub.dispose();
//! bus.dispose();
//! ```

pub use lattice_bus as bus;
pub use lattice_sync as sync;
pub use lattice_value as value;

pub use lattice_bus::{BusError, BusStats, DataBus, Provider, PublishContext, Subscription};
pub use lattice_sync::{
    apply_delta, Delta, DeltaBuilder, DeltaError, DeltaOp, RemoteDelta, SessionConfig,
    SessionError, SessionHandle, SessionStats, Snapshot, SyncSession, VersionTracker,
    VersionedState,
};
pub use lattice_value::{delete, get, set, InvalidPathError, Path, Value};

/// Re-export of commonly used types
pub mod prelude {
    pub use lattice_bus::{DataBus, Provider, PublishContext, Subscription};
    pub use lattice_sync::{Delta, DeltaBuilder, Snapshot, SyncSession, VersionTracker, VersionedState};
    pub use lattice_value::{Path, Value};
}
