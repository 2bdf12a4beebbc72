//! # lattice_bus - Path-Addressable Data Bus
//!
//! The public surface of Lattice's publish/subscribe store. Producers
//! publish values at hierarchical paths; consumers subscribe to exact
//! paths and are notified synchronously; providers model lazily-started
//! data sources whose cost is only paid while at least one subscriber
//! cares.
//!
//! ## Architecture
//!
//! ```text
//! publish(path, value)
//!     │
//!     ▼
//! NodeTree ──► provider interception (registration order)
//!     │
//!     ▼
//! node value replaced ──► exact-path subscribers notified
//! ```
//!
//! Notification is restricted to exact-path subscribers; ancestor or
//! descendant propagation is a caller concern (re-publish at the other
//! path).

pub mod bus;
pub mod node;
pub mod provider;

pub use bus::{BusError, BusStats, DataBus, Subscription};
pub use node::{Node, NodeTree, ProviderEntry};
pub use provider::{Provider, PublishContext};
