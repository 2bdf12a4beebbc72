//! Provider boundary - lazily-activated data sources
//!
//! A provider is registered at one bus path and models an expensive data
//! source (e.g. an external subscription) that should only run while at
//! least one subscriber cares. The bus calls the lifecycle hooks
//! synchronously: `on_activate` when the path's activation count
//! transitions 0 to 1, `on_deactivate` when it returns to 0, and
//! `on_publish` on every publish at the path.

use crate::bus::DataBus;
use lattice_value::{Path, Value};

/// Context passed to `Provider::on_publish`.
///
/// `old_value` is fixed from before any provider in the chain ran;
/// `value` is the output of the previous provider in registration order
/// (or the published value for the first).
pub struct PublishContext {
    /// Handle to the bus, for re-entrant reads or publishes
    pub bus: DataBus,
    /// The path being published to
    pub path: Path,
    /// Node value before this publish started
    pub old_value: Option<Value>,
    /// Current value in the interception chain
    pub value: Value,
}

/// A lazily-activated data source bound to a bus path.
///
/// All hooks have empty/identity defaults; implement only what the
/// source needs. Returning `None` from `on_publish` leaves the value
/// unchanged - it is "no transformation", never "set to null".
pub trait Provider: Send + Sync {
    /// The path this provider is bound to
    fn path(&self) -> &Path;

    /// Called when the path's activation count transitions 0 to 1
    fn on_activate(&self) {}

    /// Called when the path's activation count returns to 0
    fn on_deactivate(&self) {}

    /// Called on every publish at the path; may return a replacement
    /// value that becomes the input to the next provider in the chain
    fn on_publish(&self, _ctx: &PublishContext) -> Option<Value> {
        None
    }
}
