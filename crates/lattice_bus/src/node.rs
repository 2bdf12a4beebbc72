//! Node tree - hierarchical storage for the data bus
//!
//! A node exists for a path only once something has published to,
//! subscribed to, or registered a provider on that path or a relative of
//! it; nodes are never proactively created for unused paths. Children
//! are kept in a `BTreeMap` so depth-first walks (disposal) visit them
//! in a deterministic order.

use crate::provider::Provider;
use lattice_value::{Path, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Subscriber callback, shared so notification can run on a snapshot
/// taken outside the tree lock.
pub(crate) type SubscriberFn = Arc<dyn Fn(&Value) + Send + Sync>;

/// One registered subscription at a node
pub(crate) struct SubscriberEntry {
    /// Bus-unique subscription id
    pub id: u64,
    /// The callback
    pub callback: SubscriberFn,
}

/// A provider registered at a node, with its activation state.
///
/// `active` realizes the exactly-once guarantee for the 0<->1 activation
/// transitions: a hook only fires when the flag actually flips.
pub struct ProviderEntry {
    /// The provider
    pub provider: Arc<dyn Provider>,
    /// Whether `on_activate` has fired without a matching deactivate
    pub active: bool,
}

/// An entry in the node tree, addressed by one path segment under its
/// parent.
#[derive(Default)]
pub struct Node {
    /// Current data at this path, if any has been published
    pub value: Option<Value>,
    /// Subscriptions at exactly this path, in registration order
    pub(crate) subscribers: Vec<SubscriberEntry>,
    /// Providers at exactly this path, in registration order
    pub providers: Vec<ProviderEntry>,
    /// Live subscriptions at this path; providers are active iff > 0
    pub activation_count: usize,
    /// Children by path segment, created lazily on first access
    pub children: BTreeMap<String, Node>,
}

/// The tree of nodes, rooted at the empty path
#[derive(Default)]
pub struct NodeTree {
    root: Node,
}

impl NodeTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the node at `path` without creating anything
    pub fn find(&self, path: &Path) -> Option<&Node> {
        let mut node = &self.root;
        for segment in path.segments() {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    /// Find the node at `path` mutably without creating anything
    pub fn find_mut(&mut self, path: &Path) -> Option<&mut Node> {
        let mut node = &mut self.root;
        for segment in path.segments() {
            node = node.children.get_mut(segment)?;
        }
        Some(node)
    }

    /// Locate or create the node chain for `path`
    pub fn node_mut(&mut self, path: &Path) -> &mut Node {
        let mut node = &mut self.root;
        for segment in path.segments() {
            node = node.children.entry(segment.clone()).or_default();
        }
        node
    }

    /// Take the whole tree out, leaving an empty one behind
    pub fn take_root(&mut self) -> Node {
        std::mem::take(&mut self.root)
    }
}
