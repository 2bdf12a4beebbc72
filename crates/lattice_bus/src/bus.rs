//! Data bus - the public publish/subscribe surface
//!
//! The bus orchestrates node-tree traversal, provider interception, and
//! subscriber notification. One mutex guards the whole tree; it is never
//! held while subscriber or provider callbacks run, so re-entrant calls
//! from a callback cannot deadlock - callbacks always observe node state
//! that has already settled, via snapshots taken at notification time.

use crate::node::{NodeTree, ProviderEntry, SubscriberEntry, SubscriberFn};
use crate::provider::{Provider, PublishContext};
use lattice_value::{Path, Value};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;

/// Errors from bus operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The bus has been disposed; publish/subscribe/add_provider are
    /// rejected rather than silently succeeding
    #[error("operation on a disposed bus")]
    Disposed,
}

/// Statistics about bus usage
#[derive(Debug, Clone, Default)]
pub struct BusStats {
    /// Total publish calls that committed a value
    pub publishes: u64,
    /// Subscriber callbacks invoked
    pub notifications_delivered: u64,
    /// Publishes where some provider returned a replacement value
    pub values_transformed: u64,
    /// Provider on_activate hooks fired
    pub providers_activated: u64,
    /// Provider on_deactivate hooks fired
    pub providers_deactivated: u64,
    /// Subscriptions created
    pub subscriptions_created: u64,
    /// Subscriptions disposed (via guard or bus disposal)
    pub subscriptions_disposed: u64,
}

struct BusInner {
    tree: Mutex<NodeTree>,
    disposed: AtomicBool,
    next_subscription_id: AtomicU64,
    stats: Mutex<BusStats>,
}

/// The path-addressable publish/subscribe data bus.
///
/// Cloning a `DataBus` creates a new handle to the same store - both
/// handles see the same tree and share subscribers and providers.
pub struct DataBus {
    inner: Arc<BusInner>,
}

impl Clone for DataBus {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for DataBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataBus")
            .field("disposed", &self.inner.disposed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl DataBus {
    /// Create a new empty bus
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                tree: Mutex::new(NodeTree::new()),
                disposed: AtomicBool::new(false),
                next_subscription_id: AtomicU64::new(1),
                stats: Mutex::new(BusStats::default()),
            }),
        }
    }

    fn ensure_live(&self) -> Result<(), BusError> {
        if self.inner.disposed.load(Ordering::SeqCst) {
            Err(BusError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Publish a value at a path.
    ///
    /// Providers registered at exactly this path get first refusal to
    /// transform the value, chained in registration order; every
    /// provider sees `old_value` fixed from before any of them ran.
    /// After interception the node's value is replaced and all
    /// exact-path subscribers are notified synchronously with the final
    /// value.
    pub fn publish(&self, path: &Path, value: Value) -> Result<(), BusError> {
        self.ensure_live()?;

        // Snapshot the old value and the provider chain under the lock.
        let (old_value, providers) = {
            let mut tree = self.inner.tree.lock();
            let node = tree.node_mut(path);
            let old = node.value.clone();
            let providers: Vec<Arc<dyn Provider>> = node
                .providers
                .iter()
                .map(|entry| Arc::clone(&entry.provider))
                .collect();
            (old, providers)
        };

        // Interception chain runs outside the lock; providers may
        // re-enter the bus.
        let mut current = value;
        let mut transformed = false;
        for provider in &providers {
            let ctx = PublishContext {
                bus: self.clone(),
                path: path.clone(),
                old_value: old_value.clone(),
                value: current.clone(),
            };
            if let Some(replacement) = provider.on_publish(&ctx) {
                current = replacement;
                transformed = true;
            }
        }

        // Commit and snapshot the subscriber list. Disposal may have
        // begun while the chain ran; no new notifications may start.
        let subscribers: Vec<SubscriberFn> = {
            let mut tree = self.inner.tree.lock();
            if self.inner.disposed.load(Ordering::SeqCst) {
                return Err(BusError::Disposed);
            }
            let node = tree.node_mut(path);
            node.value = Some(current.clone());
            node.subscribers
                .iter()
                .map(|entry| Arc::clone(&entry.callback))
                .collect()
        };

        {
            let mut stats = self.inner.stats.lock();
            stats.publishes += 1;
            stats.notifications_delivered += subscribers.len() as u64;
            if transformed {
                stats.values_transformed += 1;
            }
        }

        for callback in &subscribers {
            callback(&current);
        }

        Ok(())
    }

    /// Subscribe to publishes at an exact path.
    ///
    /// The callback is not invoked with any pre-existing value; it only
    /// observes publishes that happen after registration. If this is the
    /// first live subscription at the path, every provider registered
    /// there activates.
    pub fn subscribe(
        &self,
        path: &Path,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Result<Subscription, BusError> {
        self.ensure_live()?;

        let id = self.inner.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        let to_activate: Vec<Arc<dyn Provider>> = {
            let mut tree = self.inner.tree.lock();
            if self.inner.disposed.load(Ordering::SeqCst) {
                return Err(BusError::Disposed);
            }
            let node = tree.node_mut(path);
            node.subscribers.push(SubscriberEntry {
                id,
                callback: Arc::new(callback),
            });
            node.activation_count += 1;
            if node.activation_count == 1 {
                activate_entries(&mut node.providers)
            } else {
                Vec::new()
            }
        };

        {
            let mut stats = self.inner.stats.lock();
            stats.subscriptions_created += 1;
            stats.providers_activated += to_activate.len() as u64;
        }

        // Hooks fire after the lock is released; the transition decision
        // itself was made in one critical section.
        for provider in &to_activate {
            log::debug!("activating provider at '{}'", path);
            provider.on_activate();
        }

        Ok(Subscription {
            inner: Arc::downgrade(&self.inner),
            path: path.clone(),
            id,
            disposed: AtomicBool::new(false),
        })
    }

    /// Pure read of the current value at a path.
    ///
    /// No side effects: no node creation, no provider interaction. After
    /// the bus is disposed this returns `None`.
    pub fn get_data(&self, path: &Path) -> Option<Value> {
        let tree = self.inner.tree.lock();
        tree.find(path).and_then(|node| node.value.clone())
    }

    /// Register a provider at its own path.
    ///
    /// Appended to the node's provider list; registration order is the
    /// `on_publish` chaining order. A provider registered while the path
    /// already has live subscriptions activates immediately.
    pub fn add_provider(&self, provider: Arc<dyn Provider>) -> Result<(), BusError> {
        self.ensure_live()?;

        let activate_now = {
            let mut tree = self.inner.tree.lock();
            if self.inner.disposed.load(Ordering::SeqCst) {
                return Err(BusError::Disposed);
            }
            let path = provider.path().clone();
            let node = tree.node_mut(&path);
            let active = node.activation_count > 0;
            node.providers.push(ProviderEntry {
                provider: Arc::clone(&provider),
                active,
            });
            active
        };

        if activate_now {
            self.inner.stats.lock().providers_activated += 1;
            log::debug!("activating provider at '{}' on registration", provider.path());
            provider.on_activate();
        }

        Ok(())
    }

    /// Dispose the bus.
    ///
    /// Releases all subscriptions and deactivates every currently-active
    /// provider exactly once, in deterministic depth-first order. Only
    /// the first call tears down; afterwards publish/subscribe/
    /// add_provider return [`BusError::Disposed`]. Notifications already
    /// in flight are allowed to complete.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let root = self.inner.tree.lock().take_root();
        let (deactivated, released) = deactivate_tree(root);

        let mut stats = self.inner.stats.lock();
        stats.providers_deactivated += deactivated;
        stats.subscriptions_disposed += released;
    }

    /// Check whether the bus has been disposed
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Current statistics
    pub fn stats(&self) -> BusStats {
        self.inner.stats.lock().clone()
    }
}

impl Default for DataBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Flip every not-yet-active entry and return its provider for firing.
fn activate_entries(entries: &mut [ProviderEntry]) -> Vec<Arc<dyn Provider>> {
    entries
        .iter_mut()
        .filter(|entry| !entry.active)
        .map(|entry| {
            entry.active = true;
            Arc::clone(&entry.provider)
        })
        .collect()
}

/// Depth-first teardown: fire on_deactivate for active providers at each
/// node, then recurse into children in segment order. Returns the number
/// of providers deactivated and subscriptions released.
fn deactivate_tree(node: crate::node::Node) -> (u64, u64) {
    let mut deactivated = 0;
    let mut released = node.subscribers.len() as u64;
    for entry in node.providers {
        if entry.active {
            entry.provider.on_deactivate();
            deactivated += 1;
        }
    }
    for (_segment, child) in node.children {
        let (d, r) = deactivate_tree(child);
        deactivated += d;
        released += r;
    }
    (deactivated, released)
}

/// Disposer for one subscription.
///
/// `dispose` removes exactly this subscription once; repeat calls are
/// no-ops. Dropping the guard without calling `dispose` leaves the
/// subscription live until the bus itself is disposed.
pub struct Subscription {
    inner: Weak<BusInner>,
    path: Path,
    id: u64,
    disposed: AtomicBool,
}

impl Subscription {
    /// The path this subscription listens on
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this subscription has already been disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Remove this subscription. Idempotent: only the first call
    /// removes; it may deactivate the path's providers when it was the
    /// last live subscription there.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        if inner.disposed.load(Ordering::SeqCst) {
            // Bus teardown already released everything.
            return;
        }

        let to_deactivate: Vec<Arc<dyn Provider>> = {
            let mut tree = inner.tree.lock();
            let Some(node) = tree.find_mut(&self.path) else {
                return;
            };
            let before = node.subscribers.len();
            node.subscribers.retain(|entry| entry.id != self.id);
            if node.subscribers.len() == before {
                return;
            }
            node.activation_count = node.activation_count.saturating_sub(1);
            if node.activation_count == 0 {
                deactivate_entries(&mut node.providers)
            } else {
                Vec::new()
            }
        };

        {
            let mut stats = inner.stats.lock();
            stats.subscriptions_disposed += 1;
            stats.providers_deactivated += to_deactivate.len() as u64;
        }

        for provider in &to_deactivate {
            log::debug!("deactivating provider at '{}'", self.path);
            provider.on_deactivate();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

/// Flip every active entry and return its provider for firing.
fn deactivate_entries(entries: &mut [ProviderEntry]) -> Vec<Arc<dyn Provider>> {
    entries
        .iter_mut()
        .filter(|entry| entry.active)
        .map(|entry| {
            entry.active = false;
            Arc::clone(&entry.provider)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_publish_then_get_data() {
        let bus = DataBus::new();
        let path = Path::from("x");
        bus.publish(&path, [("a", Value::from(1))].into_iter().collect())
            .unwrap();

        let value = bus.get_data(&path).unwrap();
        assert_eq!(value.field("a").and_then(|v| v.as_int()), Some(1));
    }

    #[test]
    fn test_subscribe_does_not_replay() {
        let bus = DataBus::new();
        let path = Path::from("x");
        bus.publish(&path, Value::from(1)).unwrap();

        let count = Arc::new(AtomicU32::new(0));
        let count_clone = Arc::clone(&count);
        let _sub = bus
            .subscribe(&path, move |_| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        // no replay on subscribe
        assert_eq!(count.load(Ordering::SeqCst), 0);

        bus.publish(&path, Value::from(2)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscribers_notified_with_new_value() {
        let bus = DataBus::new();
        let path = Path::from("status");
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let _sub = bus
            .subscribe(&path, move |value: &Value| {
                seen_clone.lock().push(value.clone());
            })
            .unwrap();

        bus.publish(&path, Value::from("up")).unwrap();
        bus.publish(&path, Value::from("down")).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].as_str(), Some("up"));
        assert_eq!(seen[1].as_str(), Some("down"));
    }

    #[test]
    fn test_exact_path_only_notification() {
        let bus = DataBus::new();
        let parent_hits = Arc::new(AtomicU32::new(0));
        let child_hits = Arc::new(AtomicU32::new(0));

        let parent_clone = Arc::clone(&parent_hits);
        let _parent = bus
            .subscribe(&Path::from("a"), move |_| {
                parent_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        let child_clone = Arc::clone(&child_hits);
        let _child = bus
            .subscribe(&Path::from("a/b"), move |_| {
                child_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        bus.publish(&Path::from("a/b"), Value::from(1)).unwrap();
        assert_eq!(parent_hits.load(Ordering::SeqCst), 0);
        assert_eq!(child_hits.load(Ordering::SeqCst), 1);

        bus.publish(&Path::from("a"), Value::from(2)).unwrap();
        assert_eq!(parent_hits.load(Ordering::SeqCst), 1);
        assert_eq!(child_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispose_rejects_operations() {
        let bus = DataBus::new();
        bus.dispose();

        assert_eq!(
            bus.publish(&Path::from("x"), Value::from(1)),
            Err(BusError::Disposed)
        );
        assert!(bus.subscribe(&Path::from("x"), |_| {}).is_err());
        assert_eq!(bus.get_data(&Path::from("x")), None);
    }

    #[test]
    fn test_disposer_removes_one_subscription() {
        let bus = DataBus::new();
        let path = Path::from("x");
        let a = Arc::new(AtomicU32::new(0));
        let b = Arc::new(AtomicU32::new(0));

        let a_clone = Arc::clone(&a);
        let sub_a = bus
            .subscribe(&path, move |_| {
                a_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        let b_clone = Arc::clone(&b);
        let _sub_b = bus
            .subscribe(&path, move |_| {
                b_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        bus.publish(&path, Value::from(1)).unwrap();
        sub_a.dispose();
        sub_a.dispose(); // idempotent
        bus.publish(&path, Value::from(2)).unwrap();

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 2);
        assert_eq!(bus.stats().subscriptions_disposed, 1);
    }

    #[test]
    fn test_reentrant_publish_from_subscriber() {
        let bus = DataBus::new();
        let inner_bus = bus.clone();
        let _sub = bus
            .subscribe(&Path::from("ping"), move |value: &Value| {
                if value.as_int() == Some(1) {
                    inner_bus.publish(&Path::from("pong"), Value::from(2)).unwrap();
                }
            })
            .unwrap();

        bus.publish(&Path::from("ping"), Value::from(1)).unwrap();
        assert_eq!(bus.get_data(&Path::from("pong")), Some(Value::from(2)));
    }
}
