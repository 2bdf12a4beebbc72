//! Provider lifecycle and interception tests for the data bus

use lattice_bus::{DataBus, Provider, PublishContext};
use lattice_value::{Path, Value};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Provider that counts its lifecycle transitions
struct CountingProvider {
    path: Path,
    activations: Arc<AtomicU32>,
    deactivations: Arc<AtomicU32>,
}

impl CountingProvider {
    fn new(path: &str) -> (Arc<Self>, Arc<AtomicU32>, Arc<AtomicU32>) {
        let activations = Arc::new(AtomicU32::new(0));
        let deactivations = Arc::new(AtomicU32::new(0));
        let provider = Arc::new(Self {
            path: Path::from(path),
            activations: Arc::clone(&activations),
            deactivations: Arc::clone(&deactivations),
        });
        (provider, activations, deactivations)
    }
}

impl Provider for CountingProvider {
    fn path(&self) -> &Path {
        &self.path
    }

    fn on_activate(&self) {
        self.activations.fetch_add(1, Ordering::SeqCst);
    }

    fn on_deactivate(&self) {
        self.deactivations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Provider that appends a tag to string values and records what it saw
struct TagProvider {
    path: Path,
    tag: &'static str,
    observed: Arc<Mutex<Vec<(Option<Value>, Value)>>>,
}

impl TagProvider {
    fn new(path: &str, tag: &'static str) -> (Arc<Self>, Arc<Mutex<Vec<(Option<Value>, Value)>>>) {
        let observed = Arc::new(Mutex::new(Vec::new()));
        let provider = Arc::new(Self {
            path: Path::from(path),
            tag,
            observed: Arc::clone(&observed),
        });
        (provider, observed)
    }
}

impl Provider for TagProvider {
    fn path(&self) -> &Path {
        &self.path
    }

    fn on_publish(&self, ctx: &PublishContext) -> Option<Value> {
        self.observed
            .lock()
            .push((ctx.old_value.clone(), ctx.value.clone()));
        let tagged = format!("{}{}", ctx.value.as_str().unwrap_or(""), self.tag);
        Some(Value::from(tagged))
    }
}

#[test]
fn activation_fires_once_per_zero_to_one_transition() {
    init_logs();
    let bus = DataBus::new();
    let (provider, activations, deactivations) = CountingProvider::new("feed");
    bus.add_provider(provider).unwrap();

    let path = Path::from("feed");
    let sub1 = bus.subscribe(&path, |_| {}).unwrap();
    let sub2 = bus.subscribe(&path, |_| {}).unwrap();
    let sub3 = bus.subscribe(&path, |_| {}).unwrap();

    // three subscribers, one activation
    assert_eq!(activations.load(Ordering::SeqCst), 1);

    sub1.dispose();
    sub2.dispose();
    // still one live subscription: provider stays active
    assert_eq!(deactivations.load(Ordering::SeqCst), 0);

    sub3.dispose();
    assert_eq!(deactivations.load(Ordering::SeqCst), 1);

    // a fresh subscription re-activates
    let sub4 = bus.subscribe(&path, |_| {}).unwrap();
    assert_eq!(activations.load(Ordering::SeqCst), 2);
    sub4.dispose();
    assert_eq!(deactivations.load(Ordering::SeqCst), 2);
}

#[test]
fn all_providers_at_a_path_share_the_activation_signal() {
    let bus = DataBus::new();
    let (first, first_activations, _) = CountingProvider::new("shared");
    let (second, second_activations, _) = CountingProvider::new("shared");
    bus.add_provider(first).unwrap();
    bus.add_provider(second).unwrap();

    let _sub = bus.subscribe(&Path::from("shared"), |_| {}).unwrap();

    assert_eq!(first_activations.load(Ordering::SeqCst), 1);
    assert_eq!(second_activations.load(Ordering::SeqCst), 1);
}

#[test]
fn provider_registered_under_live_subscribers_activates_immediately() {
    let bus = DataBus::new();
    let path = Path::from("late");
    let _sub = bus.subscribe(&path, |_| {}).unwrap();

    let (provider, activations, deactivations) = CountingProvider::new("late");
    bus.add_provider(provider).unwrap();
    assert_eq!(activations.load(Ordering::SeqCst), 1);

    bus.dispose();
    assert_eq!(deactivations.load(Ordering::SeqCst), 1);
}

#[test]
fn on_publish_chains_in_registration_order() {
    let bus = DataBus::new();
    let (a, a_seen) = TagProvider::new("doc", "A");
    let (b, b_seen) = TagProvider::new("doc", "B");
    bus.add_provider(a).unwrap();
    bus.add_provider(b).unwrap();

    let path = Path::from("doc");
    bus.publish(&path, Value::from("old")).unwrap();
    a_seen.lock().clear();
    b_seen.lock().clear();

    bus.publish(&path, Value::from("v")).unwrap();

    // A transformed before B observed; final stored value is B's output
    assert_eq!(bus.get_data(&path), Some(Value::from("vAB")));
    assert_eq!(b_seen.lock()[0].1, Value::from("vA"));

    // both saw the same pre-publish old value, not the chain input
    assert_eq!(a_seen.lock()[0].0, Some(Value::from("oldAB")));
    assert_eq!(b_seen.lock()[0].0, Some(Value::from("oldAB")));
}

#[test]
fn provider_without_transform_leaves_value_unchanged() {
    struct Passive {
        path: Path,
    }
    impl Provider for Passive {
        fn path(&self) -> &Path {
            &self.path
        }
        // default on_publish: None, meaning "no transformation"
    }

    let bus = DataBus::new();
    bus.add_provider(Arc::new(Passive {
        path: Path::from("raw"),
    }))
    .unwrap();

    bus.publish(&Path::from("raw"), Value::from(42)).unwrap();
    assert_eq!(bus.get_data(&Path::from("raw")), Some(Value::from(42)));
    assert_eq!(bus.stats().values_transformed, 0);
}

#[test]
fn providers_only_intercept_their_exact_path() {
    let bus = DataBus::new();
    let (provider, seen) = TagProvider::new("a", "X");
    bus.add_provider(provider).unwrap();

    bus.publish(&Path::from("a/b"), Value::from("child")).unwrap();
    assert!(seen.lock().is_empty());
    assert_eq!(bus.get_data(&Path::from("a/b")), Some(Value::from("child")));
}

#[test]
fn subscribers_receive_the_provider_transformed_value() {
    let bus = DataBus::new();
    let (provider, _) = TagProvider::new("doc", "!");
    bus.add_provider(provider).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let _sub = bus
        .subscribe(&Path::from("doc"), move |value: &Value| {
            seen_clone.lock().push(value.clone());
        })
        .unwrap();

    bus.publish(&Path::from("doc"), Value::from("hi")).unwrap();
    assert_eq!(seen.lock().as_slice(), &[Value::from("hi!")]);
}

#[test]
fn dispose_deactivates_every_active_provider_exactly_once() {
    let bus = DataBus::new();
    let (p1, _, d1) = CountingProvider::new("a");
    let (p2, _, d2) = CountingProvider::new("a/b");
    let (p3, _, d3) = CountingProvider::new("z");
    bus.add_provider(p1).unwrap();
    bus.add_provider(p2).unwrap();
    bus.add_provider(p3).unwrap();

    let _s1 = bus.subscribe(&Path::from("a"), |_| {}).unwrap();
    let _s2 = bus.subscribe(&Path::from("a/b"), |_| {}).unwrap();
    // "z" has no subscribers: its provider never activated

    bus.dispose();
    bus.dispose(); // second call is a no-op

    assert_eq!(d1.load(Ordering::SeqCst), 1);
    assert_eq!(d2.load(Ordering::SeqCst), 1);
    assert_eq!(d3.load(Ordering::SeqCst), 0);
    assert_eq!(bus.stats().providers_deactivated, 2);
}

#[test]
fn subscription_dispose_after_bus_dispose_is_a_noop() {
    let bus = DataBus::new();
    let (provider, _, deactivations) = CountingProvider::new("x");
    bus.add_provider(provider).unwrap();
    let sub = bus.subscribe(&Path::from("x"), |_| {}).unwrap();

    bus.dispose();
    assert_eq!(deactivations.load(Ordering::SeqCst), 1);

    sub.dispose();
    // no double deactivation
    assert_eq!(deactivations.load(Ordering::SeqCst), 1);
}

#[test]
fn disposed_bus_rejects_provider_registration() {
    let bus = DataBus::new();
    bus.dispose();

    let (provider, _, _) = CountingProvider::new("x");
    assert!(bus.add_provider(provider).is_err());
}

#[test]
fn stats_track_bus_activity() {
    let bus = DataBus::new();
    let path = Path::from("s");
    let _sub = bus.subscribe(&path, |_| {}).unwrap();

    bus.publish(&path, Value::from(1)).unwrap();
    bus.publish(&path, Value::from(2)).unwrap();

    let stats = bus.stats();
    assert_eq!(stats.publishes, 2);
    assert_eq!(stats.notifications_delivered, 2);
    assert_eq!(stats.subscriptions_created, 1);
}
