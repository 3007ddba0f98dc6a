//! Dependency Sets
//!
//! Every reactive handle owns a [`Dependencies`] registry mapping each key
//! that has been read under tracking to the set of subscribers that read it.
//! Every subscriber owns a [`Sources`] list naming the `(registry, key)`
//! pairs it is registered in, so it can remove itself before a re-run.
//!
//! The two sides are kept consistent by [`Runtime::track`] (adds to both)
//! and [`Sources::clear`] (removes from both). [`Dependencies::take`]
//! empties one key without touching the subscribers' source lists; a stale
//! entry there is harmless because unsubscribing from a missing key is a
//! no-op.
//!
//! [`Runtime::track`]: crate::reactive::Runtime

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::reactive::{Reactive, SubscriberId};

/// The part of a handle a subscriber depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// A named property of an object.
    Key(String),
    /// One slot of an array.
    Index(usize),
    /// The shape of a container: an object's key set, an array's length
    /// and element order.
    Structure,
    /// The cached result of a memo.
    Value,
}

/// Subscribers registered on one `(handle, key)` pair, in registration order.
#[derive(Default)]
pub struct DependencySet {
    subscribers: IndexMap<SubscriberId, Arc<dyn Reactive>>,
}

impl DependencySet {
    /// Number of subscribers in the set.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether the set has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub(crate) fn into_subscribers(self) -> impl Iterator<Item = Arc<dyn Reactive>> {
        self.subscribers.into_values()
    }
}

/// Per-handle registry of dependency sets.
#[derive(Default)]
pub struct Dependencies {
    sets: Mutex<HashMap<DepKey, DependencySet>>,
}

impl Dependencies {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add `subscriber` to the set for `key`.
    ///
    /// Returns `false` if it was already there.
    pub(crate) fn subscribe(&self, key: DepKey, subscriber: Arc<dyn Reactive>) -> bool {
        let id = subscriber.subscriber_id();
        let mut sets = self.sets.lock();
        let set = sets.entry(key).or_default();
        if set.subscribers.contains_key(&id) {
            return false;
        }
        set.subscribers.insert(id, subscriber);
        true
    }

    /// Remove one subscriber from the set for `key`.
    pub(crate) fn unsubscribe(&self, key: &DepKey, id: SubscriberId) {
        let mut sets = self.sets.lock();
        if let Some(set) = sets.get_mut(key) {
            set.subscribers.shift_remove(&id);
            if set.subscribers.is_empty() {
                sets.remove(key);
            }
        }
    }

    /// Remove and return the whole set for `key`.
    pub(crate) fn take(&self, key: &DepKey) -> Option<DependencySet> {
        self.sets.lock().remove(key)
    }

    /// Number of subscribers currently registered for `key`.
    pub fn subscriber_count(&self, key: &DepKey) -> usize {
        self.sets.lock().get(key).map(DependencySet::len).unwrap_or(0)
    }

    /// Number of keys with at least one subscriber.
    pub fn tracked_keys(&self) -> usize {
        self.sets.lock().len()
    }
}

/// One entry of a subscriber's read-set.
struct Source {
    dependencies: Weak<Dependencies>,
    key: DepKey,
}

/// The read-set of a subscriber: every `(registry, key)` it is registered in.
#[derive(Default)]
pub struct Sources {
    entries: Mutex<SmallVec<[Source; 4]>>,
}

impl Sources {
    pub(crate) fn push(&self, dependencies: &Arc<Dependencies>, key: DepKey) {
        self.entries.lock().push(Source {
            dependencies: Arc::downgrade(dependencies),
            key,
        });
    }

    /// Unregister `id` from every set it was added to and forget them.
    pub(crate) fn clear(&self, id: SubscriberId) {
        let entries = std::mem::take(&mut *self.entries.lock());
        for source in entries {
            if let Some(dependencies) = source.dependencies.upgrade() {
                dependencies.unsubscribe(&source.key, id);
            }
        }
    }

    /// Number of `(registry, key)` pairs recorded since the last clear.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Runtime;

    struct Probe {
        id: SubscriberId,
        sources: Sources,
    }

    impl Reactive for Probe {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn sources(&self) -> &Sources {
            &self.sources
        }

        fn notify(self: Arc<Self>, _runtime: &Runtime) {}

        fn run(self: Arc<Self>, _runtime: &Runtime) {}
    }

    fn probe() -> Arc<Probe> {
        Arc::new(Probe {
            id: SubscriberId::new(),
            sources: Sources::default(),
        })
    }

    #[test]
    fn subscribe_deduplicates() {
        let deps = Dependencies::new();
        let p = probe();

        assert!(deps.subscribe(DepKey::Key("a".into()), p.clone()));
        assert!(!deps.subscribe(DepKey::Key("a".into()), p.clone()));
        assert_eq!(deps.subscriber_count(&DepKey::Key("a".into())), 1);
    }

    #[test]
    fn take_empties_the_key() {
        let deps = Dependencies::new();
        deps.subscribe(DepKey::Index(0), probe());
        deps.subscribe(DepKey::Index(0), probe());

        let set = deps.take(&DepKey::Index(0)).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(deps.subscriber_count(&DepKey::Index(0)), 0);
        assert!(deps.take(&DepKey::Index(0)).is_none());
    }

    #[test]
    fn clearing_sources_unsubscribes_everywhere() {
        let a = Dependencies::new();
        let b = Dependencies::new();
        let p = probe();

        for (deps, key) in [(&a, DepKey::Structure), (&b, DepKey::Key("x".into()))] {
            deps.subscribe(key.clone(), p.clone());
            p.sources.push(deps, key);
        }
        assert_eq!(p.sources.len(), 2);

        p.sources.clear(p.id);
        assert!(p.sources.is_empty());
        assert_eq!(a.tracked_keys(), 0);
        assert_eq!(b.tracked_keys(), 0);
    }
}
