//! Reactive Objects
//!
//! A [`ReactiveObject`] is an ordered string-keyed map of [`Value`]s whose
//! reads and writes go through the runtime.
//!
//! - `get`/`contains_key` track the key, whether or not it exists, so a
//!   reader of a missing key hears about it being added.
//! - `keys`/`len`/`entries` track the object's structure.
//! - `set` is a no-op when the new value is same-value-equal to the old.
//!   Adding or removing a key also triggers the structure.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::graph::{DepKey, Dependencies};

use super::value::{IntoReactive, Slot, SlotJson, Value};
use super::Runtime;

struct ObjectInner {
    runtime: Runtime,
    entries: Mutex<IndexMap<String, Slot>>,
    dependencies: Arc<Dependencies>,
}

/// Handle to a reactive object. Clones share the same object.
#[derive(Clone)]
pub struct ReactiveObject {
    inner: Arc<ObjectInner>,
}

impl ReactiveObject {
    /// Create an empty object.
    pub fn new(runtime: &Runtime) -> Self {
        Self::from_entries(runtime, IndexMap::new())
    }

    pub(crate) fn from_map(runtime: &Runtime, map: serde_json::Map<String, serde_json::Value>) -> Self {
        let entries = map
            .into_iter()
            .map(|(key, json)| (key, Slot::from_json(json)))
            .collect();
        Self::from_entries(runtime, entries)
    }

    fn from_entries(runtime: &Runtime, entries: IndexMap<String, Slot>) -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                runtime: runtime.clone(),
                entries: Mutex::new(entries),
                dependencies: Dependencies::new(),
            }),
        }
    }

    /// Read a property.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.track(DepKey::Key(key.to_owned()));
        self.get_untracked(key)
    }

    /// Read a property without registering a dependency.
    pub fn get_untracked(&self, key: &str) -> Option<Value> {
        let runtime = &self.inner.runtime;
        self.inner
            .entries
            .lock()
            .get_mut(key)
            .map(|slot| slot.resolve(runtime))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.track(DepKey::Key(key.to_owned()));
        self.inner.entries.lock().contains_key(key)
    }

    /// Write a property.
    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: IntoReactive,
    {
        let key = key.into();
        let value = value.into_reactive(&self.inner.runtime);

        let added = {
            let mut entries = self.inner.entries.lock();
            match entries.get_mut(&key) {
                Some(Slot::Live(old)) if old.same_value(&value) => return,
                Some(slot) => {
                    *slot = Slot::Live(value);
                    false
                }
                None => {
                    entries.insert(key.clone(), Slot::Live(value));
                    true
                }
            }
        };

        self.trigger(&DepKey::Key(key));
        if added {
            self.trigger(&DepKey::Structure);
        }
    }

    /// Delete a property, returning its value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = {
            let runtime = &self.inner.runtime;
            let mut entries = self.inner.entries.lock();
            entries.shift_remove(key).map(|mut slot| slot.resolve(runtime))
        };
        if removed.is_some() {
            self.trigger(&DepKey::Key(key.to_owned()));
            self.trigger(&DepKey::Structure);
        }
        removed
    }

    /// Property names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.track(DepKey::Structure);
        self.inner.entries.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.track(DepKey::Structure);
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All properties in insertion order. Tracks the structure and every
    /// key visited.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.track(DepKey::Structure);
        let entries: Vec<(String, Value)> = {
            let runtime = &self.inner.runtime;
            let mut map = self.inner.entries.lock();
            map.iter_mut()
                .map(|(key, slot)| (key.clone(), slot.resolve(runtime)))
                .collect()
        };
        for (key, _) in &entries {
            self.track(DepKey::Key(key.clone()));
        }
        entries
    }

    /// Untracked deep snapshot.
    pub fn to_json(&self) -> serde_json::Value {
        let pending: Vec<(String, SlotJson)> = self
            .inner
            .entries
            .lock()
            .iter()
            .map(|(key, slot)| (key.clone(), slot.peek_json()))
            .collect();
        serde_json::Value::Object(
            pending
                .into_iter()
                .map(|(key, json)| (key, json.into_json()))
                .collect(),
        )
    }

    /// Whether two handles point at the same object.
    pub fn ptr_eq(&self, other: &ReactiveObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// The object's dependency registry.
    pub fn dependencies(&self) -> &Arc<Dependencies> {
        &self.inner.dependencies
    }

    fn track(&self, key: DepKey) {
        self.inner.runtime.track(&self.inner.dependencies, key);
    }

    fn trigger(&self, key: &DepKey) {
        self.inner.runtime.trigger(&self.inner.dependencies, key);
    }
}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveObject")
            .field("ptr", &Arc::as_ptr(&self.inner))
            .field("len", &self.inner.entries.lock().len())
            .field("tracked_keys", &self.inner.dependencies.tracked_keys())
            .finish()
    }
}

impl Serialize for ReactiveObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in &entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
