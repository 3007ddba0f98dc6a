//! Reactive Arrays
//!
//! A [`ReactiveArray`] tracks two kinds of dependency:
//!
//! - per-slot (`DepKey::Index`), for readers of one element;
//! - structural (`DepKey::Structure`), for readers of the length or of the
//!   whole sequence.
//!
//! Structural mutations compare every slot before and after. Only slots
//! whose value changed identity are triggered, and the structure is
//! triggered only if the length changed or some slot moved. Sorting an
//! already sorted array therefore notifies nobody.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::error::ReactiveError;
use crate::graph::{DepKey, Dependencies};

use super::value::{IntoReactive, Slot, SlotJson, Value};
use super::Runtime;

struct ArrayInner {
    runtime: Runtime,
    items: Mutex<Vec<Slot>>,
    dependencies: Arc<Dependencies>,
}

/// Handle to a reactive array. Clones share the same array.
#[derive(Clone)]
pub struct ReactiveArray {
    inner: Arc<ArrayInner>,
}

impl ReactiveArray {
    /// Create an empty array.
    pub fn new(runtime: &Runtime) -> Self {
        Self::from_vec(runtime, Vec::new())
    }

    pub(crate) fn from_vec(runtime: &Runtime, items: Vec<serde_json::Value>) -> Self {
        Self {
            inner: Arc::new(ArrayInner {
                runtime: runtime.clone(),
                items: Mutex::new(items.into_iter().map(Slot::from_json).collect()),
                dependencies: Dependencies::new(),
            }),
        }
    }

    /// Read one element.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.track(DepKey::Index(index));
        self.get_untracked(index)
    }

    /// Read one element without registering a dependency.
    pub fn get_untracked(&self, index: usize) -> Option<Value> {
        let runtime = &self.inner.runtime;
        self.inner
            .items
            .lock()
            .get_mut(index)
            .map(|slot| slot.resolve(runtime))
    }

    pub fn len(&self) -> usize {
        self.track(DepKey::Structure);
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All elements. Tracks the structure and every slot.
    pub fn values(&self) -> Vec<Value> {
        self.track(DepKey::Structure);
        let values = self.snapshot();
        for index in 0..values.len() {
            self.track(DepKey::Index(index));
        }
        values
    }

    /// Replace one element. Writing at `len` appends.
    pub fn set<V: IntoReactive>(&self, index: usize, value: V) -> Result<(), ReactiveError> {
        let value = value.into_reactive(&self.inner.runtime);

        let appended = {
            let mut items = self.inner.items.lock();
            let len = items.len();
            match items.get_mut(index) {
                Some(Slot::Live(old)) if old.same_value(&value) => return Ok(()),
                Some(slot) => {
                    *slot = Slot::Live(value);
                    false
                }
                None if index == len => {
                    items.push(Slot::Live(value));
                    true
                }
                None => return Err(ReactiveError::IndexOutOfBounds { index, len }),
            }
        };

        self.trigger(&DepKey::Index(index));
        if appended {
            self.trigger(&DepKey::Structure);
        }
        Ok(())
    }

    pub fn push<V: IntoReactive>(&self, value: V) {
        let value = value.into_reactive(&self.inner.runtime);
        self.mutate(|items| items.push(value));
    }

    pub fn pop(&self) -> Option<Value> {
        self.mutate(Vec::pop)
    }

    /// Insert at `index`, shifting later elements right.
    pub fn insert<V: IntoReactive>(&self, index: usize, value: V) -> Result<(), ReactiveError> {
        let value = value.into_reactive(&self.inner.runtime);
        self.mutate(|items| {
            let len = items.len();
            if index > len {
                return Err(ReactiveError::IndexOutOfBounds { index, len });
            }
            items.insert(index, value);
            Ok(())
        })
    }

    /// Remove at `index`, shifting later elements left.
    pub fn remove(&self, index: usize) -> Option<Value> {
        self.mutate(|items| (index < items.len()).then(|| items.remove(index)))
    }

    pub fn truncate(&self, len: usize) {
        self.mutate(|items| items.truncate(len));
    }

    pub fn clear(&self) {
        self.mutate(Vec::clear);
    }

    pub fn swap(&self, a: usize, b: usize) -> Result<(), ReactiveError> {
        self.mutate(|items| {
            let len = items.len();
            if let Some(index) = [a, b].into_iter().find(|&i| i >= len) {
                return Err(ReactiveError::IndexOutOfBounds { index, len });
            }
            items.swap(a, b);
            Ok(())
        })
    }

    pub fn reverse(&self) {
        self.mutate(|items| items.reverse());
    }

    /// Stable sort. The comparator runs without the array locked and may
    /// read other reactive state.
    pub fn sort_by<F>(&self, compare: F)
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        self.mutate(|items| items.sort_by(compare));
    }

    /// Keep only the elements for which `keep` returns true.
    pub fn retain<F>(&self, mut keep: F)
    where
        F: FnMut(&Value) -> bool,
    {
        self.mutate(|items| items.retain(|value| keep(value)));
    }

    pub fn extend<I, V>(&self, values: I)
    where
        I: IntoIterator<Item = V>,
        V: IntoReactive,
    {
        let runtime = &self.inner.runtime;
        let values: Vec<Value> = values
            .into_iter()
            .map(|value| value.into_reactive(runtime))
            .collect();
        self.mutate(|items| items.extend(values));
    }

    /// Untracked deep snapshot.
    pub fn to_json(&self) -> serde_json::Value {
        let pending: Vec<SlotJson> = self.inner.items.lock().iter().map(Slot::peek_json).collect();
        serde_json::Value::Array(pending.into_iter().map(SlotJson::into_json).collect())
    }

    /// Whether two handles point at the same array.
    pub fn ptr_eq(&self, other: &ReactiveArray) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// The array's dependency registry.
    pub fn dependencies(&self) -> &Arc<Dependencies> {
        &self.inner.dependencies
    }

    /// Every element, with raw containers wrapped in place.
    fn snapshot(&self) -> Vec<Value> {
        let runtime = &self.inner.runtime;
        self.inner
            .items
            .lock()
            .iter_mut()
            .map(|slot| slot.resolve(runtime))
            .collect()
    }

    /// Apply a structural change and trigger whatever it actually changed.
    ///
    /// `f` runs on a copy with the array unlocked.
    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let before = self.snapshot();
        let mut after = before.clone();
        let result = f(&mut after);

        *self.inner.items.lock() = after.iter().cloned().map(Slot::Live).collect();

        let mut structure_changed = before.len() != after.len();
        for index in 0..before.len().max(after.len()) {
            let same = match (before.get(index), after.get(index)) {
                (Some(old), Some(new)) => old.same_value(new),
                _ => false,
            };
            if !same {
                structure_changed = true;
                self.trigger(&DepKey::Index(index));
            }
        }
        if structure_changed {
            self.trigger(&DepKey::Structure);
        }
        result
    }

    fn track(&self, key: DepKey) {
        self.inner.runtime.track(&self.inner.dependencies, key);
    }

    fn trigger(&self, key: &DepKey) {
        self.inner.runtime.trigger(&self.inner.dependencies, key);
    }
}

impl fmt::Debug for ReactiveArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveArray")
            .field("ptr", &Arc::as_ptr(&self.inner))
            .field("len", &self.inner.items.lock().len())
            .field("tracked_keys", &self.inner.dependencies.tracked_keys())
            .finish()
    }
}

impl Serialize for ReactiveArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let values = self.values();
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in &values {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}
