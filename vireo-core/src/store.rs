//! Store
//!
//! A [`Store`] is a reactive object plus an ordered list of subscribers.
//! Subscribers are called once when they subscribe and again after every
//! flush in which anything inside the state changed.
//!
//! # Change detection
//!
//! The store owns a watcher effect that serializes the whole state on each
//! run. Serialization goes through the tracked accessors, so the watcher
//! depends on every key at every depth and is queued by any write.
//!
//! # Re-entrancy
//!
//! A notification pass never nests inside another:
//!
//! - `notify()` during a pass only records that another pass is wanted; the
//!   watcher is queued again when the current pass ends.
//! - state written by a subscriber queues the watcher like any other write,
//!   so the next flush round delivers it.
//! - a subscription cancelled during a pass receives nothing further, even
//!   later in the same pass.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::ReactiveError;
use crate::reactive::{Effect, ReactiveObject, Runtime};

type Callback = Box<dyn FnMut(&ReactiveObject) + Send>;

struct Entry {
    id: u64,
    active: AtomicBool,
    callback: Mutex<Callback>,
}

struct StoreInner {
    runtime: Runtime,
    state: ReactiveObject,
    subscribers: Mutex<Vec<Arc<Entry>>>,
    next_id: AtomicU64,
    notifying: AtomicBool,
    pending: AtomicBool,
    watcher: Mutex<Option<Effect>>,
}

/// Clears the `notifying` flag even if a subscriber panics.
struct NotifyGuard<'a>(&'a AtomicBool);

impl Drop for NotifyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl StoreInner {
    fn notify(&self) {
        if self.notifying.swap(true, Ordering::SeqCst) {
            self.pending.store(true, Ordering::SeqCst);
            return;
        }

        {
            let _guard = NotifyGuard(&self.notifying);
            let entries: Vec<Arc<Entry>> = self.subscribers.lock().clone();
            trace!(subscribers = entries.len(), "store notify");

            self.runtime.untrack(|| {
                for entry in entries {
                    if !entry.active.load(Ordering::SeqCst) {
                        continue;
                    }
                    // A callback already running further up the stack is
                    // skipped; the pending pass covers it.
                    if let Some(mut callback) = entry.callback.try_lock() {
                        callback(&self.state);
                    }
                }
            });
        }

        if self.pending.swap(false, Ordering::SeqCst) {
            let watcher = self.watcher.lock().clone();
            if let Some(watcher) = watcher {
                watcher.schedule();
            }
        }
    }

    fn remove(&self, id: u64) {
        self.subscribers.lock().retain(|entry| entry.id != id);
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.get_mut().take() {
            watcher.dispose();
        }
    }
}

/// A reactive object with subscribers.
///
/// Clones share the same store. The watcher is disposed when the last
/// clone is dropped.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create a store over `initial`, which must be a JSON object.
    pub fn new(runtime: &Runtime, initial: serde_json::Value) -> Result<Self, ReactiveError> {
        let state = runtime.wrap_object(initial)?;
        Ok(Self::from_object(state))
    }

    /// Create a store over an existing reactive object.
    pub fn from_object(state: ReactiveObject) -> Self {
        let runtime = state.runtime().clone();
        let inner = Arc::new(StoreInner {
            runtime: runtime.clone(),
            state: state.clone(),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            notifying: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            watcher: Mutex::new(None),
        });

        let weak: Weak<StoreInner> = Arc::downgrade(&inner);
        let mut primed = false;
        let watcher = runtime.create_effect(move || {
            // Deep read: every key at every depth becomes a dependency.
            let _ = serde_json::to_value(&state);
            if !primed {
                primed = true;
                return;
            }
            if let Some(inner) = weak.upgrade() {
                inner.notify();
            }
        });
        *inner.watcher.lock() = Some(watcher);

        Self { inner }
    }

    /// The store's state. Writes to it reach subscribers on the next flush.
    pub fn state(&self) -> &ReactiveObject {
        &self.inner.state
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Register `callback`, call it once with the current state, and keep
    /// calling it after every change until the subscription is cancelled.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&ReactiveObject) + Send + 'static,
    {
        let entry = Arc::new(Entry {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            active: AtomicBool::new(true),
            callback: Mutex::new(Box::new(callback)),
        });
        self.inner.subscribers.lock().push(entry.clone());
        debug!(subscriber = entry.id, "store subscribe");

        self.inner.runtime.untrack(|| {
            if let Some(mut callback) = entry.callback.try_lock() {
                callback(&self.inner.state);
            }
        });

        Subscription {
            store: Arc::downgrade(&self.inner),
            entry,
        }
    }

    /// Shallow replace: keys missing from `next` are removed, the rest are
    /// assigned.
    pub fn set(&self, next: serde_json::Value) -> Result<(), ReactiveError> {
        let serde_json::Value::Object(map) = next else {
            return Err(ReactiveError::NotAnObject);
        };
        let state = &self.inner.state;

        let stale: Vec<String> = self
            .inner
            .runtime
            .untrack(|| state.keys())
            .into_iter()
            .filter(|key| !map.contains_key(key))
            .collect();
        for key in stale {
            state.remove(&key);
        }
        for (key, value) in map {
            state.set(key, value);
        }
        Ok(())
    }

    /// Apply the patch returned by `f` with shallow assignment.
    pub fn update<F>(&self, f: F) -> Result<(), ReactiveError>
    where
        F: FnOnce(&ReactiveObject) -> serde_json::Value,
    {
        let patch = self.inner.runtime.untrack(|| f(&self.inner.state));
        let serde_json::Value::Object(map) = patch else {
            return Err(ReactiveError::NotAnObject);
        };
        for (key, value) in map {
            self.inner.state.set(key, value);
        }
        Ok(())
    }

    /// Deliver the current state to every subscriber now.
    pub fn notify(&self) {
        self.inner.notify();
    }

    /// Untracked JSON copy of the state.
    pub fn snapshot(&self) -> serde_json::Value {
        self.inner.state.to_json()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.inner.state)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// A handle to a store subscription. When dropped, the subscription is
/// cancelled.
#[must_use]
pub struct Subscription {
    store: Weak<StoreInner>,
    entry: Arc<Entry>,
}

impl Subscription {
    /// Stop receiving notifications. Calling it again does nothing.
    pub fn unsubscribe(&self) {
        if !self.entry.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(store) = self.store.upgrade() {
            store.remove(self.entry.id);
        }
        debug!(subscriber = self.entry.id, "store unsubscribe");
    }

    pub fn is_active(&self) -> bool {
        self.entry.active.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.entry.id)
            .field("active", &self.is_active())
            .finish()
    }
}
