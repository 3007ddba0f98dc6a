//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects handles, memos and
//! effects. There is no global state: every handle and effect remembers the
//! runtime it was created by, and two runtimes never see each other's
//! dependencies.
//!
//! # How It Works
//!
//! 1. Reading a handle inside a running effect calls [`Runtime::track`],
//!    which registers the effect in the handle's dependency set for that key
//!    and records the pair in the effect's read-set.
//!
//! 2. Writing a handle calls [`Runtime::trigger`], which removes the key's
//!    dependency set and notifies each subscriber:
//!    a. effects are queued on the scheduler,
//!    b. memos are marked dirty and forward the trigger to their readers.
//!
//! 3. [`Runtime::flush`] drains the queue. Each effect clears its read-set,
//!    re-runs, and re-registers whatever it reads this time.
//!
//! # Threading
//!
//! All shared state sits behind `parking_lot` locks so a runtime can be
//! moved into an async task, but the model is single-threaded: one thread
//! drives a runtime at a time. No lock is held while user code runs.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::config::RuntimeConfig;
use crate::error::ReactiveError;
use crate::graph::{
    DepKey, Dependencies, FlushScheduler, FlushStats, ManualFlush, UpdateScheduler,
};

use super::context::ReactiveContext;
use super::effect::Effect;
use super::memo::Memo;
use super::subscriber::{Reactive, SubscriberId};
use super::value::{IntoReactive, Value};
use super::ReactiveObject;

struct RuntimeInner {
    config: RuntimeConfig,
    context: Mutex<Vec<Option<Arc<dyn Reactive>>>>,
    scheduler: UpdateScheduler,
}

/// Handle to a reactive runtime.
///
/// Cloning is cheap and yields a handle to the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with default configuration and manual flushing.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration and manual flushing.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_flush_scheduler(config, ManualFlush)
    }

    /// Create a runtime whose flushes are requested through `hook`.
    pub fn with_flush_scheduler<S>(config: RuntimeConfig, hook: S) -> Self
    where
        S: FlushScheduler + 'static,
    {
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                context: Mutex::new(Vec::new()),
                scheduler: UpdateScheduler::new(Box::new(hook)),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Whether two handles point at the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Wrapping
    // ------------------------------------------------------------------

    /// Wrap a value.
    ///
    /// Objects and arrays become reactive handles; primitives and opaque
    /// values pass through. Wrapping a handle returns the same handle.
    pub fn wrap<V: IntoReactive>(&self, value: V) -> Value {
        value.into_reactive(self)
    }

    /// Wrap a JSON object, failing if `json` is anything else.
    pub fn wrap_object(&self, json: serde_json::Value) -> Result<ReactiveObject, ReactiveError> {
        match json {
            serde_json::Value::Object(map) => Ok(ReactiveObject::from_map(self, map)),
            _ => Err(ReactiveError::NotAnObject),
        }
    }

    // ------------------------------------------------------------------
    // Effects
    // ------------------------------------------------------------------

    /// Create an effect. `f` runs once now and again after every flush in
    /// which something it read has changed.
    pub fn create_effect<F>(&self, f: F) -> Effect
    where
        F: FnMut() + Send + 'static,
    {
        Effect::new(self, f)
    }

    /// Create a cached derived value.
    pub fn computed<T, F>(&self, f: F) -> Memo<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Memo::new(self, f)
    }

    /// Call `callback(new, old)` whenever the result of `getter` changes.
    ///
    /// The getter runs tracked; the callback runs untracked.
    pub fn watch<T, G, C>(&self, getter: G, mut callback: C) -> Effect
    where
        T: Clone + PartialEq + Send + 'static,
        G: Fn() -> T + Send + 'static,
        C: FnMut(&T, &T) + Send + 'static,
    {
        self.watch_inner(getter, false, move |new, old| {
            if let Some(old) = old {
                callback(new, old);
            }
        })
    }

    /// Like [`watch`](Self::watch), but also calls `callback(value, None)`
    /// on the first run.
    pub fn watch_immediate<T, G, C>(&self, getter: G, callback: C) -> Effect
    where
        T: Clone + PartialEq + Send + 'static,
        G: Fn() -> T + Send + 'static,
        C: FnMut(&T, Option<&T>) + Send + 'static,
    {
        self.watch_inner(getter, true, callback)
    }

    fn watch_inner<T, G, C>(&self, getter: G, immediate: bool, mut callback: C) -> Effect
    where
        T: Clone + PartialEq + Send + 'static,
        G: Fn() -> T + Send + 'static,
        C: FnMut(&T, Option<&T>) + Send + 'static,
    {
        let runtime = self.clone();
        let mut previous: Option<T> = None;
        let mut first = true;

        self.create_effect(move || {
            let next = getter();

            if first {
                first = false;
                if immediate {
                    runtime.untrack(|| callback(&next, None));
                }
                previous = Some(next);
                return;
            }

            if previous.as_ref() == Some(&next) {
                return;
            }
            let old = previous.replace(next.clone());
            runtime.untrack(|| callback(&next, old.as_ref()));
        })
    }

    /// Register a cleanup on the currently running effect.
    ///
    /// Returns `false` (and drops `f`) when no effect is running.
    pub fn on_cleanup<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match ReactiveContext::current(self) {
            Some(node) => node.add_cleanup(Box::new(f)),
            None => false,
        }
    }

    /// Run `f` without registering any dependencies.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        let _ctx = ReactiveContext::untracked(self);
        f()
    }

    /// Check if we're inside a tracking context.
    pub fn is_tracking(&self) -> bool {
        ReactiveContext::is_active(self)
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber(&self) -> Option<SubscriberId> {
        ReactiveContext::current_subscriber(self)
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Run queued effects until the queue is empty.
    ///
    /// Fails with [`ReactiveError::CycleDetected`] when the configured round
    /// cap is reached; the remaining queue is dropped.
    pub fn flush(&self) -> Result<FlushStats, ReactiveError> {
        self.inner
            .scheduler
            .flush(self, self.inner.config.max_flush_iterations)
    }

    /// Number of effects waiting for the next flush.
    pub fn pending_effects(&self) -> usize {
        self.inner.scheduler.pending()
    }

    /// Whether a flush is currently running.
    pub fn is_flushing(&self) -> bool {
        self.inner.scheduler.is_flushing()
    }

    // ------------------------------------------------------------------
    // Dependency plumbing
    // ------------------------------------------------------------------

    /// Record that the running computation read `key` of the handle owning
    /// `dependencies`. Outside a computation this does nothing.
    pub(crate) fn track(&self, dependencies: &Arc<Dependencies>, key: DepKey) {
        let Some(node) = ReactiveContext::current(self) else {
            return;
        };
        if dependencies.subscribe(key.clone(), node.clone()) {
            trace!(subscriber = node.subscriber_id().raw(), ?key, "tracked");
            node.sources().push(dependencies, key);
        }
    }

    /// Notify everything that depends on `key` of the handle owning
    /// `dependencies`. The key's dependency set is consumed; subscribers
    /// register again when they next run.
    pub(crate) fn trigger(&self, dependencies: &Dependencies, key: &DepKey) {
        let Some(set) = dependencies.take(key) else {
            return;
        };
        trace!(?key, subscribers = set.len(), "triggered");
        for node in set.into_subscribers() {
            if !node.is_disposed() {
                node.notify(self);
            }
        }
    }

    pub(crate) fn enqueue(&self, node: Arc<dyn Reactive>) {
        self.inner.scheduler.enqueue(self, node);
    }

    pub(crate) fn context_stack(&self) -> &Mutex<Vec<Option<Arc<dyn Reactive>>>> {
        &self.inner.context
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("pending_effects", &self.pending_effects())
            .field("flushing", &self.is_flushing())
            .finish()
    }
}
