//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued on the runtime's
//!    scheduler. It never runs inline with the write.
//!
//! 3. Before re-running, the effect runs its cleanups and unregisters from
//!    every dependency set it was in, then tracks new ones during execution.
//!    A branch that stops reading a key is no longer woken by it.
//!
//! # Lifetime
//!
//! Dependency sets hold the effect strongly, so dropping the last `Effect`
//! handle does not stop it. Call [`Effect::dispose`] for that.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::graph::Sources;

use super::context::ReactiveContext;
use super::subscriber::{Cleanup, Reactive, SubscriberId};
use super::Runtime;

struct EffectInner {
    id: SubscriberId,
    runtime: Runtime,
    func: Mutex<Box<dyn FnMut() + Send>>,
    sources: Sources,
    disposed: AtomicBool,
    cleanups: Mutex<Vec<Cleanup>>,
    run_count: AtomicUsize,
}

impl EffectInner {
    fn run_cleanups(&self) {
        let cleanups = std::mem::take(&mut *self.cleanups.lock());
        if cleanups.is_empty() {
            return;
        }
        let _untracked = ReactiveContext::untracked(&self.runtime);
        for cleanup in cleanups {
            cleanup();
        }
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn sources(&self) -> &Sources {
        &self.sources
    }

    fn notify(self: Arc<Self>, runtime: &Runtime) {
        runtime.enqueue(self);
    }

    fn run(self: Arc<Self>, runtime: &Runtime) {
        if self.is_disposed() {
            return;
        }
        self.run_cleanups();
        self.sources.clear(self.id);

        let _ctx = ReactiveContext::enter(runtime, self.clone());
        // An effect that re-enters itself (e.g. flushing from its own body)
        // keeps the outer run.
        let Some(mut func) = self.func.try_lock() else {
            return;
        };
        func();
        self.run_count.fetch_add(1, Ordering::Relaxed);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn add_cleanup(&self, cleanup: Cleanup) -> bool {
        if self.is_disposed() {
            return false;
        }
        self.cleanups.lock().push(cleanup);
        true
    }
}

/// A side-effecting computation that re-runs when its dependencies change.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use vireo_core::Runtime;
///
/// let runtime = Runtime::new();
/// let state = runtime.wrap_object(json!({ "count": 0 })).unwrap();
///
/// let s = state.clone();
/// let effect = runtime.create_effect(move || {
///     println!("count is {:?}", s.get("count"));
/// });
///
/// state.set("count", 5);
/// runtime.flush().unwrap(); // the effect runs again
/// effect.dispose();
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create an effect and run it once.
    pub(crate) fn new<F>(runtime: &Runtime, f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let inner = Arc::new(EffectInner {
            id: SubscriberId::new(),
            runtime: runtime.clone(),
            func: Mutex::new(Box::new(f)),
            sources: Sources::default(),
            disposed: AtomicBool::new(false),
            cleanups: Mutex::new(Vec::new()),
            run_count: AtomicUsize::new(0),
        });
        debug!(effect = inner.id.raw(), "effect created");

        inner.clone().run(runtime);
        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Stop the effect for good.
    ///
    /// Unregisters it from every dependency set and runs its cleanups. A
    /// flush that already queued it skips it.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.sources.clear(self.inner.id);
        self.inner.run_cleanups();
        debug!(effect = self.inner.id.raw(), "effect disposed");
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Queue the effect for the next flush even though nothing changed.
    pub fn schedule(&self) {
        if !self.is_disposed() {
            self.inner.runtime.enqueue(self.inner.clone());
        }
    }

    /// Number of completed runs, including the initial one.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::Relaxed)
    }

    /// Number of `(handle, key)` pairs read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.sources.len()
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::FlushStats;
    use serde_json::json;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let runtime = Runtime::new();
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = runtime.create_effect(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn writes_queue_instead_of_running_inline() {
        let runtime = Runtime::new();
        let state = runtime.wrap_object(json!({ "n": 0 })).unwrap();

        let s = state.clone();
        let effect = runtime.create_effect(move || {
            s.get("n");
        });

        state.set("n", 1);
        state.set("n", 2);
        assert_eq!(effect.run_count(), 1);
        assert_eq!(runtime.pending_effects(), 1);

        let stats = runtime.flush().unwrap();
        assert_eq!(stats.rounds, 1);
        assert_eq!(stats.effects_run, 1);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn schedule_forces_a_rerun() {
        let runtime = Runtime::new();
        let effect = runtime.create_effect(|| {});

        effect.schedule();
        effect.schedule();
        runtime.flush().unwrap();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let runtime = Runtime::new();
        let state = runtime.wrap_object(json!({ "n": 0 })).unwrap();

        let s = state.clone();
        let effect = runtime.create_effect(move || {
            s.get("n");
        });

        state.set("n", 1);
        effect.dispose();
        assert!(effect.is_disposed());

        runtime.flush().unwrap();
        assert_eq!(effect.run_count(), 1);

        effect.schedule();
        assert_eq!(runtime.pending_effects(), 0);
    }

    #[test]
    fn effect_disposed_earlier_in_the_same_round_is_skipped() {
        let runtime = Runtime::new();
        let state = runtime.wrap_object(json!({ "n": 0 })).unwrap();
        let victim: Arc<Mutex<Option<Effect>>> = Default::default();

        let s = state.clone();
        let slot = victim.clone();
        let _disposer = runtime.create_effect(move || {
            let n = s.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
            if n == 1 {
                if let Some(effect) = slot.lock().as_ref() {
                    effect.dispose();
                }
            }
        });

        let s = state.clone();
        let later = runtime.create_effect(move || {
            s.get("n");
        });
        *victim.lock() = Some(later.clone());

        state.set("n", 1);
        assert_eq!(runtime.pending_effects(), 2);

        let stats = runtime.flush().unwrap();
        assert_eq!(stats, FlushStats { rounds: 1, effects_run: 1 });
        assert!(later.is_disposed());
        assert_eq!(later.run_count(), 1);
    }

    #[test]
    fn cleanups_run_before_rerun_and_on_dispose() {
        let runtime = Runtime::new();
        let state = runtime.wrap_object(json!({ "n": 0 })).unwrap();
        let cleaned = Arc::new(AtomicI32::new(0));

        let s = state.clone();
        let rt = runtime.clone();
        let c = cleaned.clone();
        let effect = runtime.create_effect(move || {
            s.get("n");
            let c = c.clone();
            assert!(rt.on_cleanup(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        });
        assert_eq!(cleaned.load(Ordering::SeqCst), 0);

        state.set("n", 1);
        runtime.flush().unwrap();
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);

        effect.dispose();
        assert_eq!(cleaned.load(Ordering::SeqCst), 2);

        effect.dispose();
        assert_eq!(cleaned.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clone_shares_state() {
        let runtime = Runtime::new();
        let effect1 = runtime.create_effect(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.subscriber_id(), effect2.subscriber_id());

        effect1.schedule();
        runtime.flush().unwrap();
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }
}
