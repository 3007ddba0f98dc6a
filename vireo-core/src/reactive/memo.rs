//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation inside its own
//!    tracking context and caches the result.
//!
//! 2. When accessed again, if no dependency has changed, it returns the
//!    cached value.
//!
//! 3. When a dependency changes, the memo is marked dirty and the trigger is
//!    forwarded to whoever read the memo. Nothing is recomputed yet.
//!
//! 4. On next access, a dirty memo recomputes.
//!
//! A memo that is never read again stays dirty and costs nothing. Readers
//! of a memo depend on its `DepKey::Value` key, exactly as they would on a
//! property of an object.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::graph::{DepKey, Dependencies, Sources};

use super::context::ReactiveContext;
use super::subscriber::{Reactive, SubscriberId};
use super::Runtime;

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// The memo needs to recompute on next access.
    Dirty,
}

struct MemoInner<T> {
    id: SubscriberId,
    runtime: Runtime,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    value: RwLock<Option<T>>,
    state: Mutex<MemoState>,
    sources: Sources,
    dependents: Arc<Dependencies>,
    compute_count: AtomicUsize,
}

impl<T> Reactive for MemoInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn sources(&self) -> &Sources {
        &self.sources
    }

    fn notify(self: Arc<Self>, runtime: &Runtime) {
        let was_clean = {
            let mut state = self.state.lock();
            std::mem::replace(&mut *state, MemoState::Dirty) == MemoState::Clean
        };
        if was_clean {
            runtime.trigger(&self.dependents, &DepKey::Value);
        }
    }

    // Memos are pulled, never queued.
    fn run(self: Arc<Self>, _runtime: &Runtime) {}
}

/// A cached derived value that recomputes only when dependencies change.
pub struct Memo<T> {
    inner: Arc<MemoInner<T>>,
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a memo. The computation runs on first access.
    pub(crate) fn new<F>(runtime: &Runtime, compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(MemoInner {
                id: SubscriberId::new(),
                runtime: runtime.clone(),
                compute: Box::new(compute),
                value: RwLock::new(None),
                state: Mutex::new(MemoState::Dirty),
                sources: Sources::default(),
                dependents: Dependencies::new(),
                compute_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Get the subscriber ID for this memo.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// Inside an effect (or another memo) this registers the reader.
    pub fn get(&self) -> T {
        let inner = &self.inner;
        inner.runtime.track(&inner.dependents, DepKey::Value);

        if *inner.state.lock() == MemoState::Clean {
            if let Some(value) = inner.value.read().as_ref() {
                return value.clone();
            }
        }
        self.recompute()
    }

    /// The cached value, without recomputing or tracking.
    pub fn peek(&self) -> Option<T> {
        self.inner.value.read().clone()
    }

    /// Force a recompute on next access and notify readers.
    pub fn mark_dirty(&self) {
        self.inner.clone().notify(&self.inner.runtime);
    }

    fn recompute(&self) -> T {
        let inner = &self.inner;
        inner.sources.clear(inner.id);

        // Clean before computing, so a dependency written during the
        // computation dirties it again.
        *inner.state.lock() = MemoState::Clean;
        let value = {
            let _ctx = ReactiveContext::enter(&inner.runtime, inner.clone());
            (inner.compute)()
        };
        inner.compute_count.fetch_add(1, Ordering::Relaxed);
        *inner.value.write() = Some(value.clone());
        value
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        *self.inner.state.lock()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Number of times the computation has run.
    pub fn compute_count(&self) -> usize {
        self.inner.compute_count.load(Ordering::Relaxed)
    }

    /// Number of subscribers currently reading this memo.
    pub fn dependent_count(&self) -> usize {
        self.inner.dependents.subscriber_count(&DepKey::Value)
    }
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Memo<T>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("value", &self.peek())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
