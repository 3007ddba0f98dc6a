//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! When a handle is read, the computation on top of the stack is registered
//! as a dependent.
//!
//! # Implementation
//!
//! Each [`Runtime`] owns its own context stack. Entering a computation
//! pushes it; the returned guard pops it on drop, so the stack stays
//! balanced even if the computation panics. An untracked entry (`None`)
//! masks the computations below it, which is how [`Runtime::untrack`] works.
//!
//! Nested contexts are supported: a memo read inside an effect pushes the
//! memo on top of the effect for the duration of its recompute.

use std::sync::Arc;

use super::{Reactive, Runtime, SubscriberId};

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    runtime: Runtime,
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a tracking context for `node`.
    ///
    /// While the guard lives, reads register `node` as a dependent.
    pub(crate) fn enter(runtime: &Runtime, node: Arc<dyn Reactive>) -> Self {
        let subscriber_id = Some(node.subscriber_id());
        runtime.context_stack().lock().push(Some(node));
        Self {
            runtime: runtime.clone(),
            subscriber_id,
        }
    }

    /// Enter an untracked section. Reads inside it register nothing.
    pub fn untracked(runtime: &Runtime) -> Self {
        runtime.context_stack().lock().push(None);
        Self {
            runtime: runtime.clone(),
            subscriber_id: None,
        }
    }

    /// Check if a tracking computation is active.
    pub fn is_active(runtime: &Runtime) -> bool {
        matches!(runtime.context_stack().lock().last(), Some(Some(_)))
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber(runtime: &Runtime) -> Option<SubscriberId> {
        runtime
            .context_stack()
            .lock()
            .last()
            .and_then(|entry| entry.as_ref().map(|node| node.subscriber_id()))
    }

    /// The node reads should currently be attributed to.
    pub(crate) fn current(runtime: &Runtime) -> Option<Arc<dyn Reactive>> {
        runtime.context_stack().lock().last().cloned().flatten()
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = self.runtime.context_stack().lock().pop();

        // Catch mismatched enter/exit pairs in debug builds.
        if let Some(entry) = popped {
            let popped_id = entry.as_ref().map(|node| node.subscriber_id());
            debug_assert_eq!(
                popped_id, self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id, popped_id
            );
        }
    }
}
