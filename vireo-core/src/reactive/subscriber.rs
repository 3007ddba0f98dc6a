//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that depends on reactive values:
//! effects, memos, watchers and store change detectors.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::graph::Sources;

use super::Runtime;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. Dependency sets and the
/// scheduler queue are keyed by it, which is what deduplicates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A cleanup callback registered by a running effect.
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// A node in the dependency graph that can be notified of changes.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this node.
    fn subscriber_id(&self) -> SubscriberId;

    /// The read-set recorded during the node's last run.
    fn sources(&self) -> &Sources;

    /// React to a trigger on one of the node's dependencies.
    ///
    /// Eager nodes (effects) queue themselves; lazy nodes (memos) mark
    /// themselves dirty and forward the trigger to their own dependents.
    fn notify(self: Arc<Self>, runtime: &Runtime);

    /// Re-run the node. Called by the flush loop for queued nodes.
    fn run(self: Arc<Self>, runtime: &Runtime);

    /// Whether the node has been disposed and must not run again.
    fn is_disposed(&self) -> bool {
        false
    }

    /// Attach a cleanup to run before the next re-run or on dispose.
    ///
    /// Returns `false` if the node does not accept cleanups.
    fn add_cleanup(&self, _cleanup: Cleanup) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
        assert!(id1.raw() < id2.raw());
    }
}
