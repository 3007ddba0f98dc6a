//! Update Scheduler
//!
//! Triggered effects never run inline with the write that triggered them.
//! They are queued here and drained by a flush.
//!
//! # Algorithm
//!
//! 1. A trigger enqueues every eager subscriber it reaches. The queue is
//!    keyed by subscriber id, so an effect reached through several keys is
//!    queued once.
//! 2. When the queue goes from empty to non-empty, the runtime's
//!    [`FlushScheduler`] is asked for a flush, once, until that flush
//!    starts. Bursts of synchronous writes therefore cost one flush.
//! 3. A flush drains the queue in rounds. Each round takes everything queued
//!    at its start and runs it in first-enqueued order. Effects that write
//!    state queue work for the next round.
//! 4. If the number of rounds reaches the configured cap while work remains,
//!    the rest of the queue is dropped and the flush reports a possible
//!    cycle instead of spinning forever.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::ReactiveError;
use crate::reactive::{Reactive, Runtime, SubscriberId};

/// Decides when a flush happens after work has been queued.
///
/// UI embedders typically flush once per frame; headless code flushes on the
/// next task-queue turn or by hand.
pub trait FlushScheduler: Send + Sync {
    /// Called when the queue becomes non-empty and no flush is pending.
    fn request_flush(&self, runtime: &Runtime);
}

/// Never flushes on its own; the owner calls [`Runtime::flush`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualFlush;

impl FlushScheduler for ManualFlush {
    fn request_flush(&self, _runtime: &Runtime) {}
}

/// Flushes from a task spawned on a tokio runtime.
///
/// The spawned task runs on the next scheduler turn, after the code that
/// queued the work yields. Use a current-thread runtime (or a `LocalSet`):
/// the reactive core assumes one thread drives it at a time.
#[derive(Debug, Clone)]
pub struct TokioFlush {
    handle: tokio::runtime::Handle,
}

impl TokioFlush {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Bind to the tokio runtime of the calling context, if there is one.
    pub fn try_current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl FlushScheduler for TokioFlush {
    fn request_flush(&self, runtime: &Runtime) {
        let runtime = runtime.clone();
        self.handle.spawn(async move {
            // A cycle has already been logged by the flush itself.
            let _ = runtime.flush();
        });
    }
}

/// Summary of one successful flush.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushStats {
    /// Number of drain rounds.
    pub rounds: usize,
    /// Number of effects that actually ran.
    pub effects_run: usize,
}

/// Deduplicated, insertion-ordered set of effects awaiting a flush.
#[derive(Default)]
pub(crate) struct SchedulerQueue {
    pending: IndexMap<SubscriberId, Arc<dyn Reactive>>,
}

impl SchedulerQueue {
    /// Queue `node`. Returns `false` if it was already pending.
    pub(crate) fn enqueue(&mut self, node: Arc<dyn Reactive>) -> bool {
        let id = node.subscriber_id();
        if self.pending.contains_key(&id) {
            return false;
        }
        self.pending.insert(id, node);
        true
    }

    pub(crate) fn take(&mut self) -> Vec<Arc<dyn Reactive>> {
        std::mem::take(&mut self.pending).into_values().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Resets the `flushing` flag even if an effect panics.
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Queue plus flush state for one runtime.
pub(crate) struct UpdateScheduler {
    queue: Mutex<SchedulerQueue>,
    flushing: AtomicBool,
    flush_requested: AtomicBool,
    hook: Box<dyn FlushScheduler>,
}

impl UpdateScheduler {
    pub(crate) fn new(hook: Box<dyn FlushScheduler>) -> Self {
        Self {
            queue: Mutex::new(SchedulerQueue::default()),
            flushing: AtomicBool::new(false),
            flush_requested: AtomicBool::new(false),
            hook,
        }
    }

    /// Queue `node` and ask the hook for a flush if none is pending.
    pub(crate) fn enqueue(&self, runtime: &Runtime, node: Arc<dyn Reactive>) {
        let added = self.queue.lock().enqueue(node);
        if !added || self.flushing.load(Ordering::SeqCst) {
            return;
        }
        if !self.flush_requested.swap(true, Ordering::SeqCst) {
            self.hook.request_flush(runtime);
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub(crate) fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::SeqCst)
    }

    /// Drain the queue until it is empty or `cap` rounds have run.
    ///
    /// A call made while a flush is already running returns immediately with
    /// empty stats; the running flush picks up whatever was queued.
    pub(crate) fn flush(&self, runtime: &Runtime, cap: usize) -> Result<FlushStats, ReactiveError> {
        if self.flushing.swap(true, Ordering::SeqCst) {
            return Ok(FlushStats::default());
        }
        let _guard = FlushGuard(&self.flushing);
        self.flush_requested.store(false, Ordering::SeqCst);

        let mut stats = FlushStats::default();
        loop {
            let batch = {
                let mut queue = self.queue.lock();
                if queue.is_empty() {
                    break;
                }
                if stats.rounds >= cap {
                    let dropped = queue.len();
                    queue.clear();
                    warn!(
                        rounds = stats.rounds,
                        cap,
                        dropped,
                        "possible reactive cycle: flush aborted"
                    );
                    return Err(ReactiveError::CycleDetected {
                        rounds: stats.rounds,
                        cap,
                    });
                }
                queue.take()
            };

            stats.rounds += 1;
            debug!(round = stats.rounds, effects = batch.len(), "flush round");

            for node in batch {
                if node.is_disposed() {
                    continue;
                }
                node.run(runtime);
                stats.effects_run += 1;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Sources;
    use std::sync::atomic::AtomicUsize;

    struct Counter {
        id: SubscriberId,
        sources: Sources,
        runs: AtomicUsize,
        disposed: AtomicBool,
    }

    impl Counter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: SubscriberId::new(),
                sources: Sources::default(),
                runs: AtomicUsize::new(0),
                disposed: AtomicBool::new(false),
            })
        }
    }

    impl Reactive for Counter {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn sources(&self) -> &Sources {
            &self.sources
        }

        fn notify(self: Arc<Self>, _runtime: &Runtime) {}

        fn run(self: Arc<Self>, _runtime: &Runtime) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }

        fn is_disposed(&self) -> bool {
            self.disposed.load(Ordering::SeqCst)
        }
    }

    struct CountingHook(Arc<AtomicUsize>);

    impl FlushScheduler for CountingHook {
        fn request_flush(&self, _runtime: &Runtime) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn queue_deduplicates_and_keeps_order() {
        let mut queue = SchedulerQueue::default();
        let a = Counter::new();
        let b = Counter::new();

        assert!(queue.enqueue(a.clone()));
        assert!(queue.enqueue(b.clone()));
        assert!(!queue.enqueue(a.clone()));
        assert_eq!(queue.len(), 2);

        let ids: Vec<_> = queue.take().iter().map(|n| n.subscriber_id()).collect();
        assert_eq!(ids, vec![a.id, b.id]);
        assert!(queue.is_empty());
    }

    #[test]
    fn flush_runs_each_queued_node_once() {
        let runtime = Runtime::new();
        let a = Counter::new();

        runtime.enqueue(a.clone());
        runtime.enqueue(a.clone());

        let stats = runtime.flush().unwrap();
        assert_eq!(stats, FlushStats { rounds: 1, effects_run: 1 });
        assert_eq!(a.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn flush_skips_disposed_nodes() {
        let runtime = Runtime::new();
        let a = Counter::new();

        runtime.enqueue(a.clone());
        a.disposed.store(true, Ordering::SeqCst);

        let stats = runtime.flush().unwrap();
        assert_eq!(stats.effects_run, 0);
        assert_eq!(a.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn hook_is_asked_once_per_flush() {
        let requests = Arc::new(AtomicUsize::new(0));
        let runtime = Runtime::with_flush_scheduler(
            Default::default(),
            CountingHook(requests.clone()),
        );

        runtime.enqueue(Counter::new());
        runtime.enqueue(Counter::new());
        runtime.enqueue(Counter::new());
        assert_eq!(requests.load(Ordering::SeqCst), 1);

        runtime.flush().unwrap();
        runtime.enqueue(Counter::new());
        assert_eq!(requests.load(Ordering::SeqCst), 2);
    }
}
