//! Dependency Graph
//!
//! This module holds the two halves of the update machinery:
//!
//! - `deps`: the edges. Each reactive handle has a registry of
//!   `DepKey -> DependencySet`, and each subscriber has the matching list of
//!   sources it is registered in.
//! - `scheduler`: the queue of triggered effects and the flush loop that
//!   drains it.
//!
//! # Design Decisions
//!
//! 1. Edges live on the handles rather than in a central table, so a handle
//!    that is dropped takes its edges with it.
//!
//! 2. Triggering a key removes its whole set. Subscribers re-register while
//!    they re-run, so a branch that stops reading a key stops being notified
//!    by it.
//!
//! 3. Effects are queued, never run inline. The queue deduplicates, which
//!    turns a burst of writes into one re-run per effect.

mod deps;
mod scheduler;

pub use deps::{DepKey, Dependencies, DependencySet, Sources};
pub use scheduler::{FlushScheduler, FlushStats, ManualFlush, TokioFlush};

pub(crate) use scheduler::UpdateScheduler;
