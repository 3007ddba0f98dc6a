//! Vireo Core
//!
//! This crate provides the core runtime for the Vireo UI framework.
//! It implements:
//!
//! - Reactive state (objects, arrays, memos, effects) with fine-grained
//!   dependency tracking
//! - A batched update scheduler with cycle protection
//! - A subscribable store for shared application state
//! - A source rewriter that gives each template expression its own
//!   isolation boundary
//!
//! Rendering, DOM diffing and component lifecycles live outside this crate;
//! they consume effects, store subscriptions and the rewritten template
//! source.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Reactive handles, memos, effects and the runtime
//! - `graph`: Dependency edges and the update scheduler
//! - `store`: Store with re-entrancy-safe notification
//! - `opt`: Template expression extraction and rewriting
//! - `config`: Runtime and rewriter settings
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use vireo_core::Runtime;
//!
//! let runtime = Runtime::new();
//! let state = runtime.wrap_object(json!({ "count": 1 })).unwrap();
//!
//! // Create a derived value
//! let s = state.clone();
//! let doubled = runtime.computed(move || {
//!     s.get("count").and_then(|v| v.as_f64()).unwrap_or(0.0) * 2.0
//! });
//!
//! // Create an effect
//! let d = doubled.clone();
//! let _effect = runtime.create_effect(move || {
//!     println!("Doubled: {}", d.get());
//! });
//!
//! // Update the state; the effect re-runs on the next flush
//! state.set("count", 5);
//! runtime.flush().unwrap();
//! assert_eq!(doubled.get(), 10.0);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod opt;
pub mod reactive;
pub mod store;

pub use config::{OptOptions, RuntimeConfig};
pub use error::{OptError, ReactiveError};
pub use graph::{FlushScheduler, FlushStats, ManualFlush, TokioFlush};
pub use opt::{opt, opt_with};
pub use reactive::{
    is_reactive, Effect, Memo, ReactiveArray, ReactiveObject, Runtime, Value,
};
pub use store::{Store, Subscription};
