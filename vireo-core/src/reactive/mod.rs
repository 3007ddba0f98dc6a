//! Reactive Primitives
//!
//! This module implements the core reactive system: wrapped state, memos
//! and effects, all owned by an explicit [`Runtime`].
//!
//! # Concepts
//!
//! ## Reactive handles
//!
//! [`ReactiveObject`] and [`ReactiveArray`] wrap plain JSON-shaped data.
//! Reading a property within a tracking context (an effect or a memo)
//! registers that context as a dependent of the property. Writing the
//! property notifies all dependents. Nested containers are wrapped lazily
//! on first read and the same handle is returned every time after.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only
//! when one of its dependencies changes and it is read again.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Triggered effects are batched and re-run by
//! [`Runtime::flush`].
//!
//! # Implementation Notes
//!
//! The runtime keeps a stack of running computations. When a handle is
//! read we check the top of the stack and, if it is a computation, register
//! the dependency in both directions: the handle learns its subscriber and
//! the subscriber records the handle in its read-set, so it can unregister
//! before it re-runs.

mod array;
mod context;
mod effect;
mod memo;
mod object;
mod runtime;
mod subscriber;
mod value;

pub use array::ReactiveArray;
pub use context::ReactiveContext;
pub use effect::Effect;
pub use memo::{Memo, MemoState};
pub use object::ReactiveObject;
pub use runtime::Runtime;
pub use subscriber::{Cleanup, Reactive, SubscriberId};
pub use value::{is_reactive, IntoReactive, Opaque, Value};
