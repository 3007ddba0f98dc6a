//! Values
//!
//! Reactive state is a tree of [`Value`]s. Leaves are primitives; inner
//! nodes are [`ReactiveObject`] and [`ReactiveArray`] handles. Anything the
//! runtime should carry without looking inside (callbacks, render nodes,
//! file handles) travels as an [`Opaque`].
//!
//! Equality is same-value equality: primitives compare by value, with NaN
//! equal to itself, and handles and opaque values compare by identity. A
//! write that is same-value-equal to the current value is dropped without
//! notifying anyone.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, Serializer};

use super::array::ReactiveArray;
use super::object::ReactiveObject;
use super::Runtime;

/// A reactive state value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(ReactiveObject),
    Array(ReactiveArray),
    Opaque(Opaque),
}

impl Value {
    /// Same-value comparison.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The number as an integer, if it has no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => integral(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ReactiveObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ReactiveArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&Opaque> {
        match self {
            Value::Opaque(o) => Some(o),
            _ => None,
        }
    }

    /// Untracked deep snapshot as JSON. Opaque values become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Opaque(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => match integral(*n) {
                Some(i) => serde_json::Value::from(i),
                None => serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
            },
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Object(o) => o.to_json(),
            Value::Array(a) => a.to_json(),
        }
    }
}

/// Largest magnitude at which every integer is exactly representable.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn integral(n: f64) -> Option<i64> {
    (n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER).then_some(n as i64)
}

/// Whether `value` is a reactive handle.
pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::Object(o) => fmt::Debug::fmt(o, f),
            Value::Array(a) => fmt::Debug::fmt(a, f),
            Value::Opaque(o) => fmt::Debug::fmt(o, f),
        }
    }
}

/// Serializes through the tracked accessors, so serializing inside an
/// effect subscribes it to every key it visits.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null | Value::Opaque(_) => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => match integral(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Value::String(s) => serializer.serialize_str(s),
            Value::Object(o) => o.serialize(serializer),
            Value::Array(a) => a.serialize(serializer),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ReactiveObject> for Value {
    fn from(o: ReactiveObject) -> Self {
        Value::Object(o)
    }
}

impl From<ReactiveArray> for Value {
    fn from(a: ReactiveArray) -> Self {
        Value::Array(a)
    }
}

impl From<Opaque> for Value {
    fn from(o: Opaque) -> Self {
        Value::Opaque(o)
    }
}

/// An externally owned value carried through reactive state untouched.
#[derive(Clone)]
pub struct Opaque(Arc<dyn Any + Send + Sync>);

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({:p})", Arc::as_ptr(&self.0))
    }
}

/// Conversion into a reactive [`Value`] owned by a runtime.
pub trait IntoReactive {
    fn into_reactive(self, runtime: &Runtime) -> Value;
}

impl IntoReactive for Value {
    fn into_reactive(self, _runtime: &Runtime) -> Value {
        self
    }
}

impl IntoReactive for serde_json::Value {
    fn into_reactive(self, runtime: &Runtime) -> Value {
        match self {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Array(ReactiveArray::from_vec(runtime, items)),
            serde_json::Value::Object(map) => Value::Object(ReactiveObject::from_map(runtime, map)),
        }
    }
}

macro_rules! into_reactive_via_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoReactive for $ty {
                fn into_reactive(self, _runtime: &Runtime) -> Value {
                    Value::from(self)
                }
            }
        )*
    };
}

into_reactive_via_from!(bool, f64, i64, i32, &str, String, ReactiveObject, ReactiveArray, Opaque);

/// Storage cell of an object property or array slot.
///
/// Nested containers are kept as raw JSON until first read, then replaced
/// by their wrapper. The cell is the child-wrapper cache: every later read
/// returns the same handle.
pub(crate) enum Slot {
    Live(Value),
    Raw(serde_json::Value),
}

impl Slot {
    pub(crate) fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => Slot::Raw(json),
            serde_json::Value::Null => Slot::Live(Value::Null),
            serde_json::Value::Bool(b) => Slot::Live(Value::Bool(b)),
            serde_json::Value::Number(n) => Slot::Live(Value::Number(n.as_f64().unwrap_or(f64::NAN))),
            serde_json::Value::String(s) => Slot::Live(Value::String(s)),
        }
    }

    /// The slot's value, wrapping a raw container on first access.
    pub(crate) fn resolve(&mut self, runtime: &Runtime) -> Value {
        if let Slot::Raw(json) = self {
            let value = std::mem::take(json).into_reactive(runtime);
            *self = Slot::Live(value);
        }
        match self {
            Slot::Live(value) => value.clone(),
            Slot::Raw(_) => Value::Null,
        }
    }

    /// The slot as JSON, without wrapping anything.
    pub(crate) fn peek_json(&self) -> SlotJson {
        match self {
            Slot::Raw(json) => SlotJson::Ready(json.clone()),
            Slot::Live(value) => SlotJson::Pending(value.clone()),
        }
    }
}

/// JSON for a slot, or the live value still to be converted once the
/// container lock is released.
pub(crate) enum SlotJson {
    Ready(serde_json::Value),
    Pending(Value),
}

impl SlotJson {
    pub(crate) fn into_json(self) -> serde_json::Value {
        match self {
            SlotJson::Ready(json) => json,
            SlotJson::Pending(value) => value.to_json(),
        }
    }
}
