//! Field values: scalars, opaque payloads and trackable child nodes.

use crate::entity::EntityRef;
use crate::list::ListRef;
use crate::node::Node;
use crate::status::{TrackStatus, Trackable};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A value held by an entity field or a context map entry.
///
/// Scalars compare by value; entities, lists and opaque values compare by
/// identity, so two fields aliasing one child are equal while two equal
/// copies are not.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
    Opaque(OpaqueValue),
    Entity(EntityRef),
    List(ListRef),
}

impl Value {
    /// Short kind name used in mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Json(_) => "json",
            Value::Opaque(_) => "opaque",
            Value::Entity(_) => "entity",
            Value::List(_) => "list",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The graph node behind this value, if it is one.
    pub fn as_node(&self) -> Option<Node> {
        match self {
            Value::Entity(e) => Some(Node::Entity(e.clone())),
            Value::List(l) => Some(Node::List(l.clone())),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Value::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            (Value::Entity(a), Value::Entity(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Trackable for Value {
    fn tracked(&self) -> Option<&dyn TrackStatus> {
        match self {
            Value::Entity(e) => Some(e),
            Value::List(l) => Some(l),
            _ => None,
        }
    }
}

/// A value whose type the model knows nothing about.
///
/// Opaque values only cross a tier boundary when the codec's serialization
/// policy knows how to encode `type_name`.
#[derive(Clone)]
pub struct OpaqueValue {
    type_name: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl OpaqueValue {
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            inner: Arc::new(value),
        }
    }

    /// Wraps an already type-erased payload.
    pub fn from_boxed(type_name: impl Into<String>, value: Box<dyn Any + Send + Sync>) -> Self {
        Self {
            type_name: type_name.into(),
            inner: Arc::from(value),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueValue")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

// ── Conversions ──────────────────────────────────────────────────

/// Typed extraction from a [`Value`], used by [`PropertyInfo`](crate::PropertyInfo).
pub trait FromValue: Sized {
    /// Returns `None` when the value has a different kind.
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! scalar_conversions {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }

        impl FromValue for $ty {
            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

scalar_conversions!(bool, Bool);
scalar_conversions!(i64, Int);
scalar_conversions!(String, Text);
scalar_conversions!(serde_json::Value, Json);
scalar_conversions!(OpaqueValue, Opaque);
scalar_conversions!(EntityRef, Entity);
scalar_conversions!(ListRef, List);

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}
