//! Wire records produced by the encoder and consumed by the decoder.
//!
//! This layout is the compatibility contract between independently built
//! endpoints: reference ids start at [`FIRST_REFERENCE_ID`] and grow by one
//! per new node, and records appear in pre-order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pass-scoped identifier of one encoded node.
pub type ReferenceId = u32;

/// The id given to the first node of every pass.
pub const FIRST_REFERENCE_ID: ReferenceId = 1;

/// Record type name used for child lists.
pub use portal_model::LIST_TYPE_NAME;

/// Reserved value keys carrying entity lifecycle flags.
pub(crate) mod keys {
    pub const IS_NEW: &str = "_is_new";
    pub const IS_DELETED: &str = "_is_deleted";
    pub const IS_CHILD: &str = "_is_child";
    pub const IS_SELF_DIRTY: &str = "_is_self_dirty";
    pub const IS_SELF_VALID: &str = "_is_self_valid";
    pub const IS_BUSY: &str = "_is_busy";
    pub const COUNT: &str = "_count";
    pub const DELETED_COUNT: &str = "_deleted_count";

    pub fn item(index: usize) -> String {
        format!("i{index}")
    }

    pub fn deleted(index: usize) -> String {
        format!("d{index}")
    }
}

/// One node of an encoded graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializationInfo {
    pub reference_id: ReferenceId,
    pub type_name: String,
    /// Inline values by field name.
    #[serde(default)]
    pub values: BTreeMap<String, FieldEntry>,
    /// Pointers to other records by field name.
    #[serde(default)]
    pub children: BTreeMap<String, ChildSlot>,
}

impl SerializationInfo {
    pub fn new(reference_id: ReferenceId, type_name: impl Into<String>) -> Self {
        Self {
            reference_id,
            type_name: type_name.into(),
            values: BTreeMap::new(),
            children: BTreeMap::new(),
        }
    }

    pub fn add_value(&mut self, name: impl Into<String>, value: ScalarValue, is_dirty: bool) {
        self.values
            .insert(name.into(), FieldEntry { value, is_dirty });
    }

    pub fn add_child(&mut self, name: impl Into<String>, reference_id: ReferenceId, is_dirty: bool) {
        self.children.insert(
            name.into(),
            ChildSlot {
                reference_id,
                is_dirty,
            },
        );
    }
}

/// An inline field value and its container's dirty flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub value: ScalarValue,
    pub is_dirty: bool,
}

/// A pointer to another record, with the holding field's dirty flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSlot {
    pub reference_id: ReferenceId,
    pub is_dirty: bool,
}

/// A directly encodable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
    /// An application value encoded by the serialization policy.
    Opaque {
        type_name: String,
        data: serde_json::Value,
    },
}

impl ScalarValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ScalarValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// A value outside any record (request payload, context entry): either
/// inline or a pointer into the accompanying record sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EncodedValue {
    Scalar(ScalarValue),
    Ref(ReferenceId),
}
