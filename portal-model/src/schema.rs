use crate::error::{ModelError, ModelResult};
use crate::value::{FromValue, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::marker::PhantomData;

/// Reserved type name for child-list records.
pub const LIST_TYPE_NAME: &str = "$list";

/// Describes an entity type's fields, in declaration order.
///
/// The field list is fixed for the lifetime of the type: every entity built
/// from this schema owns exactly one field state container per entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub entity_type: String,
    pub fields: Vec<FieldDef>,
}

impl EntitySchema {
    pub fn new(entity_type: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            entity_type: entity_type.into(),
            fields,
        }
    }

    /// Checks names: non-empty, unique, and free of the `_`/`$` prefixes the
    /// codec reserves for its own record entries.
    pub fn validate(&self) -> ModelResult<()> {
        if self.entity_type.is_empty() || self.entity_type.starts_with('$') {
            return Err(ModelError::InvalidSchema(format!(
                "invalid entity type name '{}'",
                self.entity_type
            )));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() || field.name.starts_with('_') || field.name.starts_with('$')
            {
                return Err(ModelError::InvalidSchema(format!(
                    "{}: invalid field name '{}'",
                    self.entity_type, field.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ModelError::InvalidSchema(format!(
                    "{}: duplicate field '{}'",
                    self.entity_type, field.name
                )));
            }
            if field.field_type == FieldType::Opaque && field.opaque_type.is_none() {
                return Err(ModelError::InvalidSchema(format!(
                    "{}: opaque field '{}' needs a type name",
                    self.entity_type, field.name
                )));
            }
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// One declared field of an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    /// Type name of the payload. Only meaningful when FieldType is Opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opaque_type: Option<String>,
}

impl FieldDef {
    fn simple(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            opaque_type: None,
        }
    }

    /// Shorthand for a text field.
    pub fn text(name: &str) -> Self {
        Self::simple(name, FieldType::Text)
    }

    /// Shorthand for an integer field.
    pub fn integer(name: &str) -> Self {
        Self::simple(name, FieldType::Integer)
    }

    /// Shorthand for a float field.
    pub fn float(name: &str) -> Self {
        Self::simple(name, FieldType::Float)
    }

    /// Shorthand for a boolean field.
    pub fn bool(name: &str) -> Self {
        Self::simple(name, FieldType::Bool)
    }

    /// Shorthand for a JSON document field.
    pub fn json(name: &str) -> Self {
        Self::simple(name, FieldType::Json)
    }

    /// Shorthand for a child entity field.
    pub fn child(name: &str) -> Self {
        Self::simple(name, FieldType::Child)
    }

    /// Shorthand for a child list field.
    pub fn list(name: &str) -> Self {
        Self::simple(name, FieldType::List)
    }

    /// Shorthand for an opaque field carrying values of `type_name`.
    pub fn opaque(name: &str, type_name: &str) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Opaque,
            opaque_type: Some(type_name.into()),
        }
    }

    /// Default value for a freshly constructed entity.
    pub fn default_value(&self) -> Value {
        match self.field_type {
            FieldType::Text => Value::Text(String::new()),
            FieldType::Integer => Value::Int(0),
            FieldType::Float => Value::Float(0.0),
            FieldType::Bool => Value::Bool(false),
            FieldType::Json | FieldType::Opaque | FieldType::Child | FieldType::List => {
                Value::Null
            }
        }
    }

    /// Checks `value` against the declared type, widening integers for float
    /// fields. Null is accepted by every field.
    pub fn coerce(&self, value: Value) -> ModelResult<Value> {
        let ok = match (self.field_type, &value) {
            (_, Value::Null) => true,
            (FieldType::Float, Value::Int(i)) => return Ok(Value::Float(*i as f64)),
            (FieldType::Text, Value::Text(_))
            | (FieldType::Integer, Value::Int(_))
            | (FieldType::Float, Value::Float(_))
            | (FieldType::Bool, Value::Bool(_))
            | (FieldType::Json, Value::Json(_))
            | (FieldType::Child, Value::Entity(_))
            | (FieldType::List, Value::List(_)) => true,
            (FieldType::Opaque, Value::Opaque(o)) => {
                self.opaque_type.as_deref() == Some(o.type_name())
            }
            _ => false,
        };
        if ok {
            Ok(value)
        } else {
            Err(ModelError::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type,
                found: value.kind_name(),
            })
        }
    }
}

/// The declared type of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Bool,
    Json,
    /// A value of an application type; see [`FieldDef::opaque_type`].
    Opaque,
    /// A nested entity (or null).
    Child,
    /// A collection of child entities (or null).
    List,
}

impl FieldType {
    /// Whether values of this type decompose into child records.
    pub fn is_node(&self) -> bool {
        matches!(self, FieldType::Child | FieldType::List)
    }
}

/// Typed name of an entity field.
///
/// ```
/// use portal_model::PropertyInfo;
/// const NAME: PropertyInfo<String> = PropertyInfo::new("name");
/// assert_eq!(NAME.name(), "name");
/// ```
pub struct PropertyInfo<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PropertyInfo<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: FromValue> PropertyInfo<T> {
    pub(crate) fn extract(&self, def: &FieldDef, value: &Value) -> ModelResult<T> {
        T::from_value(value).ok_or(ModelError::TypeMismatch {
            field: self.name.to_string(),
            expected: def.field_type,
            found: value.kind_name(),
        })
    }
}

impl<T> Clone for PropertyInfo<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PropertyInfo<T> {}
