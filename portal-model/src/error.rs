//! Error types for the entity model.

use crate::schema::FieldType;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by entity, list and schema operations.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("entity type '{entity_type}' has no field '{field}'")]
    UnknownField { entity_type: String, field: String },

    #[error("field '{field}' expects {expected:?}, got {found}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        found: &'static str,
    },

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("entity type already registered: {0}")]
    DuplicateType(String),

    #[error("unknown entity type: {0}")]
    UnknownType(String),

    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}
