//! Error types for the graph codec.

use crate::records::ReferenceId;
use std::fmt;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding or decoding a graph.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A value could not be encoded inline and has no decomposition.
    #[error("no serialization support for type '{type_name}'")]
    Unsupported { type_name: String },

    /// The serialization policy failed on a supported value.
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt stream: no records")]
    EmptyStream,

    #[error("corrupt stream: duplicate record for reference {0}")]
    DuplicateRecord(ReferenceId),

    #[error("corrupt stream: slot '{slot}' points to missing reference {reference_id}")]
    DanglingReference {
        slot: String,
        reference_id: ReferenceId,
    },

    #[error("corrupt stream: record {reference_id}: {detail}")]
    MalformedRecord {
        reference_id: ReferenceId,
        detail: String,
    },

    #[error("corrupt frame: {0}")]
    MalformedFrame(String),

    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    #[error("type mismatch in record {reference_id}, field '{field}': {detail}")]
    TypeMismatch {
        reference_id: ReferenceId,
        field: String,
        detail: String,
    },

    #[error("unknown entity type: {0}")]
    UnknownType(String),
}

/// The three failure families of the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecErrorKind {
    Serialization,
    CorruptStream,
    TypeMismatch,
}

impl CodecError {
    pub fn kind(&self) -> CodecErrorKind {
        match self {
            Self::Unsupported { .. } | Self::Serialization(_) | Self::Json(_) => {
                CodecErrorKind::Serialization
            }
            Self::EmptyStream
            | Self::DuplicateRecord(_)
            | Self::DanglingReference { .. }
            | Self::MalformedRecord { .. }
            | Self::MalformedFrame(_)
            | Self::FrameTooLarge { .. } => CodecErrorKind::CorruptStream,
            Self::TypeMismatch { .. } | Self::UnknownType(_) => CodecErrorKind::TypeMismatch,
        }
    }
}

impl fmt::Display for CodecErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Serialization => "serialization",
            Self::CorruptStream => "corrupt_stream",
            Self::TypeMismatch => "type_mismatch",
        })
    }
}
