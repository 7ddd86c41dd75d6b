//! Core type definitions for the data portal.
//!
//! This crate defines the small, transport-agnostic types shared by the
//! model, codec and dispatcher crates:
//! - Call identifiers (UUID v7) for log and dashboard correlation
//! - The operation kinds a portal call can carry
//! - The caller identity consulted by authorization rules

mod ids;
mod operation;
mod principal;

pub use ids::CallId;
pub use operation::Operation;
pub use principal::Principal;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),
}
