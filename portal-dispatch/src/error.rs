//! Error types for the dispatcher.

use portal_codec::CodecError;
use portal_types::Operation;
use std::time::Duration;
use thiserror::Error;

/// Result type for portal calls.
pub type PortalResult<T> = Result<T, DataPortalError>;

/// The single failure type a caller sees: the cause plus which call failed.
#[derive(Debug, Error)]
#[error("{operation} {object_type} failed: {cause}")]
pub struct DataPortalError {
    pub object_type: String,
    pub operation: Operation,
    #[source]
    pub cause: PortalFault,
}

impl DataPortalError {
    pub fn new(object_type: impl Into<String>, operation: Operation, cause: PortalFault) -> Self {
        Self {
            object_type: object_type.into(),
            operation,
            cause,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, PortalFault::Timeout(_))
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self.cause, PortalFault::Authorization { .. })
    }
}

/// Why a call failed.
#[derive(Debug, Error)]
pub enum PortalFault {
    /// An authorization rule denied the call; nothing else ran.
    #[error("not authorized: {reason}")]
    Authorization { reason: String },

    /// A before or after hook failed.
    #[error("interceptor '{interceptor}' failed: {message}")]
    Interception { interceptor: String, message: String },

    #[error(transparent)]
    Execution(#[from] ExecutionFault),

    #[error("connectivity error: {0}")]
    Connectivity(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl PortalFault {
    /// Stable name of the failure family, used on the wire and in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authorization { .. } => "authorization",
            Self::Interception { .. } => "interception",
            Self::Execution(fault) => fault.kind(),
            Self::Connectivity(_) => "connectivity",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// A failure while running the operation itself.
#[derive(Debug, Error)]
pub enum ExecutionFault {
    /// The target's lifecycle method failed.
    #[error("target failed: {0}")]
    Target(String),

    /// The target does not implement the requested operation.
    #[error("operation not implemented by target")]
    NotImplemented,

    #[error("no target registered for type '{0}'")]
    UnknownTarget(String),

    /// Insert, Update and DeleteSelf need an entity payload.
    #[error("operation requires an entity payload, got {0}")]
    InvalidPayload(&'static str),

    /// Encoding or decoding at the tier boundary failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A failure reported by the remote host.
    #[error("remote {kind} fault: {message}")]
    Remote { kind: String, message: String },

    #[error("execution panicked: {0}")]
    Panicked(String),

    /// No async runtime could be provided for a blocking call.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl ExecutionFault {
    pub fn target(message: impl Into<String>) -> Self {
        Self::Target(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Target(_) => "target",
            Self::NotImplemented => "not_implemented",
            Self::UnknownTarget(_) => "unknown_target",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::Codec(_) => "codec",
            Self::Remote { .. } => "remote",
            Self::Panicked(_) => "panicked",
            Self::Runtime(_) => "runtime",
        }
    }
}

/// Result type for data portal targets.
pub type TargetResult<T> = Result<T, ExecutionFault>;

/// Errors raised by a remote channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("connectivity error: {0}")]
    Connectivity(String),

    #[error("channel timed out")]
    Timeout,
}

/// Errors raised while configuring a portal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no executor configured")]
    MissingExecutor,
}
