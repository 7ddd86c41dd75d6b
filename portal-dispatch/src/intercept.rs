//! Before/after hooks around every executed call.

use crate::error::PortalFault;
use portal_model::Value;
use portal_types::{CallId, Operation, Principal};
use thiserror::Error;

/// What an interceptor learns about a call.
#[derive(Debug, Clone, Copy)]
pub struct InterceptArgs<'a> {
    pub call_id: CallId,
    pub object_type: &'a str,
    pub operation: Operation,
    pub principal: &'a Principal,
}

/// How the call ended, as seen by `complete`.
#[derive(Debug, Clone, Copy)]
pub enum CallOutcome<'a> {
    Succeeded(&'a Value),
    Failed(&'a PortalFault),
}

impl CallOutcome<'_> {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Succeeded(_))
    }
}

/// A hook failure. Fatal to the call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct InterceptError(pub String);

impl InterceptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Observes calls before and after execution.
///
/// `initialize` hooks run in registration order; the first failure skips
/// the rest and the execution. `complete` hooks then run in the same order,
/// every one of them, whether or not the call failed.
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn initialize(&self, args: &InterceptArgs<'_>) -> Result<(), InterceptError> {
        let _ = args;
        Ok(())
    }

    fn complete(&self, args: &InterceptArgs<'_>, outcome: CallOutcome<'_>) -> Result<(), InterceptError> {
        let _ = (args, outcome);
        Ok(())
    }
}
