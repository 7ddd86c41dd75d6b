//! Messages exchanged between a remote proxy and a portal host.
//!
//! Each message is one frame (see [`portal_codec::frame`]): the payload,
//! result and context maps refer into the record sequence that travels
//! with them, so an entity shared between payload and context arrives as
//! one instance.

use crate::error::{ExecutionFault, PortalFault};
use portal_codec::{EncodedValue, SerializationInfo};
use portal_types::{CallId, Operation, Principal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    pub call_id: CallId,
    pub object_type: String,
    pub operation: Operation,
    pub principal: Principal,
    pub payload: EncodedValue,
    #[serde(default)]
    pub client_context: BTreeMap<String, EncodedValue>,
    #[serde(default)]
    pub global_context: BTreeMap<String, EncodedValue>,
    #[serde(default)]
    pub records: Vec<SerializationInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    pub call_id: CallId,
    pub outcome: WireOutcome,
    /// The host's global context after the call; empty on failure.
    #[serde(default)]
    pub global_context: BTreeMap<String, EncodedValue>,
    #[serde(default)]
    pub records: Vec<SerializationInfo>,
}

impl WireResponse {
    pub fn fault(call_id: CallId, fault: WireFault) -> Self {
        Self {
            call_id,
            outcome: WireOutcome::Fault(fault),
            global_context: BTreeMap::new(),
            records: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "body", rename_all = "snake_case")]
pub enum WireOutcome {
    Success(EncodedValue),
    Fault(WireFault),
}

/// A host-side failure in transportable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFault {
    /// [`PortalFault::kind`] on the host.
    pub kind: String,
    pub message: String,
}

impl WireFault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn from_fault(fault: &PortalFault) -> Self {
        let message = match fault {
            PortalFault::Execution(ExecutionFault::Target(message)) => message.clone(),
            PortalFault::Execution(ExecutionFault::UnknownTarget(object_type)) => {
                object_type.clone()
            }
            other => other.to_string(),
        };
        Self::new(fault.kind(), message)
    }

    /// Rebuilds the fault on the calling side. Target-level faults keep
    /// their variant so remote and local calls fail alike; anything else
    /// becomes [`ExecutionFault::Remote`].
    pub fn into_fault(self) -> PortalFault {
        let fault = match self.kind.as_str() {
            "target" => ExecutionFault::Target(self.message),
            "not_implemented" => ExecutionFault::NotImplemented,
            "unknown_target" => ExecutionFault::UnknownTarget(self.message),
            "panicked" => ExecutionFault::Panicked(self.message),
            _ => ExecutionFault::Remote {
                kind: self.kind,
                message: self.message,
            },
        };
        PortalFault::Execution(fault)
    }
}
