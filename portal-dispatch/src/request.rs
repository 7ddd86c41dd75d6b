//! Requests, results and the context handed to targets.

use portal_model::{ContextMap, EntityRef, Value};
use portal_types::{CallId, Operation, Principal};

/// One portal call.
#[derive(Debug, Clone)]
pub struct DataPortalRequest {
    /// Registered target type the call is routed to.
    pub object_type: String,
    pub operation: Operation,
    /// Criteria for Create/Fetch/Delete, the entity for Insert/Update/DeleteSelf.
    pub payload: Value,
    pub principal: Principal,
    /// Travels to the executor only.
    pub client_context: ContextMap,
    /// Travels to the executor and back; the returned copy is merged.
    pub global_context: ContextMap,
}

impl DataPortalRequest {
    pub fn new(object_type: impl Into<String>, operation: Operation, payload: impl Into<Value>) -> Self {
        Self {
            object_type: object_type.into(),
            operation,
            payload: payload.into(),
            principal: Principal::anonymous(),
            client_context: ContextMap::new(),
            global_context: ContextMap::new(),
        }
    }

    /// An Update request for `entity`, typed by the entity's own schema.
    pub fn update(entity: &EntityRef) -> Self {
        Self::new(entity.entity_type(), Operation::Update, entity.clone())
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = principal;
        self
    }

    pub fn with_client_context(mut self, context: ContextMap) -> Self {
        self.client_context = context;
        self
    }

    pub fn with_global_context(mut self, context: ContextMap) -> Self {
        self.global_context = context;
        self
    }
}

/// A successful call.
#[derive(Debug, Clone)]
pub struct DataPortalResult {
    /// The created, fetched or saved object (null for Delete).
    pub value: Value,
    /// Global context after the call. From [`DataPortal`](crate::DataPortal)
    /// this is the caller's copy with the executor's changes merged in.
    pub global_context: ContextMap,
}

impl DataPortalResult {
    pub fn entity(&self) -> Option<&EntityRef> {
        self.value.as_entity()
    }
}

/// What a target sees while running one operation.
pub struct OperationContext<'a> {
    pub call_id: CallId,
    pub object_type: &'a str,
    pub operation: Operation,
    pub principal: &'a Principal,
    pub client_context: &'a ContextMap,
    /// The executor's copy; changes are sent back to the caller.
    pub global_context: &'a mut ContextMap,
}
