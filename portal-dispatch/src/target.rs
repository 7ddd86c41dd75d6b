//! Data portal targets: the server-side lifecycle methods of one entity type.

use crate::error::{ExecutionFault, TargetResult};
use crate::request::OperationContext;
use async_trait::async_trait;
use portal_model::{EntityRef, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Persistence logic for one entity type.
///
/// Every method defaults to [`ExecutionFault::NotImplemented`]; implement
/// the operations the type supports. The executor applies lifecycle
/// markers after a method returns, so targets only load and store data.
#[async_trait]
pub trait DataPortalTarget: Send + Sync {
    /// Builds a new entity, typically with defaults loaded from storage.
    async fn create(&self, criteria: &Value, ctx: &mut OperationContext<'_>) -> TargetResult<Value> {
        let _ = (criteria, ctx);
        Err(ExecutionFault::NotImplemented)
    }

    async fn fetch(&self, criteria: &Value, ctx: &mut OperationContext<'_>) -> TargetResult<Value> {
        let _ = (criteria, ctx);
        Err(ExecutionFault::NotImplemented)
    }

    async fn insert(&self, entity: &EntityRef, ctx: &mut OperationContext<'_>) -> TargetResult<()> {
        let _ = (entity, ctx);
        Err(ExecutionFault::NotImplemented)
    }

    async fn update(&self, entity: &EntityRef, ctx: &mut OperationContext<'_>) -> TargetResult<()> {
        let _ = (entity, ctx);
        Err(ExecutionFault::NotImplemented)
    }

    /// Deletes the entity passed in (immediate deletion of a loaded object).
    async fn delete_self(&self, entity: &EntityRef, ctx: &mut OperationContext<'_>) -> TargetResult<()> {
        let _ = (entity, ctx);
        Err(ExecutionFault::NotImplemented)
    }

    /// Deletes by criteria without loading the entity.
    async fn delete(&self, criteria: &Value, ctx: &mut OperationContext<'_>) -> TargetResult<()> {
        let _ = (criteria, ctx);
        Err(ExecutionFault::NotImplemented)
    }
}

/// Target type name to target. Frozen once handed to an executor.
#[derive(Clone, Default)]
pub struct TargetRegistry {
    targets: HashMap<String, Arc<dyn DataPortalTarget>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `target` for `object_type`, replacing any earlier one.
    pub fn register(
        &mut self,
        object_type: impl Into<String>,
        target: impl DataPortalTarget + 'static,
    ) -> &mut Self {
        let object_type = object_type.into();
        debug!("Registered portal target for {}", object_type);
        self.targets.insert(object_type, Arc::new(target));
        self
    }

    pub fn get(&self, object_type: &str) -> Option<Arc<dyn DataPortalTarget>> {
        self.targets.get(object_type).cloned()
    }

    pub fn contains(&self, object_type: &str) -> bool {
        self.targets.contains_key(object_type)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
