//! Entity type registry.

use crate::entity::{EntityRef, LifecycleState};
use crate::error::{ModelError, ModelResult};
use crate::schema::EntitySchema;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Maps entity type names to their schemas.
///
/// Populated at startup and shared read-only afterwards; the codec uses it
/// to build entities for incoming records.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    schemas: HashMap<String, Arc<EntitySchema>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and registers a schema.
    pub fn register(&mut self, schema: EntitySchema) -> ModelResult<Arc<EntitySchema>> {
        schema.validate()?;
        if self.schemas.contains_key(&schema.entity_type) {
            return Err(ModelError::DuplicateType(schema.entity_type));
        }
        debug!(
            "Registered entity type {} ({} fields)",
            schema.entity_type,
            schema.fields.len()
        );
        let schema = Arc::new(schema);
        self.schemas
            .insert(schema.entity_type.clone(), Arc::clone(&schema));
        Ok(schema)
    }

    pub fn get(&self, entity_type: &str) -> Option<Arc<EntitySchema>> {
        self.schemas.get(entity_type).cloned()
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.schemas.contains_key(entity_type)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Creates a new, unsaved entity of a registered type.
    pub fn create(&self, entity_type: &str) -> ModelResult<EntityRef> {
        self.get(entity_type)
            .map(EntityRef::new)
            .ok_or_else(|| ModelError::UnknownType(entity_type.to_string()))
    }

    /// Creates an entity of a registered type with explicit flags.
    pub fn create_with_state(
        &self,
        entity_type: &str,
        state: LifecycleState,
    ) -> ModelResult<EntityRef> {
        self.get(entity_type)
            .map(|schema| EntityRef::with_state(schema, state))
            .ok_or_else(|| ModelError::UnknownType(entity_type.to_string()))
    }
}
