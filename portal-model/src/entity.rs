use crate::error::{ModelError, ModelResult};
use crate::field_data::FieldData;
use crate::node::{Node, NodeKey};
use crate::schema::{EntitySchema, PropertyInfo};
use crate::status::{Query, TrackStatus, Trackable};
use crate::value::{FromValue, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Lifecycle flags owned by an entity itself (not derived from its fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleState {
    pub is_new: bool,
    pub is_deleted: bool,
    pub is_child: bool,
    pub is_self_dirty: bool,
    pub is_self_valid: bool,
    pub is_busy: bool,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self {
            is_new: false,
            is_deleted: false,
            is_child: false,
            is_self_dirty: false,
            is_self_valid: true,
            is_busy: false,
        }
    }
}

struct EntityData {
    schema: Arc<EntitySchema>,
    fields: Vec<FieldData<Value>>,
    state: LifecycleState,
}

impl EntityData {
    fn index_of(&self, name: &str) -> ModelResult<usize> {
        self.schema
            .position(name)
            .ok_or_else(|| ModelError::UnknownField {
                entity_type: self.schema.entity_type.clone(),
                field: name.to_string(),
            })
    }
}

/// Point-in-time copy of an entity's fields and flags.
///
/// Child values in the copy are handles, so the snapshot shares children
/// with the live entity.
#[derive(Debug, Clone)]
pub struct EntitySnapshot {
    pub schema: Arc<EntitySchema>,
    pub state: LifecycleState,
    pub fields: Vec<FieldData<Value>>,
}

/// Shared handle to an entity.
///
/// Cloning the handle aliases the entity; use [`EntityRef::ptr_eq`] for
/// identity comparison. Each entity owns one [`FieldData`] per schema field,
/// created at construction time.
///
/// Handles are reference counted, so an entity that is part of a cycle
/// outlives its last outside handle. Call [`EntityRef::release_graph`] when
/// such a graph is no longer needed.
#[derive(Clone)]
pub struct EntityRef(Arc<RwLock<EntityData>>);

impl EntityRef {
    /// Creates a new, unsaved entity with default field values.
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self::with_state(
            schema,
            LifecycleState {
                is_new: true,
                is_self_dirty: true,
                ..LifecycleState::default()
            },
        )
    }

    /// Creates an entity with default field values and explicit flags.
    pub fn with_state(schema: Arc<EntitySchema>, state: LifecycleState) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|def| FieldData::new(def.name.clone(), def.default_value()))
            .collect();
        Self(Arc::new(RwLock::new(EntityData {
            schema,
            fields,
            state,
        })))
    }

    fn read(&self) -> RwLockReadGuard<'_, EntityData> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EntityData> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn key(&self) -> NodeKey {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn entity_type(&self) -> String {
        self.read().schema.entity_type.clone()
    }

    pub fn schema(&self) -> Arc<EntitySchema> {
        Arc::clone(&self.read().schema)
    }

    pub fn state(&self) -> LifecycleState {
        self.read().state
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        let data = self.read();
        EntitySnapshot {
            schema: Arc::clone(&data.schema),
            state: data.state,
            fields: data.fields.clone(),
        }
    }

    // ── Field access ─────────────────────────────────────────────

    /// Reads a field through its typed descriptor.
    pub fn get<T: FromValue>(&self, prop: &PropertyInfo<T>) -> ModelResult<T> {
        let data = self.read();
        let idx = data.index_of(prop.name())?;
        prop.extract(&data.schema.fields[idx], data.fields[idx].value())
    }

    /// Writes a field through its typed descriptor, marking it dirty.
    pub fn set<T: Into<Value>>(&self, prop: &PropertyInfo<T>, value: T) -> ModelResult<()> {
        self.set_value(prop.name(), value.into())
    }

    /// Writes a field through its typed descriptor without marking it dirty.
    pub fn load<T: Into<Value>>(&self, prop: &PropertyInfo<T>, value: T) -> ModelResult<()> {
        self.load_value(prop.name(), value.into())
    }

    pub fn get_value(&self, name: &str) -> ModelResult<Value> {
        let data = self.read();
        let idx = data.index_of(name)?;
        Ok(data.fields[idx].value().clone())
    }

    /// Writes a field and marks it dirty, even when the value is unchanged.
    pub fn set_value(&self, name: &str, value: Value) -> ModelResult<()> {
        let mut data = self.write();
        let idx = data.index_of(name)?;
        let value = data.schema.fields[idx].coerce(value)?;
        data.fields[idx].set_value(value);
        Ok(())
    }

    pub fn load_value(&self, name: &str, value: Value) -> ModelResult<()> {
        let mut data = self.write();
        let idx = data.index_of(name)?;
        let value = data.schema.fields[idx].coerce(value)?;
        data.fields[idx].load_value(value);
        Ok(())
    }

    /// Replaces a field value and its dirty flag verbatim.
    pub fn restore_field(&self, name: &str, value: Value, is_dirty: bool) -> ModelResult<()> {
        let mut data = self.write();
        let idx = data.index_of(name)?;
        let value = data.schema.fields[idx].coerce(value)?;
        data.fields[idx].load_value(value);
        data.fields[idx].restore_dirty(is_dirty);
        Ok(())
    }

    pub fn restore_state(&self, state: LifecycleState) {
        self.write().state = state;
    }

    /// Returns a copy of one field container. Child values are shared.
    pub fn field(&self, name: &str) -> ModelResult<FieldData<Value>> {
        let data = self.read();
        let idx = data.index_of(name)?;
        Ok(data.fields[idx].clone())
    }

    pub fn mark_field_clean(&self, name: &str) -> ModelResult<()> {
        let mut data = self.write();
        let idx = data.index_of(name)?;
        data.fields[idx].mark_clean();
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Marks the entity as new and unsaved.
    pub fn mark_new(&self) {
        let mut data = self.write();
        data.state.is_new = true;
        data.state.is_deleted = false;
        data.state.is_self_dirty = true;
    }

    /// Marks the entity as persisted and clears its own change flags.
    pub fn mark_old(&self) {
        let mut data = self.write();
        data.state.is_new = false;
        Self::clean(&mut data);
    }

    pub fn mark_deleted(&self) {
        let mut data = self.write();
        data.state.is_deleted = true;
        data.state.is_self_dirty = true;
    }

    pub fn mark_child(&self) {
        self.write().state.is_child = true;
    }

    pub fn mark_dirty(&self) {
        self.write().state.is_self_dirty = true;
    }

    /// Clears the entity's own flag and each field's own flag. Children are
    /// not touched.
    pub fn mark_clean(&self) {
        Self::clean(&mut self.write());
    }

    fn clean(data: &mut EntityData) {
        data.state.is_self_dirty = false;
        for field in &mut data.fields {
            field.mark_clean();
        }
    }

    pub fn mark_busy(&self) {
        self.write().state.is_busy = true;
    }

    pub fn mark_idle(&self) {
        self.write().state.is_busy = false;
    }

    pub fn set_self_valid(&self, valid: bool) {
        self.write().state.is_self_valid = valid;
    }

    // ── Graph walk ───────────────────────────────────────────────

    /// Detaches this entity and everything reachable from it from their
    /// children, so a cyclic graph is freed once its handles are dropped.
    /// Scalar fields and flags are kept.
    pub fn release_graph(&self) {
        Node::Entity(self.clone()).release_graph();
    }

    /// Nulls every node-valued field and returns the nodes they held.
    pub(crate) fn take_children(&self) -> Vec<Node> {
        let mut data = self.write();
        let mut children = Vec::new();
        for field in &mut data.fields {
            if let Some(node) = field.value().as_node() {
                field.load_value(Value::Null);
                children.push(node);
            }
        }
        children
    }

    /// Evaluates `query` over this entity and everything reachable from it.
    /// The node lock is released before descending into children.
    pub(crate) fn walk(&self, query: Query, seen: &mut HashSet<NodeKey>) -> bool {
        if !seen.insert(self.key()) {
            return query.neutral();
        }
        let (own, children) = {
            let data = self.read();
            let own = match query {
                Query::Dirty => {
                    data.state.is_self_dirty || data.fields.iter().any(|f| f.is_self_dirty())
                }
                Query::Valid => data.state.is_self_valid,
                Query::Busy => data.state.is_busy,
            };
            let children: Vec<Node> = data
                .fields
                .iter()
                .filter_map(|f| f.value().as_node())
                .collect();
            (own, children)
        };
        match query {
            Query::Valid => own && children.iter().all(|c| c.walk(query, seen)),
            Query::Dirty | Query::Busy => own || children.iter().any(|c| c.walk(query, seen)),
        }
    }
}

impl TrackStatus for EntityRef {
    fn is_dirty(&self) -> bool {
        self.walk(Query::Dirty, &mut HashSet::new())
    }

    fn is_self_dirty(&self) -> bool {
        let data = self.read();
        data.state.is_self_dirty || data.fields.iter().any(|f| f.is_self_dirty())
    }

    fn is_valid(&self) -> bool {
        self.walk(Query::Valid, &mut HashSet::new())
    }

    fn is_self_valid(&self) -> bool {
        self.read().state.is_self_valid
    }

    fn is_busy(&self) -> bool {
        self.walk(Query::Busy, &mut HashSet::new())
    }

    fn is_new(&self) -> bool {
        self.read().state.is_new
    }

    fn is_deleted(&self) -> bool {
        self.read().state.is_deleted
    }

    fn is_child(&self) -> bool {
        self.read().state.is_child
    }
}

impl Trackable for EntityRef {
    fn tracked(&self) -> Option<&dyn TrackStatus> {
        Some(self)
    }
}

impl fmt::Debug for EntityRef {
    // Shallow on purpose: graphs may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("EntityRef");
        match self.0.try_read() {
            Ok(data) => s.field("type", &data.schema.entity_type),
            Err(_) => s.field("type", &"<locked>"),
        };
        s.field("key", &format_args!("{:#x}", self.key())).finish()
    }
}
