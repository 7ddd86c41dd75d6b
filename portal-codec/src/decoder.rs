use crate::error::{CodecError, CodecResult};
use crate::policy::SerializationPolicy;
use crate::records::{keys, EncodedValue, ReferenceId, ScalarValue, SerializationInfo};
use portal_model::{
    ContextMap, EntityRef, LifecycleState, ListRef, ModelError, Node, TypeRegistry, Value,
    LIST_TYPE_NAME,
};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// One decoding pass over a record sequence.
///
/// Construction does all the work: a placeholder per record first, then
/// every record populated once. Payload values and context entries encoded
/// in the same pass are then resolved against the rebuilt nodes.
pub struct GraphDecoder<'a> {
    registry: &'a TypeRegistry,
    policy: &'a dyn SerializationPolicy,
    objects: HashMap<ReferenceId, Node>,
    root: Option<ReferenceId>,
}

impl<'a> GraphDecoder<'a> {
    pub fn new(
        records: Vec<SerializationInfo>,
        registry: &'a TypeRegistry,
        policy: &'a dyn SerializationPolicy,
    ) -> CodecResult<Self> {
        let mut decoder = Self {
            registry,
            policy,
            objects: HashMap::with_capacity(records.len()),
            root: None,
        };
        for record in &records {
            decoder.create(record)?;
        }
        for record in &records {
            if let Err(e) = decoder.populate(record) {
                decoder.discard();
                return Err(e);
            }
        }
        debug!("Decoded {} records", records.len());
        Ok(decoder)
    }

    /// Runs `resolve` against the rebuilt graph. On failure the graph is
    /// discarded so nothing half-resolved outlives the pass.
    pub fn resolve_with<T>(
        self,
        resolve: impl FnOnce(&Self) -> CodecResult<T>,
    ) -> CodecResult<T> {
        let resolved = resolve(&self);
        if resolved.is_err() {
            self.discard();
        }
        resolved
    }

    /// Breaks every edge between the rebuilt nodes, so cyclic parts of the
    /// graph are freed along with the decoder.
    pub fn discard(self) {
        debug!("Discarding {} decoded records", self.objects.len());
        for node in self.objects.values() {
            node.release_graph();
        }
    }

    /// The node of the first record.
    pub fn root(&self) -> CodecResult<Node> {
        self.root
            .and_then(|id| self.objects.get(&id))
            .cloned()
            .ok_or(CodecError::EmptyStream)
    }

    pub fn node(&self, reference_id: ReferenceId) -> Option<Node> {
        self.objects.get(&reference_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn resolve(&self, encoded: &EncodedValue) -> CodecResult<Value> {
        match encoded {
            EncodedValue::Scalar(scalar) => self.scalar(scalar),
            EncodedValue::Ref(id) => Ok(self.lookup("<value>", *id)?.into_value()),
        }
    }

    pub fn resolve_context(
        &self,
        encoded: &BTreeMap<String, EncodedValue>,
    ) -> CodecResult<ContextMap> {
        encoded
            .iter()
            .map(|(key, value)| Ok((key.clone(), self.resolve(value)?)))
            .collect()
    }

    // ── Pass 1: placeholders ─────────────────────────────────────

    fn create(&mut self, record: &SerializationInfo) -> CodecResult<()> {
        if self.objects.contains_key(&record.reference_id) {
            return Err(CodecError::DuplicateRecord(record.reference_id));
        }
        let node = if record.type_name == LIST_TYPE_NAME {
            Node::List(ListRef::new())
        } else {
            let schema = self
                .registry
                .get(&record.type_name)
                .ok_or_else(|| CodecError::UnknownType(record.type_name.clone()))?;
            Node::Entity(EntityRef::with_state(schema, LifecycleState::default()))
        };
        self.root.get_or_insert(record.reference_id);
        self.objects.insert(record.reference_id, node);
        Ok(())
    }

    // ── Pass 2: populate ─────────────────────────────────────────

    fn populate(&self, record: &SerializationInfo) -> CodecResult<()> {
        match self.lookup("<record>", record.reference_id)? {
            Node::Entity(entity) => self.populate_entity(&entity, record),
            Node::List(list) => self.populate_list(&list, record),
        }
    }

    fn populate_entity(&self, entity: &EntityRef, record: &SerializationInfo) -> CodecResult<()> {
        entity.restore_state(read_state(record)?);

        for (name, entry) in &record.values {
            if name.starts_with('_') {
                continue;
            }
            let value = self.scalar(&entry.value)?;
            entity
                .restore_field(name, value, entry.is_dirty)
                .map_err(|e| field_error(record.reference_id, name, e))?;
        }

        for (name, slot) in &record.children {
            let child = self.lookup(name, slot.reference_id)?;
            entity
                .restore_field(name, child.into_value(), slot.is_dirty)
                .map_err(|e| field_error(record.reference_id, name, e))?;
        }
        Ok(())
    }

    fn populate_list(&self, list: &ListRef, record: &SerializationInfo) -> CodecResult<()> {
        let count = read_count(record, keys::COUNT)?;
        let deleted_count = read_count(record, keys::DELETED_COUNT)?;

        let items = (0..count)
            .map(|i| self.list_item(record, &keys::item(i)))
            .collect::<CodecResult<Vec<_>>>()?;
        let deleted = (0..deleted_count)
            .map(|i| self.list_item(record, &keys::deleted(i)))
            .collect::<CodecResult<Vec<_>>>()?;

        list.restore(items, deleted);
        Ok(())
    }

    fn list_item(&self, record: &SerializationInfo, slot: &str) -> CodecResult<EntityRef> {
        let child = record
            .children
            .get(slot)
            .ok_or_else(|| CodecError::MalformedRecord {
                reference_id: record.reference_id,
                detail: format!("missing list slot '{slot}'"),
            })?;
        match self.lookup(slot, child.reference_id)? {
            Node::Entity(entity) => Ok(entity),
            Node::List(_) => Err(CodecError::TypeMismatch {
                reference_id: record.reference_id,
                field: slot.to_string(),
                detail: "list items must be entities".to_string(),
            }),
        }
    }

    fn lookup(&self, slot: &str, reference_id: ReferenceId) -> CodecResult<Node> {
        self.objects
            .get(&reference_id)
            .cloned()
            .ok_or_else(|| CodecError::DanglingReference {
                slot: slot.to_string(),
                reference_id,
            })
    }

    fn scalar(&self, scalar: &ScalarValue) -> CodecResult<Value> {
        Ok(match scalar {
            ScalarValue::Null => Value::Null,
            ScalarValue::Bool(b) => Value::Bool(*b),
            ScalarValue::Int(i) => Value::Int(*i),
            ScalarValue::Float(f) => Value::Float(*f),
            ScalarValue::Text(s) => Value::Text(s.clone()),
            ScalarValue::Json(j) => Value::Json(j.clone()),
            ScalarValue::Opaque { type_name, data } => {
                if !self.policy.is_directly_encodable(type_name) {
                    return Err(CodecError::Unsupported {
                        type_name: type_name.clone(),
                    });
                }
                Value::Opaque(self.policy.decode_opaque(type_name, data.clone())?)
            }
        })
    }
}

fn read_state(record: &SerializationInfo) -> CodecResult<LifecycleState> {
    let defaults = LifecycleState::default();
    let flag = |key: &str, default: bool| -> CodecResult<bool> {
        match record.values.get(key) {
            None => Ok(default),
            Some(entry) => entry
                .value
                .as_bool()
                .ok_or_else(|| CodecError::MalformedRecord {
                    reference_id: record.reference_id,
                    detail: format!("'{key}' is not a bool"),
                }),
        }
    };
    Ok(LifecycleState {
        is_new: flag(keys::IS_NEW, defaults.is_new)?,
        is_deleted: flag(keys::IS_DELETED, defaults.is_deleted)?,
        is_child: flag(keys::IS_CHILD, defaults.is_child)?,
        is_self_dirty: flag(keys::IS_SELF_DIRTY, defaults.is_self_dirty)?,
        is_self_valid: flag(keys::IS_SELF_VALID, defaults.is_self_valid)?,
        is_busy: flag(keys::IS_BUSY, defaults.is_busy)?,
    })
}

fn read_count(record: &SerializationInfo, key: &str) -> CodecResult<usize> {
    record
        .values
        .get(key)
        .and_then(|entry| entry.value.as_int())
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| CodecError::MalformedRecord {
            reference_id: record.reference_id,
            detail: format!("missing or invalid '{key}'"),
        })
}

fn field_error(reference_id: ReferenceId, field: &str, err: ModelError) -> CodecError {
    match err {
        ModelError::TypeMismatch { .. } => CodecError::TypeMismatch {
            reference_id,
            field: field.to_string(),
            detail: err.to_string(),
        },
        other => CodecError::MalformedRecord {
            reference_id,
            detail: other.to_string(),
        },
    }
}
