use crate::error::{CodecError, CodecResult};
use crate::policy::SerializationPolicy;
use crate::records::{
    keys, EncodedValue, ReferenceId, ScalarValue, SerializationInfo, FIRST_REFERENCE_ID,
};
use portal_model::{
    ContextMap, EntityRef, LifecycleState, ListRef, Node, NodeKey, TrackStatus, Value,
    LIST_TYPE_NAME,
};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

struct PendingChild {
    slot: String,
    is_dirty: bool,
    node: Node,
}

/// A record whose child slots are still being visited.
struct Frame {
    record: usize,
    pending: std::vec::IntoIter<PendingChild>,
}

/// One encoding pass.
///
/// The reference table lives inside the encoder, so identifiers are scoped
/// to this pass: every root, payload and context entry encoded through the
/// same encoder shares nodes, and a new encoder starts again at
/// [`FIRST_REFERENCE_ID`].
pub struct GraphEncoder<'a> {
    policy: &'a dyn SerializationPolicy,
    table: HashMap<NodeKey, ReferenceId>,
    /// Keeps every tabled node alive so its key cannot be reused mid-pass.
    pinned: Vec<Node>,
    records: Vec<SerializationInfo>,
    stack: Vec<Frame>,
}

impl<'a> GraphEncoder<'a> {
    pub fn new(policy: &'a dyn SerializationPolicy) -> Self {
        Self {
            policy,
            table: HashMap::new(),
            pinned: Vec::new(),
            records: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Encodes `root` and everything reachable from it, returning its id.
    /// A node already encoded in this pass is not emitted again.
    ///
    /// On failure the encoder is left as it was before the call: records and
    /// table entries from the failed traversal are dropped, so ids stay
    /// dense for whatever is encoded next.
    pub fn encode_node(&mut self, root: &Node) -> CodecResult<ReferenceId> {
        if let Some(id) = self.table.get(&root.key()) {
            return Ok(*id);
        }
        let (records, pinned) = (self.records.len(), self.pinned.len());
        let result = self.traverse(root);
        if result.is_err() {
            self.stack.clear();
            self.records.truncate(records);
            for node in self.pinned.drain(pinned..) {
                self.table.remove(&node.key());
            }
        }
        result
    }

    /// Depth-first, pre-order traversal with an explicit stack: a node's
    /// record is emitted when it is first reached, its children afterwards.
    fn traverse(&mut self, root: &Node) -> CodecResult<ReferenceId> {
        let root_id = self.begin(root)?;
        while let Some((record, child)) = self.next_pending() {
            let id = match self.table.get(&child.node.key()) {
                Some(id) => *id,
                None => self.begin(&child.node)?,
            };
            self.records[record].add_child(child.slot, id, child.is_dirty);
        }
        Ok(root_id)
    }

    fn next_pending(&mut self) -> Option<(usize, PendingChild)> {
        loop {
            let frame = self.stack.last_mut()?;
            if let Some(child) = frame.pending.next() {
                return Some((frame.record, child));
            }
            self.stack.pop();
        }
    }

    /// Assigns the next id, emits the node's record and tables the node.
    fn begin(&mut self, node: &Node) -> CodecResult<ReferenceId> {
        let id = FIRST_REFERENCE_ID + self.records.len() as ReferenceId;
        let (record, pending) = match node {
            Node::Entity(entity) => self.entity_record(id, entity)?,
            Node::List(list) => list_record(id, list),
        };
        self.table.insert(node.key(), id);
        self.pinned.push(node.clone());
        self.records.push(record);
        self.stack.push(Frame {
            record: self.records.len() - 1,
            pending: pending.into_iter(),
        });
        Ok(id)
    }

    fn entity_record(
        &self,
        id: ReferenceId,
        entity: &EntityRef,
    ) -> CodecResult<(SerializationInfo, Vec<PendingChild>)> {
        let snapshot = entity.snapshot();
        let mut record = SerializationInfo::new(id, snapshot.schema.entity_type.clone());
        write_state(&mut record, snapshot.state);

        let mut pending = Vec::new();
        for field in snapshot.fields {
            let is_dirty = field.is_self_dirty();
            let slot = field.name().to_string();
            match field.into_value() {
                Value::Entity(e) => pending.push(PendingChild {
                    slot,
                    is_dirty,
                    node: Node::Entity(e),
                }),
                Value::List(l) => pending.push(PendingChild {
                    slot,
                    is_dirty,
                    node: Node::List(l),
                }),
                other => {
                    let scalar = self.scalar(&other)?;
                    record.add_value(slot, scalar, is_dirty);
                }
            }
        }
        Ok((record, pending))
    }

    fn scalar(&self, value: &Value) -> CodecResult<ScalarValue> {
        Ok(match value {
            Value::Null => ScalarValue::Null,
            Value::Bool(b) => ScalarValue::Bool(*b),
            Value::Int(i) => ScalarValue::Int(*i),
            Value::Float(f) if f.is_finite() => ScalarValue::Float(*f),
            Value::Float(f) => {
                return Err(CodecError::Serialization(format!(
                    "non-finite float {f} cannot be encoded"
                )));
            }
            Value::Text(s) => ScalarValue::Text(s.clone()),
            Value::Json(j) => ScalarValue::Json(j.clone()),
            Value::Opaque(opaque) => {
                if !self.policy.is_directly_encodable(opaque.type_name()) {
                    return Err(CodecError::Unsupported {
                        type_name: opaque.type_name().to_string(),
                    });
                }
                ScalarValue::Opaque {
                    type_name: opaque.type_name().to_string(),
                    data: self.policy.encode_opaque(opaque)?,
                }
            }
            Value::Entity(_) | Value::List(_) => {
                return Err(CodecError::Serialization(format!(
                    "{} cannot be written inline",
                    value.kind_name()
                )));
            }
        })
    }

    /// Encodes a free-standing value: nodes become references into this
    /// pass's records, scalars stay inline.
    pub fn encode_value(&mut self, value: &Value) -> CodecResult<EncodedValue> {
        match value.as_node() {
            Some(node) => Ok(EncodedValue::Ref(self.encode_node(&node)?)),
            None => Ok(EncodedValue::Scalar(self.scalar(value)?)),
        }
    }

    pub fn encode_context(
        &mut self,
        context: &ContextMap,
    ) -> CodecResult<BTreeMap<String, EncodedValue>> {
        context
            .iter()
            .map(|(key, value)| Ok((key.clone(), self.encode_value(value)?)))
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Ends the pass and returns the records in pre-order.
    pub fn finish(self) -> Vec<SerializationInfo> {
        debug!(
            "Encoded {} records ({} nodes tabled)",
            self.records.len(),
            self.pinned.len()
        );
        self.records
    }
}

fn write_state(record: &mut SerializationInfo, state: LifecycleState) {
    for (key, flag) in [
        (keys::IS_NEW, state.is_new),
        (keys::IS_DELETED, state.is_deleted),
        (keys::IS_CHILD, state.is_child),
        (keys::IS_SELF_DIRTY, state.is_self_dirty),
        (keys::IS_SELF_VALID, state.is_self_valid),
        (keys::IS_BUSY, state.is_busy),
    ] {
        record.add_value(key, ScalarValue::Bool(flag), false);
    }
}

/// List items carry no field container, so their slots record the item's
/// own dirty flag.
fn list_record(id: ReferenceId, list: &ListRef) -> (SerializationInfo, Vec<PendingChild>) {
    let snapshot = list.snapshot();
    let mut record = SerializationInfo::new(id, LIST_TYPE_NAME);
    record.add_value(keys::COUNT, ScalarValue::Int(snapshot.items.len() as i64), false);
    record.add_value(
        keys::DELETED_COUNT,
        ScalarValue::Int(snapshot.deleted.len() as i64),
        false,
    );

    let items = snapshot
        .items
        .into_iter()
        .enumerate()
        .map(|(i, item)| (keys::item(i), item));
    let deleted = snapshot
        .deleted
        .into_iter()
        .enumerate()
        .map(|(i, item)| (keys::deleted(i), item));
    let pending = items
        .chain(deleted)
        .map(|(slot, item)| PendingChild {
            slot,
            is_dirty: item.is_self_dirty(),
            node: Node::Entity(item),
        })
        .collect();
    (record, pending)
}
