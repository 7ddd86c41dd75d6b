//! Codec entry point bundling the type registry and serialization policy.

use crate::decoder::GraphDecoder;
use crate::encoder::GraphEncoder;
use crate::error::{CodecError, CodecResult};
use crate::policy::{SerializationPolicy, StrictPolicy};
use crate::records::SerializationInfo;
use portal_model::{EntityRef, Node, TypeRegistry};
use std::fmt;
use std::sync::Arc;

/// Encodes and decodes graphs of the types known to one registry.
///
/// Cheap to clone; both ends of a portal hold one.
#[derive(Clone)]
pub struct GraphCodec {
    registry: Arc<TypeRegistry>,
    policy: Arc<dyn SerializationPolicy>,
}

impl GraphCodec {
    /// A codec that rejects opaque values.
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_policy(registry, Arc::new(StrictPolicy))
    }

    pub fn with_policy(registry: Arc<TypeRegistry>, policy: Arc<dyn SerializationPolicy>) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &dyn SerializationPolicy {
        self.policy.as_ref()
    }

    /// Starts a pass that can encode several roots against one reference table.
    pub fn encoder(&self) -> GraphEncoder<'_> {
        GraphEncoder::new(self.policy.as_ref())
    }

    pub fn decoder(&self, records: Vec<SerializationInfo>) -> CodecResult<GraphDecoder<'_>> {
        GraphDecoder::new(records, &self.registry, self.policy.as_ref())
    }

    /// Encodes a single root in its own pass.
    pub fn encode(&self, root: &Node) -> CodecResult<Vec<SerializationInfo>> {
        let mut encoder = self.encoder();
        encoder.encode_node(root)?;
        Ok(encoder.finish())
    }

    /// Rebuilds the graph and returns the node of the first record.
    pub fn decode(&self, records: Vec<SerializationInfo>) -> CodecResult<Node> {
        self.decoder(records)?.root()
    }

    /// Like [`GraphCodec::decode`], for streams whose root must be an entity.
    pub fn decode_entity(&self, records: Vec<SerializationInfo>) -> CodecResult<EntityRef> {
        self.decoder(records)?.resolve_with(|decoder| match decoder.root()? {
            Node::Entity(entity) => Ok(entity),
            Node::List(_) => Err(CodecError::MalformedRecord {
                reference_id: crate::records::FIRST_REFERENCE_ID,
                detail: "root record is a list, expected an entity".to_string(),
            }),
        })
    }

    /// Deep-copies a graph by running it through a full encode/decode pass.
    /// Sharing and cycles are preserved inside the copy; nothing is shared
    /// with the source.
    pub fn clone_graph(&self, root: &Node) -> CodecResult<Node> {
        self.decode(self.encode(root)?)
    }
}

impl fmt::Debug for GraphCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphCodec")
            .field("types", &self.registry.type_names().count())
            .finish_non_exhaustive()
    }
}
