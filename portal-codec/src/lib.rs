//! Reference-preserving graph codec for the data portal.
//!
//! Flattens an object graph (entities, child lists, context maps) into an
//! ordered sequence of [`SerializationInfo`] records and rebuilds the same
//! graph on the other side.
//!
//! # Encoding
//!
//! Depth-first from each root. A node seen for the first time gets the next
//! reference id (starting at [`FIRST_REFERENCE_ID`]) and its record is
//! emitted *before* its children are visited, so records are in pre-order
//! and cycles terminate: a node met again, directly or around a cycle,
//! becomes a pointer to its existing id.
//!
//! Scalars are written inline. Entities and lists become child slots that
//! carry the holding field's dirty flag at encode time.
//!
//! # Decoding
//!
//! One placeholder per record is built before anything is populated, then
//! each record is applied exactly once. Every slot naming the same id
//! resolves to the same instance, and dirty flags are restored verbatim.
//! Decoding is all-or-nothing: any error drops the partial graph.
//!
//! # Example
//!
//! ```
//! use portal_codec::GraphCodec;
//! use portal_model::{EntitySchema, FieldDef, Node, TypeRegistry};
//! use std::sync::Arc;
//!
//! let mut registry = TypeRegistry::new();
//! registry.register(EntitySchema::new("Note", vec![FieldDef::text("title")])).unwrap();
//! let codec = GraphCodec::new(Arc::new(registry));
//!
//! let note = codec.registry().create("Note").unwrap();
//! let records = codec.encode(&Node::Entity(note)).unwrap();
//! assert_eq!(records.len(), 1);
//! let copy = codec.decode(records).unwrap();
//! assert!(matches!(copy, Node::Entity(_)));
//! ```

mod decoder;
mod encoder;
mod error;
mod formatter;
pub mod frame;
mod policy;
pub mod records;

pub use decoder::GraphDecoder;
pub use encoder::GraphEncoder;
pub use error::{CodecError, CodecErrorKind, CodecResult};
pub use formatter::GraphCodec;
pub use frame::{read_frame, write_frame, MAX_FRAME_SIZE};
pub use policy::{OpaqueRegistry, SerializationPolicy, StrictPolicy};
pub use records::{
    ChildSlot, EncodedValue, FieldEntry, ReferenceId, ScalarValue, SerializationInfo,
    FIRST_REFERENCE_ID,
};
