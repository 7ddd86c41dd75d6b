//! Trackable entity model for the data portal.
//!
//! Defines the object graph the portal moves between tiers:
//! - [`FieldData`]: the per-property field state container (value + dirty flag)
//! - [`EntityRef`]: a shared handle to an entity whose fields are fixed by its schema
//! - [`ListRef`]: a shared handle to a collection of child entities
//! - [`EntitySchema`] / [`PropertyInfo`]: the explicit per-type field declarations
//! - [`TypeRegistry`]: entity type name to schema, used when rebuilding graphs
//! - [`TrackStatus`]: dirty/valid/busy/new/deleted/child queries
//!
//! Graphs may share nodes and may be cyclic. Status queries walk the graph
//! with a visited set, and never hold more than one node lock at a time.
//! Nodes are reference counted: a cyclic graph stays alive until
//! [`Node::release_graph`] breaks its edges.

mod context;
mod entity;
mod error;
mod field_data;
mod list;
mod node;
mod observers;
mod registry;
mod schema;
mod status;
mod value;

pub use context::ContextMap;
pub use entity::{EntityRef, EntitySnapshot, LifecycleState};
pub use error::{ModelError, ModelResult};
pub use field_data::FieldData;
pub use list::{ListRef, ListSnapshot};
pub use node::{Node, NodeKey};
pub use observers::{ObserverList, SubscriptionId};
pub use registry::TypeRegistry;
pub use schema::{EntitySchema, FieldDef, FieldType, PropertyInfo, LIST_TYPE_NAME};
pub use status::{TrackStatus, Trackable};
pub use value::{FromValue, OpaqueValue, Value};
