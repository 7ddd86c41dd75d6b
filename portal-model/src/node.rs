//! Graph nodes: the trackable values that become their own codec records.

use crate::entity::EntityRef;
use crate::list::ListRef;
use crate::status::Query;
use crate::value::Value;
use std::collections::HashSet;

/// Identity of a node: stable for as long as any handle to it is alive.
pub type NodeKey = usize;

/// A shared, trackable node in an object graph.
#[derive(Debug, Clone)]
pub enum Node {
    Entity(EntityRef),
    List(ListRef),
}

impl Node {
    pub fn key(&self) -> NodeKey {
        match self {
            Node::Entity(e) => e.key(),
            Node::List(l) => l.key(),
        }
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        self.key() == other.key()
    }

    pub fn into_value(self) -> Value {
        match self {
            Node::Entity(e) => Value::Entity(e),
            Node::List(l) => Value::List(l),
        }
    }

    /// Breaks every edge in the graph reachable from this node.
    ///
    /// Each node's child references are cleared one lock at a time; nothing
    /// else about the nodes changes. Afterwards dropping the outside handles
    /// frees the graph even if it contained cycles.
    pub fn release_graph(&self) {
        let mut seen = HashSet::new();
        let mut pending = vec![self.clone()];
        while let Some(node) = pending.pop() {
            if !seen.insert(node.key()) {
                continue;
            }
            let children = match &node {
                Node::Entity(e) => e.take_children(),
                Node::List(l) => l.take_children(),
            };
            pending.extend(children);
        }
    }

    pub(crate) fn walk(&self, query: Query, seen: &mut HashSet<NodeKey>) -> bool {
        match self {
            Node::Entity(e) => e.walk(query, seen),
            Node::List(l) => l.walk(query, seen),
        }
    }
}

impl From<EntityRef> for Node {
    fn from(e: EntityRef) -> Self {
        Node::Entity(e)
    }
}

impl From<ListRef> for Node {
    fn from(l: ListRef) -> Self {
        Node::List(l)
    }
}
