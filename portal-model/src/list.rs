//! Child collections: ordered child entities plus removed-but-persisted items.

use crate::entity::EntityRef;
use crate::error::{ModelError, ModelResult};
use crate::node::{Node, NodeKey};
use crate::status::{Query, TrackStatus, Trackable};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct ListData {
    items: Vec<EntityRef>,
    /// Items removed from the list that still need a delete on save.
    deleted: Vec<EntityRef>,
}

/// Point-in-time copy of a list's membership.
#[derive(Debug, Clone, Default)]
pub struct ListSnapshot {
    pub items: Vec<EntityRef>,
    pub deleted: Vec<EntityRef>,
}

/// Shared handle to a collection of child entities.
#[derive(Clone, Default)]
pub struct ListRef(Arc<RwLock<ListData>>);

impl ListRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from existing entities, marking each as a child.
    pub fn from_items(items: Vec<EntityRef>) -> Self {
        for item in &items {
            item.mark_child();
        }
        Self(Arc::new(RwLock::new(ListData {
            items,
            deleted: Vec::new(),
        })))
    }

    fn read(&self) -> RwLockReadGuard<'_, ListData> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ListData> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn key(&self) -> NodeKey {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &ListRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn push(&self, item: EntityRef) {
        item.mark_child();
        self.write().items.push(item);
    }

    pub fn get(&self, index: usize) -> Option<EntityRef> {
        self.read().items.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }

    pub fn items(&self) -> Vec<EntityRef> {
        self.read().items.clone()
    }

    pub fn deleted_items(&self) -> Vec<EntityRef> {
        self.read().deleted.clone()
    }

    /// Removes the item at `index`. Items that were already persisted are
    /// marked deleted and kept in the deleted list; new items are dropped.
    pub fn remove(&self, index: usize) -> ModelResult<EntityRef> {
        let item = {
            let mut data = self.write();
            let len = data.items.len();
            if index >= len {
                return Err(ModelError::IndexOutOfRange { index, len });
            }
            data.items.remove(index)
        };
        if !item.is_new() {
            item.mark_deleted();
            self.write().deleted.push(item.clone());
        }
        Ok(item)
    }

    /// Forgets deleted items, typically after they were persisted.
    pub fn clear_deleted(&self) {
        self.write().deleted.clear();
    }

    pub fn snapshot(&self) -> ListSnapshot {
        let data = self.read();
        ListSnapshot {
            items: data.items.clone(),
            deleted: data.deleted.clone(),
        }
    }

    /// Replaces membership verbatim, without touching item flags.
    pub fn restore(&self, items: Vec<EntityRef>, deleted: Vec<EntityRef>) {
        let mut data = self.write();
        data.items = items;
        data.deleted = deleted;
    }

    /// See [`EntityRef::release_graph`].
    pub fn release_graph(&self) {
        Node::List(self.clone()).release_graph();
    }

    /// Empties the list and returns its former items and deleted items.
    pub(crate) fn take_children(&self) -> Vec<Node> {
        let mut data = self.write();
        let items = std::mem::take(&mut data.items);
        let deleted = std::mem::take(&mut data.deleted);
        items.into_iter().chain(deleted).map(Node::Entity).collect()
    }

    pub(crate) fn walk(&self, query: Query, seen: &mut HashSet<NodeKey>) -> bool {
        if !seen.insert(self.key()) {
            return query.neutral();
        }
        let (has_deleted, items) = {
            let data = self.read();
            (!data.deleted.is_empty(), data.items.clone())
        };
        let mut children = items.into_iter().map(Node::Entity);
        match query {
            Query::Dirty => has_deleted || children.any(|c| c.walk(query, seen)),
            Query::Valid => children.all(|c| c.walk(query, seen)),
            Query::Busy => children.any(|c| c.walk(query, seen)),
        }
    }
}

impl TrackStatus for ListRef {
    fn is_dirty(&self) -> bool {
        self.walk(Query::Dirty, &mut HashSet::new())
    }

    fn is_self_dirty(&self) -> bool {
        !self.read().deleted.is_empty()
    }

    fn is_valid(&self) -> bool {
        self.walk(Query::Valid, &mut HashSet::new())
    }

    fn is_self_valid(&self) -> bool {
        true
    }

    fn is_busy(&self) -> bool {
        self.walk(Query::Busy, &mut HashSet::new())
    }

    fn is_new(&self) -> bool {
        false
    }

    fn is_deleted(&self) -> bool {
        false
    }

    /// A list is always owned by the field that holds it.
    fn is_child(&self) -> bool {
        true
    }
}

impl Trackable for ListRef {
    fn tracked(&self) -> Option<&dyn TrackStatus> {
        Some(self)
    }
}

impl fmt::Debug for ListRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ListRef");
        if let Ok(data) = self.0.try_read() {
            s.field("len", &data.items.len())
                .field("deleted", &data.deleted.len());
        }
        s.field("key", &format_args!("{:#x}", self.key())).finish()
    }
}
