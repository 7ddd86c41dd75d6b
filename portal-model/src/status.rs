//! Status tracking shared by entities, child lists and field containers.

/// Status queries exposed by every trackable node.
///
/// Aggregate queries (`is_dirty`, `is_valid`, `is_busy`) include children;
/// the `is_self_*` variants look at the node's own flags only.
pub trait TrackStatus {
    fn is_dirty(&self) -> bool;
    fn is_self_dirty(&self) -> bool;
    fn is_valid(&self) -> bool;
    fn is_self_valid(&self) -> bool;
    fn is_busy(&self) -> bool;
    fn is_new(&self) -> bool;
    fn is_deleted(&self) -> bool;
    fn is_child(&self) -> bool;

    /// Whether a save would make sense right now.
    fn is_savable(&self) -> bool {
        self.is_dirty() && self.is_valid() && !self.is_busy() && !self.is_child()
    }
}

/// Values a [`FieldData`](crate::FieldData) can hold.
///
/// Returns the nested status source when the value is itself trackable, so
/// the container can delegate its status queries to it.
pub trait Trackable {
    fn tracked(&self) -> Option<&dyn TrackStatus> {
        None
    }
}

impl Trackable for String {}
impl Trackable for i64 {}
impl Trackable for f64 {}
impl Trackable for bool {}
impl Trackable for serde_json::Value {}

impl<T: Trackable> Trackable for Option<T> {
    fn tracked(&self) -> Option<&dyn TrackStatus> {
        self.as_ref().and_then(Trackable::tracked)
    }
}

/// Aggregate query evaluated by a graph walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Query {
    Dirty,
    Valid,
    Busy,
}

impl Query {
    /// Result for a node already visited in this walk. Chosen so a revisit
    /// never changes the aggregate: `false` for any-of, `true` for all-of.
    pub(crate) fn neutral(self) -> bool {
        matches!(self, Query::Valid)
    }
}
