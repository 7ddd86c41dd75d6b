//! Per-call context dictionaries.

use crate::value::Value;
use std::collections::BTreeMap;

/// An ordered key/value bag threaded explicitly through a portal call.
///
/// Used for both the client context (travels outbound only) and the global
/// context (travels outbound, and the executor's copy travels back).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextMap(BTreeMap<String, Value>);

impl ContextMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Applies an executor's returned copy onto this one.
    ///
    /// Keys present in `sent` but missing from `returned` were removed by
    /// the executor and are removed here too; every returned key overwrites.
    pub fn merge_returned(&mut self, sent: &ContextMap, returned: ContextMap) {
        for key in sent.0.keys() {
            if !returned.0.contains_key(key) {
                self.0.remove(key);
            }
        }
        self.0.extend(returned.0);
    }
}

impl FromIterator<(String, Value)> for ContextMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ContextMap {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
