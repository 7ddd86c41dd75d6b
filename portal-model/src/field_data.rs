//! Field state container: one property's value plus its dirty flag.

use crate::status::Trackable;

/// Contains one field value and its change-tracking state.
///
/// `set_value` always marks the field dirty, even when the new value equals
/// the old one; dirtiness is sticky until [`FieldData::mark_clean`].
///
/// When the value is itself trackable the status queries delegate to it:
/// a clean container holding a dirty child reports dirty.
#[derive(Debug, Clone)]
pub struct FieldData<T> {
    name: String,
    value: T,
    is_dirty: bool,
}

impl<T> FieldData<T> {
    /// Creates a clean container.
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value,
            is_dirty: false,
        }
    }

    /// Creates a container with an explicit dirty flag (used when rebuilding
    /// a decoded graph, where the flag is restored rather than derived).
    pub fn with_state(name: impl Into<String>, value: T, is_dirty: bool) -> Self {
        Self {
            name: name.into(),
            value,
            is_dirty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    /// Replaces the value and marks the field dirty.
    pub fn set_value(&mut self, value: T) {
        self.value = value;
        self.is_dirty = true;
    }

    /// Replaces the value without touching the dirty flag.
    pub fn load_value(&mut self, value: T) {
        self.value = value;
    }

    /// The container's own flag, ignoring any nested value.
    pub fn is_self_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Clears the container's own flag. A dirty nested value stays dirty.
    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    pub(crate) fn restore_dirty(&mut self, is_dirty: bool) {
        self.is_dirty = is_dirty;
    }
}

impl<T: Trackable> FieldData<T> {
    pub fn is_dirty(&self) -> bool {
        self.is_dirty || self.value.tracked().is_some_and(|t| t.is_dirty())
    }

    pub fn is_valid(&self) -> bool {
        self.value.tracked().is_none_or(|t| t.is_valid())
    }

    pub fn is_busy(&self) -> bool {
        self.value.tracked().is_some_and(|t| t.is_busy())
    }

    pub fn is_new(&self) -> bool {
        self.value.tracked().is_some_and(|t| t.is_new())
    }

    pub fn is_deleted(&self) -> bool {
        self.value.tracked().is_some_and(|t| t.is_deleted())
    }

    pub fn is_child(&self) -> bool {
        self.value.tracked().is_some_and(|t| t.is_child())
    }
}
