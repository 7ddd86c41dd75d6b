use portal_model::{EntityRef, EntitySchema, FieldData, FieldDef, TrackStatus};
use proptest::prelude::*;
use std::sync::Arc;

fn address_schema() -> Arc<EntitySchema> {
    Arc::new(EntitySchema::new("Address", vec![FieldDef::text("city")]))
}

fn clean_address() -> EntityRef {
    let a = EntityRef::new(address_schema());
    a.mark_old();
    a
}

// ── Scalar containers ────────────────────────────────────────────

#[test]
fn new_container_is_clean() {
    let f = FieldData::new("name", "Alice".to_string());
    assert_eq!(f.name(), "name");
    assert_eq!(f.value(), "Alice");
    assert!(!f.is_dirty());
    assert!(!f.is_self_dirty());
}

#[test]
fn set_value_marks_dirty() {
    let mut f = FieldData::new("count", 1i64);
    f.set_value(2);
    assert_eq!(*f.value(), 2);
    assert!(f.is_dirty());
}

#[test]
fn equal_write_still_marks_dirty() {
    let mut f = FieldData::new("name", "same".to_string());
    f.set_value("same".to_string());
    assert!(f.is_dirty());
}

#[test]
fn mark_clean_clears_flag() {
    let mut f = FieldData::new("flag", true);
    f.set_value(false);
    f.mark_clean();
    assert!(!f.is_dirty());
}

#[test]
fn load_value_does_not_mark_dirty() {
    let mut f = FieldData::new("name", String::new());
    f.load_value("loaded".into());
    assert_eq!(f.value(), "loaded");
    assert!(!f.is_dirty());
}

#[test]
fn with_state_restores_flag() {
    let f = FieldData::with_state("name", "x".to_string(), true);
    assert!(f.is_dirty());
}

#[test]
fn scalar_status_defaults() {
    let f = FieldData::new("n", 5i64);
    assert!(f.is_valid());
    assert!(!f.is_busy());
    assert!(!f.is_new());
    assert!(!f.is_deleted());
    assert!(!f.is_child());
}

// ── Trackable containers ─────────────────────────────────────────

#[test]
fn clean_container_with_dirty_child_is_dirty() {
    let child = clean_address();
    let f = FieldData::new("address", child.clone());
    assert!(!f.is_dirty());

    child.set_value("city", "Springfield".into()).unwrap();
    assert!(!f.is_self_dirty());
    assert!(f.is_dirty());
}

#[test]
fn mark_clean_does_not_cascade_into_child() {
    let child = clean_address();
    let mut f = FieldData::new("address", child.clone());
    f.set_value(child.clone());
    child.set_value("city", "Shelbyville".into()).unwrap();

    f.mark_clean();
    assert!(f.is_dirty(), "dirty child keeps the container dirty");

    child.mark_clean();
    assert!(!f.is_dirty());
}

#[test]
fn status_delegates_to_child() {
    let child = clean_address();
    let f = FieldData::new("address", child.clone());

    child.set_self_valid(false);
    assert!(!f.is_valid());

    child.mark_busy();
    assert!(f.is_busy());

    child.mark_child();
    assert!(f.is_child());

    child.mark_deleted();
    assert!(f.is_deleted());

    child.mark_new();
    assert!(f.is_new());
}

#[test]
fn optional_child_none_uses_defaults() {
    let f: FieldData<Option<EntityRef>> = FieldData::new("address", None);
    assert!(!f.is_dirty());
    assert!(f.is_valid());
    assert!(!f.is_child());
}

#[test]
fn optional_child_some_delegates() {
    let child = clean_address();
    child.mark_dirty();
    let f = FieldData::new("address", Some(child));
    assert!(f.is_dirty());
}

// ── Properties ───────────────────────────────────────────────────

proptest! {
    /// After mark_clean a scalar container is clean, whatever came before.
    #[test]
    fn mark_clean_after_any_writes(writes in proptest::collection::vec(any::<i64>(), 0..20)) {
        let mut f = FieldData::new("n", 0i64);
        for w in &writes {
            f.set_value(*w);
        }
        prop_assert_eq!(f.is_dirty(), !writes.is_empty());
        f.mark_clean();
        prop_assert!(!f.is_dirty());
    }

    /// A container is dirty iff its own flag or its child is dirty.
    #[test]
    fn dirty_is_own_flag_or_child(own in any::<bool>(), child_dirty in any::<bool>()) {
        let child = clean_address();
        if child_dirty {
            child.mark_dirty();
        }
        let f = FieldData::with_state("address", child, own);
        prop_assert_eq!(f.is_dirty(), own || child_dirty);
    }
}
