//! Conflict predicates for embedded relationship slots.
//!
//! Pure functions over the storing-side row's `(relationship id, other
//! endpoint)` column pair, used to diagnose a conditional slot update that
//! affected no rows.

/// Whether the slot already holds a different relationship instance. The
/// embedded slot can hold exactly one, so this is how an embedded type's
/// single-partner cardinality surfaces.
#[must_use]
pub fn slot_occupied_by_other(stored_relationship_id: Option<&str>, incoming_id: &str) -> bool {
    stored_relationship_id.is_some_and(|stored| stored != incoming_id)
}

/// Whether the slot holds this relationship id bound to a different other
/// endpoint — a violation of the id-determinism invariant (the id is
/// derived from the endpoint pair upstream).
#[must_use]
pub fn same_relationship_different_endpoint(
    stored_relationship_id: Option<&str>,
    stored_endpoint_id: Option<&str>,
    incoming_id: &str,
    incoming_endpoint_id: &str,
) -> bool {
    stored_relationship_id == Some(incoming_id) && stored_endpoint_id != Some(incoming_endpoint_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_conflicts_with_nothing() {
        assert!(!slot_occupied_by_other(None, "rel-1"));
        assert!(!same_relationship_different_endpoint(
            None,
            None,
            "rel-1",
            "node-1"
        ));
    }

    #[test]
    fn occupied_by_other_relationship() {
        assert!(slot_occupied_by_other(Some("rel-2"), "rel-1"));
        assert!(!slot_occupied_by_other(Some("rel-1"), "rel-1"));
    }

    #[test]
    fn same_id_different_endpoint() {
        assert!(same_relationship_different_endpoint(
            Some("rel-1"),
            Some("node-2"),
            "rel-1",
            "node-1"
        ));
        assert!(!same_relationship_different_endpoint(
            Some("rel-1"),
            Some("node-1"),
            "rel-1",
            "node-1"
        ));
        // A different id in the slot is occupancy, not a collision.
        assert!(!same_relationship_different_endpoint(
            Some("rel-2"),
            Some("node-2"),
            "rel-1",
            "node-1"
        ));
    }

    #[test]
    fn missing_endpoint_counts_as_mismatch() {
        assert!(same_relationship_different_endpoint(
            Some("rel-1"),
            None,
            "rel-1",
            "node-1"
        ));
    }
}
