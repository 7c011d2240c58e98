//! Per-operation outcome records.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::event::Relationship;

/// Key under which a relationship result reports its A-side endpoint.
pub const PROPERTY_A_SIDE: &str = "aSide";
/// Key under which a relationship result reports its B-side endpoint.
pub const PROPERTY_B_SIDE: &str = "bSide";

/// The outcome of one applied operation, returned to the caller for
/// metrics and notification; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    /// The entity or relationship id.
    pub id: String,
    /// The type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// What was written: the attribute map for entity merges, the endpoint
    /// pair for relationship merges, the empty map for auto-created
    /// placeholders, `None` for deletions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, serde_json::Value>>,
}

impl OperationResult {
    /// A merged entity with the attributes that were written.
    pub fn entity(
        id: impl Into<String>,
        type_name: impl Into<String>,
        attributes: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            attributes: Some(attributes),
        }
    }

    /// A placeholder entity auto-created to satisfy a foreign key.
    pub fn placeholder(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            attributes: Some(BTreeMap::new()),
        }
    }

    /// A deleted entity row or cleared relationship.
    pub fn deletion(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            attributes: None,
        }
    }

    /// A merged relationship, reporting its endpoint pair.
    #[must_use]
    pub fn from_relationship(relationship: &Relationship) -> Self {
        let mut sides = BTreeMap::new();
        sides.insert(
            PROPERTY_A_SIDE.to_string(),
            serde_json::Value::String(relationship.a_side.clone()),
        );
        sides.insert(
            PROPERTY_B_SIDE.to_string(),
            serde_json::Value::String(relationship.b_side.clone()),
        );
        Self {
            id: relationship.id.clone(),
            type_name: relationship.relation_type.clone(),
            attributes: Some(sides),
        }
    }
}
