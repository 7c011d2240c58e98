//! Change records consumed by the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use topodb_schema::{RelationType, Side};

/// A change record for one graph node.
///
/// Constructed by the event-parsing layer from one wire event and consumed
/// exactly once by the merge engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// The entity type name, resolved via the registry.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Globally unique id within the type's table.
    pub id: String,
    /// Attribute values, semantically typed per the registry.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Ordered provenance identifiers, if any.
    #[serde(rename = "sourceIds", default, skip_serializing_if = "Option::is_none")]
    pub source_ids: Option<Vec<String>>,
}

impl Entity {
    /// Creates an entity record with no attributes.
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            attributes: BTreeMap::new(),
            source_ids: None,
        }
    }

    /// Adds an attribute value.
    #[must_use]
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Sets the provenance source-id list.
    #[must_use]
    pub fn with_source_ids(mut self, source_ids: Vec<String>) -> Self {
        self.source_ids = Some(source_ids);
        self
    }
}

/// A change record for one graph edge.
///
/// The id is derived deterministically from `(type, aSide, bSide)` by the
/// producer; the engine rejects an id reused with a different pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// The relationship type name.
    #[serde(rename = "type")]
    pub relation_type: String,
    /// The relationship id.
    pub id: String,
    /// Id of the A-side entity.
    #[serde(rename = "aSide")]
    pub a_side: String,
    /// Id of the B-side entity.
    #[serde(rename = "bSide")]
    pub b_side: String,
    /// Ordered provenance identifiers, if any.
    #[serde(rename = "sourceIds", default, skip_serializing_if = "Option::is_none")]
    pub source_ids: Option<Vec<String>>,
}

impl Relationship {
    /// Creates a relationship record.
    pub fn new(
        relation_type: impl Into<String>,
        id: impl Into<String>,
        a_side: impl Into<String>,
        b_side: impl Into<String>,
    ) -> Self {
        Self {
            relation_type: relation_type.into(),
            id: id.into(),
            a_side: a_side.into(),
            b_side: b_side.into(),
            source_ids: None,
        }
    }

    /// Sets the provenance source-id list.
    #[must_use]
    pub fn with_source_ids(mut self, source_ids: Vec<String>) -> Self {
        self.source_ids = Some(source_ids);
        self
    }

    /// The endpoint entity id on `side`.
    #[must_use]
    pub fn endpoint(&self, side: Side) -> &str {
        match side {
            Side::A => &self.a_side,
            Side::B => &self.b_side,
        }
    }

    /// The endpoint whose table hosts an embedded relationship, if the type
    /// is embedded.
    #[must_use]
    pub fn storing_side_entity_id(&self, relation_type: &RelationType) -> Option<&str> {
        relation_type.storing_side().map(|side| self.endpoint(side))
    }

    /// The embedded relationship's other endpoint, if the type is embedded.
    #[must_use]
    pub fn not_storing_side_entity_id(&self, relation_type: &RelationType) -> Option<&str> {
        relation_type
            .storing_side()
            .map(|side| self.endpoint(side.other()))
    }
}

/// The atomic unit of ingestion: entities and relationships that commit
/// together or not at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedBatch {
    /// Entity change records, in arrival order.
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Relationship change records, in arrival order.
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl ParsedBatch {
    /// Whether the batch contains no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_field_names() {
        let json = r#"{
            "type": "NODE_OWNS_PORT",
            "id": "rel-1",
            "aSide": "node-1",
            "bSide": "port-1",
            "sourceIds": ["urn:cmHandle:/abc"]
        }"#;
        let rel: Relationship = serde_json::from_str(json).unwrap();
        assert_eq!(rel.relation_type, "NODE_OWNS_PORT");
        assert_eq!(rel.a_side, "node-1");
        assert_eq!(rel.endpoint(Side::B), "port-1");
        assert_eq!(rel.source_ids.as_deref(), Some(&["urn:cmHandle:/abc".to_string()][..]));
    }

    #[test]
    fn entity_defaults() {
        let entity: Entity = serde_json::from_str(r#"{"type": "Node", "id": "node-1"}"#).unwrap();
        assert!(entity.attributes.is_empty());
        assert!(entity.source_ids.is_none());
    }

    #[test]
    fn storing_side_follows_the_storage_location() {
        use topodb_schema::{
            AssociationDef, EntityType, MaxCardinality, RelationTypeDef, SchemaRegistry,
            StorageLocation,
        };

        let registry = SchemaRegistry::builder()
            .entity(EntityType::new("Node", "node"))
            .entity(EntityType::new("Port", "port"))
            .relation(RelationTypeDef {
                name: "NODE_OWNS_PORT".into(),
                a_side: AssociationDef::new("Node", "owned-ports", MaxCardinality::Unbounded),
                b_side: AssociationDef::new("Port", "owner", MaxCardinality::One),
                storage: StorageLocation::BSide,
                table: None,
            })
            .build()
            .unwrap();
        let relation_type = registry.relation_type("NODE_OWNS_PORT").unwrap();

        let rel = Relationship::new("NODE_OWNS_PORT", "rel-1", "node-1", "port-1");
        assert_eq!(rel.storing_side_entity_id(relation_type), Some("port-1"));
        assert_eq!(rel.not_storing_side_entity_id(relation_type), Some("node-1"));
    }

    #[test]
    fn batch_emptiness() {
        assert!(ParsedBatch::default().is_empty());
        let batch = ParsedBatch {
            entities: vec![Entity::new("Node", "node-1")],
            relationships: Vec::new(),
        };
        assert!(!batch.is_empty());
    }
}
