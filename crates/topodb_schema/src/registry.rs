//! The schema registry: immutable, injected type lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::error::{SchemaError, SchemaResult};
use crate::relation::{RelationType, RelationTypeDef};

/// Immutable lookup from type name to metadata.
///
/// Built once from the modeling step's output and shared (behind an `Arc`)
/// by every component that needs type information. Construction validates
/// the model; a registry that exists is a registry the engine can enforce.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    entity_types: BTreeMap<String, Arc<EntityType>>,
    relation_types: BTreeMap<String, Arc<RelationType>>,
}

impl SchemaRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Looks up an entity type by name.
    #[must_use]
    pub fn entity_type(&self, name: &str) -> Option<&EntityType> {
        self.entity_types.get(name).map(Arc::as_ref)
    }

    /// Looks up a relation type by name.
    #[must_use]
    pub fn relation_type(&self, name: &str) -> Option<&RelationType> {
        self.relation_types.get(name).map(Arc::as_ref)
    }

    /// All entity types, ordered by name.
    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entity_types.values().map(Arc::as_ref)
    }

    /// All relation types, ordered by name.
    pub fn relation_types(&self) -> impl Iterator<Item = &RelationType> {
        self.relation_types.values().map(Arc::as_ref)
    }

    /// Every relation type with `entity_name` on either side.
    pub fn relation_types_referencing<'a>(
        &'a self,
        entity_name: &'a str,
    ) -> impl Iterator<Item = &'a RelationType> {
        self.relation_types()
            .filter(move |rt| rt.references(entity_name))
    }
}

/// Builder consuming entity types and relation definitions.
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    entities: Vec<EntityType>,
    relations: Vec<RelationTypeDef>,
}

impl SchemaRegistryBuilder {
    /// Adds an entity type.
    #[must_use]
    pub fn entity(mut self, entity: EntityType) -> Self {
        self.entities.push(entity);
        self
    }

    /// Adds a relation type definition.
    #[must_use]
    pub fn relation(mut self, relation: RelationTypeDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Resolves and validates the model.
    pub fn build(self) -> SchemaResult<SchemaRegistry> {
        let mut entity_types: BTreeMap<String, Arc<EntityType>> = BTreeMap::new();
        for entity in self.entities {
            let name = entity.name().to_string();
            if entity_types.insert(name.clone(), Arc::new(entity)).is_some() {
                return Err(SchemaError::DuplicateEntityType { name });
            }
        }

        let mut relation_types: BTreeMap<String, Arc<RelationType>> = BTreeMap::new();
        for def in self.relations {
            let name = def.name.clone();
            let relation = RelationType::resolve(def, &entity_types)?;
            if relation_types
                .insert(name.clone(), Arc::new(relation))
                .is_some()
            {
                return Err(SchemaError::DuplicateRelationType { name });
            }
        }

        Ok(SchemaRegistry {
            entity_types,
            relation_types,
        })
    }
}

/// Serializable schema document, the interchange format the modeling step
/// emits and the CLI loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Declared entity types.
    pub entities: Vec<EntityType>,
    /// Declared relation types.
    pub relations: Vec<RelationTypeDef>,
}

impl SchemaDefinition {
    /// Builds a registry from this definition.
    pub fn into_registry(self) -> SchemaResult<SchemaRegistry> {
        let mut builder = SchemaRegistry::builder();
        for entity in self.entities {
            builder = builder.entity(entity);
        }
        for relation in self.relations {
            builder = builder.relation(relation);
        }
        builder.build()
    }

    /// Parses a JSON definition document and builds a registry from it.
    pub fn registry_from_json(json: &str) -> SchemaResult<SchemaRegistry> {
        let definition: Self = serde_json::from_str(json)?;
        definition.into_registry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::AttrType;
    use crate::relation::{AssociationDef, MaxCardinality, StorageLocation};

    fn sample_builder() -> SchemaRegistryBuilder {
        SchemaRegistry::builder()
            .entity(EntityType::new("Node", "node").with_attribute("fdn", AttrType::Primitive))
            .entity(EntityType::new("Port", "port"))
            .relation(RelationTypeDef {
                name: "NODE_OWNS_PORT".into(),
                a_side: AssociationDef::new("Node", "owned-ports", MaxCardinality::Unbounded),
                b_side: AssociationDef::new("Port", "owner", MaxCardinality::One),
                storage: StorageLocation::BSide,
                table: None,
            })
    }

    #[test]
    fn build_and_lookup() {
        let registry = sample_builder().build().unwrap();
        assert!(registry.entity_type("Node").is_some());
        assert!(registry.entity_type("node").is_none());
        assert_eq!(
            registry.relation_type("NODE_OWNS_PORT").unwrap().table_name(),
            "port"
        );
        assert_eq!(registry.relation_types_referencing("Node").count(), 1);
        assert_eq!(registry.relation_types_referencing("Other").count(), 0);
    }

    #[test]
    fn duplicate_entity_rejected() {
        let err = sample_builder()
            .entity(EntityType::new("Node", "node2"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateEntityType { .. }));
    }

    #[test]
    fn duplicate_relation_rejected() {
        let extra = RelationTypeDef {
            name: "NODE_OWNS_PORT".into(),
            a_side: AssociationDef::new("Node", "x", MaxCardinality::Unbounded),
            b_side: AssociationDef::new("Port", "y", MaxCardinality::Unbounded),
            storage: StorageLocation::Relation,
            table: None,
        };
        let err = sample_builder().relation(extra).build().unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateRelationType { .. }));
    }

    #[test]
    fn definition_round_trip() {
        let json = r#"{
            "entities": [
                {"name": "Node", "table": "node", "attributes": {"fdn": "primitive"}},
                {"name": "Port", "table": "port"}
            ],
            "relations": [
                {
                    "name": "NODE_OWNS_PORT",
                    "aSide": {"entityType": "Node", "association": "owned-ports", "maxCardinality": "unbounded"},
                    "bSide": {"entityType": "Port", "association": "owner", "maxCardinality": "one"},
                    "storage": "b-side"
                }
            ]
        }"#;
        let registry = SchemaDefinition::registry_from_json(json).unwrap();
        assert!(registry.relation_type("NODE_OWNS_PORT").is_some());
    }
}
