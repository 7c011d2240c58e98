//! Deferred-operation plans.
//!
//! A batch is first translated into a list of small command values with all
//! type resolution and field validation done eagerly; the list is then run
//! under one transaction by the executor. Keeping the two phases apart
//! keeps validation testable without a database and execution retryable
//! without re-validating.

use std::collections::BTreeMap;

use rusqlite::types::Value as SqlValue;
use topodb_schema::SchemaRegistry;

use crate::error::{IngestError, IngestResult};
use crate::event::{Entity, ParsedBatch, Relationship};
use crate::value;

/// One deferred table operation.
#[derive(Debug, Clone)]
pub enum DeferredOp {
    /// Upsert one entity row.
    MergeEntity(EntityMerge),
    /// Merge one relationship per its storage location.
    MergeRelationship(Relationship),
    /// Delete one entity row and clear every relationship referencing it.
    DeleteEntity {
        /// The entity type name.
        entity_type: String,
        /// The entity id.
        id: String,
    },
    /// Delete one relationship per its storage location.
    DeleteRelationship {
        /// The relationship type name.
        relation_type: String,
        /// The relationship id.
        id: String,
    },
    /// Delete every entity whose source-id list contains `urn`, cascading
    /// like [`DeferredOp::DeleteEntity`].
    DeleteBySourceId {
        /// The provenance URN to scan for.
        urn: String,
    },
    /// Final cardinality pass over the batch's relationships.
    ValidateCardinality(Vec<Relationship>),
}

/// A pre-resolved entity upsert: every column value converted, every
/// attribute name validated.
#[derive(Debug, Clone)]
pub struct EntityMerge {
    pub(crate) entity_type: String,
    pub(crate) id: String,
    /// Non-key columns to write, in declaration order.
    pub(crate) columns: Vec<(String, SqlValue)>,
    /// The attribute values reported back on a changed row.
    pub(crate) result_attributes: BTreeMap<String, serde_json::Value>,
}

impl EntityMerge {
    /// Resolves an entity record against the registry. Fails with
    /// [`IngestError::InvalidField`] before anything is deferred if an
    /// attribute is not declared for the type.
    pub(crate) fn resolve(registry: &SchemaRegistry, entity: &Entity) -> IngestResult<Self> {
        let entity_type = registry
            .entity_type(&entity.entity_type)
            .ok_or_else(|| IngestError::unknown_entity_type(&entity.entity_type))?;

        let mut columns = Vec::with_capacity(entity.attributes.len() + 1);
        let mut result_attributes = BTreeMap::new();
        for (name, attr_value) in &entity.attributes {
            let attr = entity_type
                .attribute(name)
                .ok_or_else(|| IngestError::invalid_field(&entity.entity_type, name))?;
            columns.push((name.clone(), value::attribute_to_sql(attr, attr_value)));
            result_attributes.insert(name.clone(), attr_value.clone());
        }
        if let Some(source_ids) = &entity.source_ids {
            columns.push((
                entity_type.source_ids_column().to_string(),
                SqlValue::Text(value::source_ids_text(source_ids)),
            ));
        }

        Ok(Self {
            entity_type: entity.entity_type.clone(),
            id: entity.id.clone(),
            columns,
            result_attributes,
        })
    }
}

/// Builds the plan for a merge batch: entities in order, then relationships
/// in order, then one cardinality pass. An empty batch yields an empty
/// plan.
pub fn merge_plan(registry: &SchemaRegistry, batch: &ParsedBatch) -> IngestResult<Vec<DeferredOp>> {
    let mut ops = Vec::with_capacity(batch.entities.len() + batch.relationships.len() + 1);
    for entity in &batch.entities {
        ops.push(DeferredOp::MergeEntity(EntityMerge::resolve(
            registry, entity,
        )?));
    }
    for relationship in &batch.relationships {
        ensure_relation_type(registry, &relationship.relation_type)?;
        ops.push(DeferredOp::MergeRelationship(relationship.clone()));
    }
    if !batch.relationships.is_empty() {
        ops.push(DeferredOp::ValidateCardinality(batch.relationships.clone()));
    }
    Ok(ops)
}

/// Builds the plan for a delete batch: entity deletes in order, then
/// relationship deletes in order.
pub fn delete_plan(registry: &SchemaRegistry, batch: &ParsedBatch) -> IngestResult<Vec<DeferredOp>> {
    let mut ops = Vec::with_capacity(batch.entities.len() + batch.relationships.len());
    for entity in &batch.entities {
        if registry.entity_type(&entity.entity_type).is_none() {
            return Err(IngestError::unknown_entity_type(&entity.entity_type));
        }
        ops.push(DeferredOp::DeleteEntity {
            entity_type: entity.entity_type.clone(),
            id: entity.id.clone(),
        });
    }
    for relationship in &batch.relationships {
        ensure_relation_type(registry, &relationship.relation_type)?;
        ops.push(DeferredOp::DeleteRelationship {
            relation_type: relationship.relation_type.clone(),
            id: relationship.id.clone(),
        });
    }
    Ok(ops)
}

/// Builds the plan for a source-entity delete: one scan-and-cascade op.
#[must_use]
pub fn source_entity_delete_plan(urn: String) -> Vec<DeferredOp> {
    vec![DeferredOp::DeleteBySourceId { urn }]
}

fn ensure_relation_type(registry: &SchemaRegistry, name: &str) -> IngestResult<()> {
    if registry.relation_type(name).is_none() {
        return Err(IngestError::unknown_relation_type(name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use topodb_schema::{
        AssociationDef, AttrType, EntityType, MaxCardinality, RelationTypeDef, SchemaRegistry,
        StorageLocation,
    };

    fn registry() -> SchemaRegistry {
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
            .build()
            .unwrap()
    }

    #[test]
    fn merge_plan_orders_ops_and_appends_validation() {
        let registry = registry();
        let batch = ParsedBatch {
            entities: vec![Entity::new("Node", "node-1"), Entity::new("Port", "port-1")],
            relationships: vec![Relationship::new("NODE_OWNS_PORT", "rel-1", "node-1", "port-1")],
        };
        let ops = merge_plan(&registry, &batch).unwrap();
        assert_eq!(ops.len(), 4);
        assert!(matches!(&ops[0], DeferredOp::MergeEntity(m) if m.id == "node-1"));
        assert!(matches!(&ops[1], DeferredOp::MergeEntity(m) if m.id == "port-1"));
        assert!(matches!(&ops[2], DeferredOp::MergeRelationship(r) if r.id == "rel-1"));
        assert!(matches!(&ops[3], DeferredOp::ValidateCardinality(rels) if rels.len() == 1));
    }

    #[test]
    fn empty_batch_yields_empty_plan() {
        let ops = merge_plan(&registry(), &ParsedBatch::default()).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn undeclared_attribute_fails_eagerly() {
        let batch = ParsedBatch {
            entities: vec![Entity::new("Node", "node-1").with_attribute("bogus", json!(1))],
            relationships: Vec::new(),
        };
        let err = merge_plan(&registry(), &batch).unwrap_err();
        assert!(matches!(
            err,
            IngestError::InvalidField { ref field, .. } if field == "bogus"
        ));
    }

    #[test]
    fn unknown_relation_type_fails_eagerly() {
        let batch = ParsedBatch {
            entities: Vec::new(),
            relationships: vec![Relationship::new("NO_SUCH_TYPE", "rel-1", "a", "b")],
        };
        let err = merge_plan(&registry(), &batch).unwrap_err();
        assert!(matches!(err, IngestError::UnknownRelationType { .. }));
    }

    #[test]
    fn entity_merge_collects_source_ids_column() {
        let registry = registry();
        let entity = Entity::new("Node", "node-1")
            .with_attribute("fdn", json!("MRBTS-1"))
            .with_source_ids(vec!["urn:cmHandle:/abc".into()]);
        let merge = EntityMerge::resolve(&registry, &entity).unwrap();
        assert_eq!(merge.columns.len(), 2);
        assert_eq!(merge.columns[1].0, "source_ids");
        assert_eq!(merge.result_attributes.len(), 1);
    }
}
