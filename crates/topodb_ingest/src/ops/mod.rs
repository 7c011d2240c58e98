//! Application of deferred operations inside an open transaction.

pub mod conflict;
pub(crate) mod delete;
pub(crate) mod merge;

use rusqlite::Transaction;
use topodb_schema::{EntityType, RelationType, RelationshipStorage, SchemaRegistry, Side};

use crate::error::{IngestError, IngestResult};
use crate::plan::DeferredOp;
use crate::result::OperationResult;
use crate::validation::CardinalityValidator;

impl DeferredOp {
    /// Applies this operation against the open transaction, appending any
    /// outcomes to `results`.
    pub(crate) fn apply(
        &self,
        tx: &mut Transaction<'_>,
        registry: &SchemaRegistry,
        results: &mut Vec<OperationResult>,
    ) -> IngestResult<()> {
        match self {
            Self::MergeEntity(op) => merge::merge_entity(tx, registry, op, results),
            Self::MergeRelationship(relationship) => {
                merge::merge_relationship(tx, registry, relationship, results)
            }
            Self::DeleteEntity { entity_type, id } => {
                let entity_type = registry
                    .entity_type(entity_type)
                    .ok_or_else(|| IngestError::unknown_entity_type(entity_type))?;
                delete::delete_entity(tx, registry, entity_type, id, results)
            }
            Self::DeleteRelationship { relation_type, id } => {
                delete::delete_relationship(tx, registry, relation_type, id, results)
            }
            Self::DeleteBySourceId { urn } => {
                delete::delete_by_source_id(tx, registry, urn, results)
            }
            Self::ValidateCardinality(relationships) => {
                CardinalityValidator::new(tx, registry).validate(relationships)
            }
        }
    }
}

/// An embedded relationship's resolved layout: the hosting entity table and
/// the column triple inside it.
pub(crate) struct EmbeddedSlot<'a> {
    pub(crate) storing_side: Side,
    pub(crate) host: &'a EntityType,
    pub(crate) other: &'a EntityType,
    pub(crate) id_column: &'a str,
    pub(crate) fk_column: &'a str,
    pub(crate) source_ids_column: &'a str,
}

impl<'a> EmbeddedSlot<'a> {
    /// Resolves the slot layout, or `None` for join-table storage.
    pub(crate) fn of(relation_type: &'a RelationType) -> Option<Self> {
        match relation_type.storage() {
            RelationshipStorage::RelationTable { .. } => None,
            RelationshipStorage::EmbeddedASide {
                id_column,
                fk_column,
                source_ids_column,
            } => Some(Self {
                storing_side: Side::A,
                host: relation_type.a_side().entity(),
                other: relation_type.b_side().entity(),
                id_column,
                fk_column,
                source_ids_column,
            }),
            RelationshipStorage::EmbeddedBSide {
                id_column,
                fk_column,
                source_ids_column,
            } => Some(Self {
                storing_side: Side::B,
                host: relation_type.b_side().entity(),
                other: relation_type.a_side().entity(),
                id_column,
                fk_column,
                source_ids_column,
            }),
        }
    }
}

/// Records an entity result unless an identical one is already present.
/// Healing paths can create the same placeholder more than once per batch.
pub(crate) fn record_entity_once(results: &mut Vec<OperationResult>, result: OperationResult) {
    if !results.contains(&result) {
        results.push(result);
    }
}
